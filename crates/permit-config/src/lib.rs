//! Configuration module for the permit relay.
//!
//! Loads a single TOML file describing the RPC endpoint, the token deployment,
//! the owner and relayer keys, and the permit/relay policy. `${VAR}` and
//! `${VAR:-default}` references are resolved from the environment before
//! parsing, so private keys can stay out of the file itself. The configuration
//! is validated as part of parsing.

#[cfg(feature = "testing")]
pub mod builders;

use permit_types::{Address, ConfirmationPolicy, SecretString};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The full error embeds the input, which may contain resolved keys
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the permit relay.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// JSON-RPC endpoint of the single chain the token lives on.
	pub network: NetworkConfig,
	/// The permit-capable token deployment.
	pub token: TokenConfig,
	/// Key material for the owner and the fee-paying relayer.
	pub accounts: AccountsConfig,
	/// Message construction and relay policy.
	#[serde(default)]
	pub permit: PermitConfig,
}

/// Network connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// HTTP JSON-RPC URL.
	pub rpc_url: String,
	/// Expected chain id. When set, the node's reported chain id must match it.
	pub chain_id: Option<u64>,
}

/// Token deployment settings. `name` and `version` feed the EIP-712 domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
	/// Verifying contract address.
	pub address: Address,
	/// EIP-712 domain name, usually the ERC-20 name.
	pub name: String,
	/// EIP-712 domain version.
	#[serde(default = "default_token_version")]
	pub version: String,
	/// Decimals used for display only.
	#[serde(default = "default_token_decimals")]
	pub decimals: u8,
}

fn default_token_version() -> String {
	"1".to_string()
}

fn default_token_decimals() -> u8 {
	18
}

/// Private keys for the two signing roles. Never shared between roles.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountsConfig {
	/// Key of the token owner. Used for off-chain signing only.
	pub owner_private_key: SecretString,
	/// Key of the relayer that sends and pays for `permit` and `transferFrom`.
	pub relayer_private_key: SecretString,
}

/// Permit construction and relay policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermitConfig {
	/// Seconds between message construction and its deadline.
	/// Defaults to 1800 seconds if not specified.
	#[serde(default = "default_validity_window_seconds")]
	pub validity_window_seconds: u64,
	/// Confirmations to wait for after each state-changing call.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Upper bound on the wait for each confirmation, in seconds.
	#[serde(default = "default_confirmation_timeout_seconds")]
	pub confirmation_timeout_seconds: u64,
	/// Recover the signer locally before submitting a permit.
	#[serde(default = "default_verify_before_submit")]
	pub verify_before_submit: bool,
}

impl Default for PermitConfig {
	fn default() -> Self {
		Self {
			validity_window_seconds: default_validity_window_seconds(),
			confirmations: default_confirmations(),
			confirmation_timeout_seconds: default_confirmation_timeout_seconds(),
			verify_before_submit: default_verify_before_submit(),
		}
	}
}

impl PermitConfig {
	pub fn validity_window(&self) -> Duration {
		Duration::from_secs(self.validity_window_seconds)
	}

	pub fn confirmation_policy(&self) -> ConfirmationPolicy {
		ConfirmationPolicy::new(
			self.confirmations,
			Duration::from_secs(self.confirmation_timeout_seconds),
		)
	}
}

fn default_validity_window_seconds() -> u64 {
	1800 // 30 minutes
}

fn default_confirmations() -> u64 {
	1
}

fn default_confirmation_timeout_seconds() -> u64 {
	120
}

fn default_verify_before_submit() -> bool {
	true
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to prevent ReDoS attacks.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match (std::env::var(var_name.as_str()), cap.get(2)) {
			(Ok(v), _) => v,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				return Err(ConfigError::Validation(format!(
					"Environment variable '{}' not found",
					var_name.as_str()
				)));
			},
		};
		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply in reverse so earlier offsets stay valid
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = tokio::fs::read_to_string(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Cannot read {}: {}", path.display(), e),
			))
		})?;
		content.parse()
	}

	/// Validates the configuration to ensure all required fields are properly set.
	fn validate(&self) -> Result<(), ConfigError> {
		let rpc_url = self.network.rpc_url.trim();
		if rpc_url.is_empty() {
			return Err(ConfigError::Validation("network.rpc_url cannot be empty".into()));
		}
		if !(rpc_url.starts_with("http://") || rpc_url.starts_with("https://")) {
			return Err(ConfigError::Validation(format!(
				"network.rpc_url must be an http(s) URL, got '{}'",
				rpc_url
			)));
		}
		if self.network.chain_id == Some(0) {
			return Err(ConfigError::Validation("network.chain_id cannot be 0".into()));
		}

		if self.token.address == Address::ZERO {
			return Err(ConfigError::Validation(
				"token.address cannot be the zero address".into(),
			));
		}
		if self.token.name.is_empty() {
			return Err(ConfigError::Validation("token.name cannot be empty".into()));
		}
		if self.token.version.is_empty() {
			return Err(ConfigError::Validation("token.version cannot be empty".into()));
		}

		if self.accounts.owner_private_key.is_empty() {
			return Err(ConfigError::Validation(
				"accounts.owner_private_key cannot be empty".into(),
			));
		}
		if self.accounts.relayer_private_key.is_empty() {
			return Err(ConfigError::Validation(
				"accounts.relayer_private_key cannot be empty".into(),
			));
		}
		let same_key = self.accounts.owner_private_key.with_exposed(|owner| {
			self.accounts
				.relayer_private_key
				.with_exposed(|relayer| normalize_key(owner) == normalize_key(relayer))
		});
		if same_key {
			return Err(ConfigError::Validation(
				"owner and relayer must use different keys".into(),
			));
		}

		if self.permit.validity_window_seconds == 0 {
			return Err(ConfigError::Validation(
				"permit.validity_window_seconds must be greater than 0".into(),
			));
		}
		if self.permit.confirmations == 0 || self.permit.confirmations > 100 {
			return Err(ConfigError::Validation(
				"permit.confirmations must be between 1 and 100".into(),
			));
		}
		if self.permit.confirmation_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"permit.confirmation_timeout_seconds must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

fn normalize_key(key: &str) -> String {
	let key = key.trim();
	key.strip_prefix("0x")
		.or_else(|| key.strip_prefix("0X"))
		.unwrap_or(key)
		.to_lowercase()
}

/// Parses, resolves environment variables and validates in one step.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
