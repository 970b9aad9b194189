//! Configuration builder for tests and local development.
//!
//! Produces a valid `Config` pointing at a local node with the well-known
//! development keys, so callers only override what a scenario needs.

use crate::{AccountsConfig, Config, NetworkConfig, PermitConfig, TokenConfig};
use permit_types::{Address, SecretString};

/// First two accounts of the default local development mnemonic.
const DEV_OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEV_RELAYER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	rpc_url: String,
	chain_id: Option<u64>,
	token_address: Address,
	token_name: String,
	owner_private_key: String,
	relayer_private_key: String,
	permit: PermitConfig,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		Self {
			rpc_url: "http://127.0.0.1:8545".to_string(),
			chain_id: Some(31337),
			token_address: Address::repeat_byte(0x42),
			token_name: "MyGasslessToken".to_string(),
			owner_private_key: DEV_OWNER_KEY.to_string(),
			relayer_private_key: DEV_RELAYER_KEY.to_string(),
			permit: PermitConfig::default(),
		}
	}

	pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
		self.rpc_url = url.into();
		self
	}

	pub fn chain_id(mut self, chain_id: Option<u64>) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn token(mut self, address: Address, name: impl Into<String>) -> Self {
		self.token_address = address;
		self.token_name = name.into();
		self
	}

	pub fn validity_window_seconds(mut self, seconds: u64) -> Self {
		self.permit.validity_window_seconds = seconds;
		self
	}

	pub fn verify_before_submit(mut self, verify: bool) -> Self {
		self.permit.verify_before_submit = verify;
		self
	}

	pub fn build(self) -> Config {
		Config {
			network: NetworkConfig {
				rpc_url: self.rpc_url,
				chain_id: self.chain_id,
			},
			token: TokenConfig {
				address: self.token_address,
				name: self.token_name,
				version: "1".to_string(),
				decimals: 18,
			},
			accounts: AccountsConfig {
				owner_private_key: SecretString::from(self.owner_private_key),
				relayer_private_key: SecretString::from(self.relayer_private_key),
			},
			permit: self.permit,
		}
	}
}
