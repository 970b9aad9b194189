//! Explicit wiring for one permit deployment.
//!
//! A [`PermitContext`] carries the owner account, the token handle (whose
//! sender is the relayer) and the protocol settings. Every component is built
//! from a context, so tests hand in a context over a fake token instead of
//! touching process-wide state.

use permit_account::{implementations::local::create_account, AccountError, AccountService};
use permit_config::Config;
use permit_token::{implementations::evm::alloy::create_evm_token, QueryError, TokenService};
use permit_types::{Address, ConfirmationPolicy};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while wiring a context from configuration.
#[derive(Debug, Error)]
pub enum ContextError {
	#[error("Account error: {0}")]
	Account(#[from] AccountError),
	#[error("Token connection error: {0}")]
	Token(#[from] QueryError),
}

/// An address, optionally with the capability to sign for it.
#[derive(Clone)]
pub struct Account {
	address: Address,
	signer: Option<Arc<AccountService>>,
}

impl Account {
	/// A plain address reference, e.g. a recipient.
	pub fn address_only(address: Address) -> Self {
		Self {
			address,
			signer: None,
		}
	}

	/// An account that can sign, addressed by its own key.
	pub async fn with_signer(signer: Arc<AccountService>) -> Result<Self, AccountError> {
		let address = signer.get_address().await?;
		Ok(Self {
			address,
			signer: Some(signer),
		})
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn signer(&self) -> Option<&Arc<AccountService>> {
		self.signer.as_ref()
	}
}

impl std::fmt::Debug for Account {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Account")
			.field("address", &self.address)
			.field("can_sign", &self.signer.is_some())
			.finish()
	}
}

/// Protocol settings that do not come from the chain.
#[derive(Debug, Clone)]
pub struct PermitSettings {
	/// EIP-712 domain name of the token.
	pub token_name: String,
	/// EIP-712 domain version of the token.
	pub token_version: String,
	/// Chain the connection must report, if pinned.
	pub expected_chain_id: Option<u64>,
	/// How far past "now" a freshly built permit stays valid.
	pub validity_window: Duration,
	/// Confirmation requirements for state-changing calls.
	pub confirmation: ConfirmationPolicy,
	/// Recover the signer and cross-check the domain before broadcasting.
	pub verify_before_submit: bool,
}

impl PermitSettings {
	/// Settings for the given domain name and version with protocol defaults:
	/// 1800 s validity, one confirmation, verification on.
	pub fn new(token_name: impl Into<String>, token_version: impl Into<String>) -> Self {
		Self {
			token_name: token_name.into(),
			token_version: token_version.into(),
			expected_chain_id: None,
			validity_window: Duration::from_secs(1800),
			confirmation: ConfirmationPolicy::default(),
			verify_before_submit: true,
		}
	}

	pub fn from_config(config: &Config) -> Self {
		Self {
			token_name: config.token.name.clone(),
			token_version: config.token.version.clone(),
			expected_chain_id: config.network.chain_id,
			validity_window: config.permit.validity_window(),
			confirmation: config.permit.confirmation_policy(),
			verify_before_submit: config.permit.verify_before_submit,
		}
	}
}

/// Accounts, token handle and settings shared by the permit components.
#[derive(Clone)]
pub struct PermitContext {
	pub owner: Account,
	pub token: Arc<TokenService>,
	pub settings: PermitSettings,
}

impl PermitContext {
	pub fn new(owner: Account, token: Arc<TokenService>, settings: PermitSettings) -> Self {
		Self {
			owner,
			token,
			settings,
		}
	}

	/// Builds a context against a live node from configuration.
	///
	/// The owner key stays local for signing typed data. The relayer key is
	/// handed to the provider, which signs and pays for every transaction.
	pub async fn connect(config: &Config) -> Result<Self, ContextError> {
		let owner = Arc::new(AccountService::new(create_account(
			&config.accounts.owner_private_key,
		)?));
		let relayer = AccountService::new(create_account(&config.accounts.relayer_private_key)?);

		let token = create_evm_token(
			&config.network.rpc_url,
			config.token.address,
			relayer.wallet()?,
		)
		.await?;

		let owner = Account::with_signer(owner).await?;
		tracing::info!(
			owner = %owner.address(),
			relayer = %token.sender(),
			token = %config.token.address,
			"Permit context ready"
		);

		Ok(Self::new(
			owner,
			Arc::new(TokenService::new(token)),
			PermitSettings::from_config(config),
		))
	}

	/// The relayer address: spender of every permit, sender of every call.
	pub fn relayer(&self) -> Address {
		self.token.sender()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use permit_account::implementations::local::LocalAccount;
	use permit_config::builders::ConfigBuilder;

	#[tokio::test]
	async fn test_account_with_signer_uses_key_address() {
		let local = LocalAccount::random();
		let expected = local.address();
		let account = Account::with_signer(Arc::new(AccountService::new(Box::new(local))))
			.await
			.unwrap();

		assert_eq!(account.address(), expected);
		assert!(account.signer().is_some());
		assert!(Account::address_only(expected).signer().is_none());
	}

	#[test]
	fn test_settings_follow_config() {
		let config = ConfigBuilder::new()
			.chain_id(Some(5))
			.validity_window_seconds(60)
			.verify_before_submit(false)
			.build();
		let settings = PermitSettings::from_config(&config);

		assert_eq!(settings.expected_chain_id, Some(5));
		assert_eq!(settings.validity_window, Duration::from_secs(60));
		assert!(!settings.verify_before_submit);
		assert_eq!(settings.token_name, config.token.name);
	}
}
