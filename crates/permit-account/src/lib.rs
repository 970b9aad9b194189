//! Account management module for the permit relay.
//!
//! Provides the signing capability behind the two roles of the protocol: the
//! token owner, who only ever signs typed data locally, and the relayer, whose
//! wallet sends and pays for the on-chain calls. Raw key material is parsed
//! once at construction and then only reachable through the signing handle.

use alloy_network::EthereumWallet;
use async_trait::async_trait;
use permit_types::{Address, Signature, B256};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

/// Trait defining the interface for account implementations.
///
/// Implementations hold exactly one key and never expose it.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Retrieves the address associated with this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte prehashed digest such as an EIP-712 signing hash.
	///
	/// No prefix is applied. This is a pure local computation.
	async fn sign_hash(&self, hash: &B256) -> Result<Signature, AccountError>;

	/// Wallet used by a provider to sign outgoing transactions as this account.
	fn wallet(&self) -> Result<EthereumWallet, AccountError>;
}

/// Service that manages account operations.
///
/// Thin owner of an `AccountInterface` implementation, shared via `Arc`
/// between the components that need the same role.
pub struct AccountService {
	/// The underlying account implementation.
	implementation: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(implementation: Box<dyn AccountInterface>) -> Self {
		Self { implementation }
	}

	/// Retrieves the address associated with the managed account.
	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.implementation.address().await
	}

	/// Signs a prehashed digest with the managed account.
	pub async fn sign_hash(&self, hash: &B256) -> Result<Signature, AccountError> {
		let signature = self.implementation.sign_hash(hash).await?;
		tracing::debug!(digest = %hash, "Signed digest");
		Ok(signature)
	}

	/// Returns the transaction-signing wallet of the managed account.
	pub fn wallet(&self) -> Result<EthereumWallet, AccountError> {
		self.implementation.wallet()
	}
}
