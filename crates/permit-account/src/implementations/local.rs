//! Local private-key account implementation.

use crate::{AccountError, AccountInterface};
use alloy_network::EthereumWallet;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use permit_types::{Address, SecretString, Signature, B256};

/// Account backed by an in-process secp256k1 key.
#[derive(Clone)]
pub struct LocalAccount {
	signer: PrivateKeySigner,
}

impl LocalAccount {
	/// Parses a hex private key, with or without `0x`.
	pub fn from_private_key(private_key: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key
			.with_exposed(|key| key.trim().parse::<PrivateKeySigner>())
			.map_err(|_| AccountError::InvalidKey("not a valid secp256k1 private key".into()))?;
		Ok(Self { signer })
	}

	/// A fresh random account, e.g. for a throwaway recipient.
	pub fn random() -> Self {
		Self {
			signer: PrivateKeySigner::random(),
		}
	}

	pub fn address(&self) -> Address {
		self.signer.address()
	}
}

impl std::fmt::Debug for LocalAccount {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("LocalAccount")
			.field("address", &self.signer.address())
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl AccountInterface for LocalAccount {
	async fn address(&self) -> Result<Address, AccountError> {
		Ok(self.signer.address())
	}

	async fn sign_hash(&self, hash: &B256) -> Result<Signature, AccountError> {
		self.signer
			.sign_hash(hash)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))
	}

	fn wallet(&self) -> Result<EthereumWallet, AccountError> {
		Ok(EthereumWallet::from(self.signer.clone()))
	}
}

/// Factory function to create a local account from a configured private key.
pub fn create_account(
	private_key: &SecretString,
) -> Result<Box<dyn AccountInterface>, AccountError> {
	if private_key.is_empty() {
		return Err(AccountError::InvalidKey("private key is empty".into()));
	}
	Ok(Box::new(LocalAccount::from_private_key(private_key)?))
}
