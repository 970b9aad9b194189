//! Off-chain signer for permit messages.
//!
//! Signs the EIP-712 digest of a [`TypedPermit`] with the owner's key. Never
//! touches the network.

use crate::context::Account;
use permit_account::{AccountError, AccountService};
use permit_types::{Address, Signature, TypedPermit};
use std::sync::Arc;
use thiserror::Error;

/// Errors from local signing.
#[derive(Debug, Error)]
pub enum SigningError {
	#[error("Account {0} has no signing key")]
	MissingKey(Address),
	#[error("Signer {signer} cannot sign a permit for owner {owner}")]
	OwnerMismatch { owner: Address, signer: Address },
	#[error("Signing failed: {0}")]
	Account(#[from] AccountError),
}

/// Produces the owner's consent signature over a permit.
pub struct OffChainSigner {
	address: Address,
	signer: Arc<AccountService>,
}

impl OffChainSigner {
	/// Fails with [`SigningError::MissingKey`] for an address-only account.
	pub fn new(account: &Account) -> Result<Self, SigningError> {
		let signer = account
			.signer()
			.cloned()
			.ok_or(SigningError::MissingKey(account.address()))?;
		Ok(Self {
			address: account.address(),
			signer,
		})
	}

	pub fn address(&self) -> Address {
		self.address
	}

	/// Signs `permit`, which must name this signer as its owner.
	pub async fn sign(&self, permit: &TypedPermit) -> Result<Signature, SigningError> {
		if permit.message.owner != self.address {
			return Err(SigningError::OwnerMismatch {
				owner: permit.message.owner,
				signer: self.address,
			});
		}

		let digest = permit.signing_hash();
		let signature = self.signer.sign_hash(&digest).await?;
		tracing::debug!(owner = %self.address, nonce = %permit.message.nonce, "Signed permit");
		Ok(signature)
	}
}
