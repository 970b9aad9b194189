//! Gasless permit protocol for EIP-2612 tokens.
//!
//! The owner signs a domain-separated `Permit` message off-chain. A relayer
//! submits it with `permit(...)`, paying the fee, and then moves the permitted
//! tokens with `transferFrom`. The components here are used in that order:
//!
//! - [`QueryFacade`] reads balances, allowances and nonces
//! - [`PermitBuilder`] assembles the typed message from current chain state
//! - [`OffChainSigner`] signs it with the owner's key
//! - [`codec`] turns the signature into `(v, r, s)` and recovers the signer
//! - [`RelayExecutor`] sends `permit` and `transferFrom` as the relayer
//!
//! [`PermitFlow`] sequences them and is what the service binary drives.

use permit_token::{QueryError, RelayError};
use permit_types::{Address, B256, U256};
use thiserror::Error;

pub mod builder;
pub mod codec;
pub mod context;
pub mod flow;
pub mod query;
pub mod relay;
pub mod signer;

pub use builder::{BuildError, PermitBuilder};
pub use codec::{MalformedSignatureError, VerificationError};
pub use context::{Account, ContextError, PermitContext, PermitSettings};
pub use flow::{PermitFlow, PermitOutcome, SignedPermit};
pub use query::QueryFacade;
pub use relay::RelayExecutor;
pub use signer::{OffChainSigner, SigningError};

/// Errors of the end-to-end permit protocol.
///
/// Each component's failure kind stays distinct so callers can decide whether
/// rebuilding with a fresh nonce or deadline is worthwhile.
#[derive(Debug, Error)]
pub enum PermitError {
	#[error("Query failed: {0}")]
	Query(#[from] QueryError),
	#[error("Could not build permit: {0}")]
	Build(#[from] BuildError),
	#[error("Could not sign permit: {0}")]
	Signing(#[from] SigningError),
	#[error("Malformed signature: {0}")]
	MalformedSignature(#[from] MalformedSignatureError),
	#[error("Recovered signer {recovered} does not match owner {owner}")]
	SignerMismatch { recovered: Address, owner: Address },
	/// The permit call failed. `current_nonce` is the owner's on-chain nonce
	/// read after the failure, if that read succeeded.
	#[error("Permit with nonce {expected_nonce} failed: {source}")]
	Relay {
		#[source]
		source: RelayError,
		expected_nonce: U256,
		current_nonce: Option<U256>,
	},
	/// The delegated transfer failed. `permit_tx` is set when a permit was
	/// confirmed earlier in the same sequence, leaving its allowance granted.
	#[error("Delegated transfer failed: {source}")]
	Transfer {
		#[source]
		source: RelayError,
		permit_tx: Option<B256>,
	},
}

impl From<VerificationError> for PermitError {
	fn from(error: VerificationError) -> Self {
		match error {
			VerificationError::Malformed(e) => PermitError::MalformedSignature(e),
			VerificationError::SignerMismatch { recovered, owner } => {
				PermitError::SignerMismatch { recovered, owner }
			},
		}
	}
}

impl PermitError {
	/// Whether rebuilding the permit from fresh chain state could succeed.
	///
	/// True for expired deadlines and nonce or signer mismatches reported by
	/// the contract, which a new message with the current nonce resolves.
	pub fn is_stale_permit(&self) -> bool {
		match self {
			PermitError::Relay { source, .. } => source
				.revert_reason()
				.is_some_and(|reason| reason.is_stale_permit()),
			_ => false,
		}
	}
}
