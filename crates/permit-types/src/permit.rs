//! The EIP-2612 `Permit` message and its typed-data envelope.

use crate::domain::DomainDescriptor;
use crate::utils::{compute_final_digest, compute_permit_struct_hash};
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// How much of the owner's balance a permit should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermitAmount {
	/// The owner's entire balance, read immediately before building.
	#[default]
	FullBalance,
	/// A caller-chosen amount in the token's smallest unit.
	Exact(U256),
}

/// The five ordered fields of the `Permit` struct.
///
/// Built fresh for every attempt and never persisted. Its validity window and
/// nonce are enforced by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitMessage {
	pub owner: Address,
	pub spender: Address,
	pub value: U256,
	pub nonce: U256,
	pub deadline: U256,
}

impl PermitMessage {
	/// hashStruct(Permit).
	pub fn struct_hash(&self) -> B256 {
		compute_permit_struct_hash(
			&self.owner,
			&self.spender,
			self.value,
			self.nonce,
			self.deadline,
		)
	}

	/// The digest the owner signs under `domain`.
	pub fn signing_hash(&self, domain: &DomainDescriptor) -> B256 {
		compute_final_digest(&domain.separator(), &self.struct_hash())
	}

	/// Whether a block with timestamp `now` would reject this message.
	pub fn is_expired_at(&self, now: u64) -> bool {
		self.deadline < U256::from(now)
	}
}

/// A permit message together with the domain it is signed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedPermit {
	pub domain: DomainDescriptor,
	pub message: PermitMessage,
}

impl TypedPermit {
	pub fn signing_hash(&self) -> B256 {
		self.message.signing_hash(&self.domain)
	}
}
