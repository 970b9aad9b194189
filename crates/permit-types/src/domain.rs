//! EIP-712 domain descriptor for a permit-capable token.

use crate::utils::compute_domain_hash;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// Binds a signature to one token deployment on one chain.
///
/// Immutable for the lifetime of the deployed contract. The separator computed
/// from it must equal the contract's own `DOMAIN_SEPARATOR()`, otherwise every
/// permit signed against it reverts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainDescriptor {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: Address,
}

impl DomainDescriptor {
	pub fn new(
		name: impl Into<String>,
		version: impl Into<String>,
		chain_id: u64,
		verifying_contract: Address,
	) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
			chain_id,
			verifying_contract,
		}
	}

	/// The EIP-712 domain separator hash.
	pub fn separator(&self) -> B256 {
		compute_domain_hash(
			&self.name,
			&self.version,
			self.chain_id,
			&self.verifying_contract,
		)
	}
}
