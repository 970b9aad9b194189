//! EIP-712 utilities for the EIP-2612 `Permit` schema.
//!
//! These helpers provide:
//! - Domain separator computation for a versioned token domain
//! - `Permit` struct hashing
//! - Final digest computation (0x1901 || domainHash || structHash)
//! - A minimal ABI encoder for the static field types the schema uses

use alloy_primitives::{keccak256, Address, B256, U256};

/// Domain type of EIP-2612 tokens. Field order is fixed by the token contract.
pub const DOMAIN_TYPE: &str =
	"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
/// The `Permit` primary type. Must match the contract's schema byte for byte.
pub const PERMIT_TYPE: &str =
	"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)";

/// Compute the EIP-712 domain separator:
/// keccak256(abi.encode(typeHash, nameHash, versionHash, chainId, verifyingContract)).
pub fn compute_domain_hash(
	name: &str,
	version: &str,
	chain_id: u64,
	verifying_contract: &Address,
) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(DOMAIN_TYPE.as_bytes()));
	enc.push_b256(&keccak256(name.as_bytes()));
	enc.push_b256(&keccak256(version.as_bytes()));
	enc.push_u256(U256::from(chain_id));
	enc.push_address(verifying_contract);
	keccak256(enc.finish())
}

/// Compute hashStruct(Permit) for the five ordered permit fields.
pub fn compute_permit_struct_hash(
	owner: &Address,
	spender: &Address,
	value: U256,
	nonce: U256,
	deadline: U256,
) -> B256 {
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&keccak256(PERMIT_TYPE.as_bytes()));
	enc.push_address(owner);
	enc.push_address(spender);
	enc.push_u256(value);
	enc.push_u256(nonce);
	enc.push_u256(deadline);
	keccak256(enc.finish())
}

/// Compute the final EIP-712 digest: keccak256(0x1901 || domainHash || structHash).
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.extend_from_slice(&[0x19, 0x01]);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Minimal ABI encoder for static types used in EIP-712 struct hashing.
#[derive(Default)]
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self {
			buf: Vec::with_capacity(6 * 32),
		}
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	pub fn push_address(&mut self, addr: &Address) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		self.buf.extend_from_slice(&v.to_be_bytes::<32>());
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::address;
	use alloy_sol_types::{sol, Eip712Domain, SolStruct};
	use std::borrow::Cow;

	sol! {
		struct Permit {
			address owner;
			address spender;
			uint256 value;
			uint256 nonce;
			uint256 deadline;
		}
	}

	const TOKEN: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
	const OWNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
	const SPENDER: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

	fn sol_domain(chain_id: u64) -> Eip712Domain {
		Eip712Domain::new(
			Some(Cow::Borrowed("MyGasslessToken")),
			Some(Cow::Borrowed("1")),
			Some(U256::from(chain_id)),
			Some(TOKEN),
			None,
		)
	}

	#[test]
	fn test_permit_type_matches_sol_schema() {
		let permit = Permit {
			owner: OWNER,
			spender: SPENDER,
			value: U256::ZERO,
			nonce: U256::ZERO,
			deadline: U256::ZERO,
		};
		assert_eq!(Permit::eip712_encode_type(), PERMIT_TYPE);
		assert_eq!(permit.eip712_type_hash(), keccak256(PERMIT_TYPE.as_bytes()));
	}

	#[test]
	fn test_domain_hash_matches_alloy() {
		let ours = compute_domain_hash("MyGasslessToken", "1", 1337, &TOKEN);
		assert_eq!(ours, sol_domain(1337).separator());

		// Chain id is part of the separation
		let other_chain = compute_domain_hash("MyGasslessToken", "1", 1, &TOKEN);
		assert_ne!(ours, other_chain);
	}

	#[test]
	fn test_digest_matches_alloy_signing_hash() {
		let value = U256::from(1000u64);
		let nonce = U256::from(3u64);
		let deadline = U256::from(1_700_001_800u64);

		let permit = Permit {
			owner: OWNER,
			spender: SPENDER,
			value,
			nonce,
			deadline,
		};
		let expected = permit.eip712_signing_hash(&sol_domain(1337));

		let domain_hash = compute_domain_hash("MyGasslessToken", "1", 1337, &TOKEN);
		let struct_hash = compute_permit_struct_hash(&OWNER, &SPENDER, value, nonce, deadline);
		assert_eq!(compute_final_digest(&domain_hash, &struct_hash), expected);
	}

	#[test]
	fn test_encoder_pads_to_words() {
		let mut enc = Eip712AbiEncoder::new();
		enc.push_address(&OWNER);
		enc.push_u256(U256::from(1u8));
		let buf = enc.finish();

		assert_eq!(buf.len(), 64);
		assert!(buf[..12].iter().all(|b| *b == 0));
		assert_eq!(&buf[12..32], OWNER.as_slice());
		assert_eq!(buf[63], 1);
	}
}
