//! Signature codec.
//!
//! Converts between a recoverable secp256k1 [`Signature`] and the `(v, r, s)`
//! triple the token's `permit` call takes, and recovers the signer of a
//! permit independently of the contract.

use permit_types::{
	Address, PermitSignature, Signature, TypedPermit, B256, SECP256K1_HALF_ORDER, U256,
};
use thiserror::Error;

/// Structural problems with a signature.
#[derive(Debug, Error)]
pub enum MalformedSignatureError {
	#[error("Expected 65 signature bytes, got {0}")]
	InvalidLength(usize),
	#[error("Invalid recovery id v = {0}")]
	InvalidV(u8),
	#[error("Signature component is zero")]
	ZeroComponent,
	#[error("Signature s value is in the upper half of the curve order")]
	HighS,
	#[error("Signer recovery failed: {0}")]
	Recovery(String),
}

/// Errors from [`verify_signer`].
#[derive(Debug, Error)]
pub enum VerificationError {
	#[error(transparent)]
	Malformed(#[from] MalformedSignatureError),
	#[error("Recovered signer {recovered} does not match owner {owner}")]
	SignerMismatch { recovered: Address, owner: Address },
}

/// Splits a signature into the `(v, r, s)` fields of `permit`, with `v` in
/// `{27, 28}`.
pub fn decompose(signature: &Signature) -> Result<PermitSignature, MalformedSignatureError> {
	check_components(signature.r(), signature.s())?;
	Ok(PermitSignature {
		v: 27 + u8::from(signature.v()),
		r: B256::from(signature.r().to_be_bytes::<32>()),
		s: B256::from(signature.s().to_be_bytes::<32>()),
	})
}

/// Rebuilds a signature from its `(v, r, s)` fields. `v` may be 27/28 or the
/// bare parity 0/1.
pub fn compose(parts: &PermitSignature) -> Result<Signature, MalformedSignatureError> {
	let parity = match parts.v {
		0 | 27 => false,
		1 | 28 => true,
		v => return Err(MalformedSignatureError::InvalidV(v)),
	};
	let r = U256::from_be_bytes(parts.r.0);
	let s = U256::from_be_bytes(parts.s.0);
	check_components(r, s)?;
	Ok(Signature::new(r, s, parity))
}

/// Parses a 65-byte `r || s || v` signature.
pub fn from_bytes(bytes: &[u8]) -> Result<Signature, MalformedSignatureError> {
	if bytes.len() != 65 {
		return Err(MalformedSignatureError::InvalidLength(bytes.len()));
	}
	compose(&PermitSignature {
		v: bytes[64],
		r: B256::from_slice(&bytes[..32]),
		s: B256::from_slice(&bytes[32..64]),
	})
}

/// Recovers the address that signed `permit`.
pub fn recover_signer(
	permit: &TypedPermit,
	parts: &PermitSignature,
) -> Result<Address, MalformedSignatureError> {
	let signature = compose(parts)?;
	signature
		.recover_address_from_prehash(&permit.signing_hash())
		.map_err(|e| MalformedSignatureError::Recovery(e.to_string()))
}

/// Recovers the signer and requires it to be the permit's owner.
///
/// A mismatch here means the contract would deterministically revert.
pub fn verify_signer(
	permit: &TypedPermit,
	parts: &PermitSignature,
) -> Result<Address, VerificationError> {
	let recovered = recover_signer(permit, parts)?;
	if recovered != permit.message.owner {
		return Err(VerificationError::SignerMismatch {
			recovered,
			owner: permit.message.owner,
		});
	}
	Ok(recovered)
}

fn check_components(r: U256, s: U256) -> Result<(), MalformedSignatureError> {
	if r.is_zero() || s.is_zero() {
		return Err(MalformedSignatureError::ZeroComponent);
	}
	if s > SECP256K1_HALF_ORDER {
		return Err(MalformedSignatureError::HighS);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{keccak256, uint};
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use permit_types::{DomainDescriptor, PermitMessage};

	/// secp256k1 group order.
	const N: U256 =
		uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

	fn permit(owner: Address) -> TypedPermit {
		TypedPermit {
			domain: DomainDescriptor::new("MyGasslessToken", "1", 1337, Address::repeat_byte(0x42)),
			message: PermitMessage {
				owner,
				spender: Address::repeat_byte(2),
				value: U256::from(1000u64),
				nonce: U256::ZERO,
				deadline: U256::from(4_000_000_000u64),
			},
		}
	}

	fn signed_permit() -> (TypedPermit, Signature) {
		let signer = PrivateKeySigner::from_bytes(&keccak256(b"owner")).unwrap();
		let permit = permit(signer.address());
		let signature = signer.sign_hash_sync(&permit.signing_hash()).unwrap();
		(permit, signature)
	}

	#[test]
	fn test_decompose_compose_and_recover() {
		let (permit, signature) = signed_permit();
		let parts = decompose(&signature).unwrap();
		assert!(parts.v == 27 || parts.v == 28);

		assert_eq!(compose(&parts).unwrap(), signature);
		assert_eq!(
			recover_signer(&permit, &parts).unwrap(),
			permit.message.owner
		);
		assert_eq!(from_bytes(&parts.to_bytes()).unwrap(), signature);
	}

	#[test]
	fn test_recovery_is_bound_to_message() {
		let (permit, signature) = signed_permit();
		let parts = decompose(&signature).unwrap();

		let mut tampered = permit.clone();
		tampered.message.value = U256::from(1001u64);
		let err = verify_signer(&tampered, &parts).unwrap_err();
		assert!(matches!(err, VerificationError::SignerMismatch { owner, .. } if owner == permit.message.owner));

		assert!(verify_signer(&permit, &parts).is_ok());
	}

	#[test]
	fn test_structural_failures() {
		assert!(matches!(
			from_bytes(&[0u8; 64]),
			Err(MalformedSignatureError::InvalidLength(64))
		));

		let (_, signature) = signed_permit();
		let mut parts = decompose(&signature).unwrap();
		parts.v = 2;
		assert!(matches!(
			compose(&parts),
			Err(MalformedSignatureError::InvalidV(2))
		));

		// The malleable twin (n - s, flipped parity) of a valid signature.
		let mut twin = decompose(&signature).unwrap();
		twin.s = B256::from((N - signature.s()).to_be_bytes::<32>());
		twin.v = if twin.v == 27 { 28 } else { 27 };
		assert!(matches!(compose(&twin), Err(MalformedSignatureError::HighS)));

		let zero = PermitSignature {
			v: 27,
			r: B256::ZERO,
			s: B256::repeat_byte(1),
		};
		assert!(matches!(
			compose(&zero),
			Err(MalformedSignatureError::ZeroComponent)
		));
	}
}
