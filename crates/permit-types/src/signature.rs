//! Decomposed ECDSA signature as consumed by `permit(..., v, r, s)`.

use alloy_primitives::{uint, B256, U256};
use serde::{Deserialize, Serialize};

/// Largest `s` accepted before a signature counts as malleable (`n / 2`).
pub const SECP256K1_HALF_ORDER: U256 =
	uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// The three canonical components of a secp256k1 signature.
///
/// `v` uses the Ethereum convention (27 or 28) expected by `ecrecover`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
	pub v: u8,
	pub r: B256,
	pub s: B256,
}

impl PermitSignature {
	/// The 65-byte `r || s || v` encoding.
	pub fn to_bytes(&self) -> [u8; 65] {
		let mut out = [0u8; 65];
		out[..32].copy_from_slice(self.r.as_slice());
		out[32..64].copy_from_slice(self.s.as_slice());
		out[64] = self.v;
		out
	}
}
