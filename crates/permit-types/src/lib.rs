//! Common types module for the permit relay system.
//!
//! This module defines the data types shared by every crate in the workspace:
//! the EIP-712 domain and `Permit` message, the decomposed `(v, r, s)` signature,
//! transaction receipts and confirmation policies, and the redacting secret
//! wrapper used for private keys.

/// Transaction delivery types for blockchain interactions.
pub mod delivery;
/// EIP-712 domain descriptor for the token contract.
pub mod domain;
/// Permit message, amount policy and typed-data payload.
pub mod permit;
/// Redacting string wrapper for key material.
pub mod secret_string;
/// Decomposed signature representation used by the `permit` call.
pub mod signature;
/// Utility functions for hashing, formatting and time.
pub mod utils;

pub use alloy_primitives::{Address, Signature, B256, U256};
pub use delivery::*;
pub use domain::DomainDescriptor;
pub use permit::{PermitAmount, PermitMessage, TypedPermit};
pub use secret_string::SecretString;
pub use signature::{PermitSignature, SECP256K1_HALF_ORDER};
pub use utils::{current_timestamp, format_token_amount, truncate_id};
