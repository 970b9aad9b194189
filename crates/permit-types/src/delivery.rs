//! Transaction delivery types for the permit relay system.
//!
//! This module defines types related to submitting state-changing calls and
//! waiting for them to be confirmed, including receipts and the policy that
//! bounds how long the client waits.

use alloy_primitives::B256;
use std::time::Duration;

/// Transaction receipt containing execution details.
///
/// Provides information about a transaction after it has been included in a block,
/// including its success status and block number.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionReceipt {
	/// The hash of the transaction.
	pub hash: B256,
	/// The block number where the transaction was included.
	pub block_number: u64,
	/// Gas consumed by the transaction, paid by the relayer.
	pub gas_used: u64,
	/// Whether the transaction executed successfully.
	pub success: bool,
}

/// How long and how deep the client waits after broadcasting a transaction.
///
/// Hitting the timeout only stops the wait. A broadcast transaction cannot be
/// recalled and may still be mined afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
	/// Number of blocks on top of the inclusion block before returning.
	pub confirmations: u64,
	/// Upper bound on the wait for the receipt.
	pub timeout: Duration,
}

impl ConfirmationPolicy {
	pub fn new(confirmations: u64, timeout: Duration) -> Self {
		Self {
			confirmations: confirmations.max(1),
			timeout,
		}
	}
}

impl Default for ConfirmationPolicy {
	fn default() -> Self {
		Self::new(1, Duration::from_secs(120))
	}
}
