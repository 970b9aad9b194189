//! Token contract access for the permit relay.
//!
//! This module is the narrow seam between the permit protocol and the
//! EIP-2612 token it talks to. Reads (`balanceOf`, `allowance`, `nonces`, chain
//! and block state) fail with [`QueryError`] and change nothing. The two
//! state-changing calls, `permit` and `transferFrom`, are sent by the relayer,
//! wait for confirmation and fail with [`RelayError`] carrying the decoded
//! revert reason. Nothing here retries.

use async_trait::async_trait;
use permit_types::{
	Address, ConfirmationPolicy, PermitMessage, PermitSignature, TransactionReceipt, B256, U256,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Solidity bindings for the token contract.
pub mod contracts;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
	pub mod memory;
}

/// Errors from read-only calls. No on-chain state was changed.
#[derive(Debug, Error)]
pub enum QueryError {
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// A view call reached the node but failed or returned garbage.
	#[error("Call to {method} failed: {reason}")]
	Call {
		method: &'static str,
		reason: String,
	},
}

/// Why the token contract refused a state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevertReason {
	#[error("permit deadline {deadline} has expired")]
	ExpiredDeadline { deadline: U256 },
	#[error("recovered signer {signer} does not match owner {owner}")]
	InvalidSigner { signer: Address, owner: Address },
	#[error("nonce mismatch for {account}, current nonce is {current}")]
	InvalidNonce { account: Address, current: U256 },
	#[error("allowance of {spender} is {allowance}, needed {needed}")]
	InsufficientAllowance {
		spender: Address,
		allowance: U256,
		needed: U256,
	},
	#[error("balance of {sender} is {balance}, needed {needed}")]
	InsufficientBalance {
		sender: Address,
		balance: U256,
		needed: U256,
	},
	#[error("{0}")]
	Message(String),
	#[error("no revert reason available")]
	Unknown,
}

impl RevertReason {
	/// Wraps a legacy `Error(string)` revert reason, keeping the text as the
	/// node reported it.
	pub fn from_message(message: &str) -> Self {
		let message = message.trim();
		if message.is_empty() {
			RevertReason::Unknown
		} else {
			RevertReason::Message(message.to_string())
		}
	}

	/// Whether the permit deadline had passed, from the custom error or the
	/// `"ERC20Permit: expired deadline"` string of older tokens.
	pub fn is_expired_deadline(&self) -> bool {
		match self {
			RevertReason::ExpiredDeadline { .. } => true,
			RevertReason::Message(message) => legacy_contains(message, "expired deadline"),
			_ => false,
		}
	}

	/// Whether a permit rebuilt from current chain state could succeed.
	///
	/// Covers expired deadlines and nonce or signer mismatches.
	pub fn is_stale_permit(&self) -> bool {
		match self {
			RevertReason::ExpiredDeadline { .. }
			| RevertReason::InvalidNonce { .. }
			| RevertReason::InvalidSigner { .. } => true,
			RevertReason::Message(message) => {
				legacy_contains(message, "expired deadline")
					|| legacy_contains(message, "invalid signature")
			},
			_ => false,
		}
	}
}

fn legacy_contains(message: &str, needle: &str) -> bool {
	message.to_lowercase().contains(needle)
}

/// Errors from state-changing calls.
#[derive(Debug, Error)]
pub enum RelayError {
	/// The contract rejected the call, either during simulation (no
	/// transaction broadcast, `tx_hash` is `None`) or on-chain.
	#[error("Transaction reverted: {reason}")]
	Reverted {
		reason: RevertReason,
		tx_hash: Option<B256>,
	},
	/// The wait for confirmation was abandoned. The transaction is still
	/// broadcast and may be mined later.
	#[error("Timed out after {timeout:?} waiting for {tx_hash}")]
	ConfirmationTimeout { tx_hash: B256, timeout: Duration },
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
}

impl RelayError {
	pub fn revert_reason(&self) -> Option<&RevertReason> {
		match self {
			RelayError::Reverted { reason, .. } => Some(reason),
			_ => None,
		}
	}

	pub fn is_deadline_expired(&self) -> bool {
		self.revert_reason()
			.is_some_and(RevertReason::is_expired_deadline)
	}
}

/// Trait defining the interface to an EIP-2612 token deployment.
///
/// State-changing calls are sent by the relayer the implementation was built
/// with and block until the receipt satisfies the given policy.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait TokenInterface: Send + Sync {
	/// The token contract address (the EIP-712 verifying contract).
	fn address(&self) -> Address;

	/// Address that sends, and pays for, state-changing calls.
	fn sender(&self) -> Address;

	/// Chain id reported by the connection.
	async fn chain_id(&self) -> Result<u64, QueryError>;

	/// Timestamp of the latest block, the clock `deadline` is checked against.
	async fn block_timestamp(&self) -> Result<u64, QueryError>;

	/// `balanceOf(account)`.
	async fn balance_of(&self, account: Address) -> Result<U256, QueryError>;

	/// `allowance(owner, spender)`.
	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, QueryError>;

	/// `nonces(owner)`.
	async fn nonces(&self, owner: Address) -> Result<U256, QueryError>;

	/// `decimals()`.
	async fn decimals(&self) -> Result<u8, QueryError>;

	/// `DOMAIN_SEPARATOR()`.
	async fn domain_separator(&self) -> Result<B256, QueryError>;

	/// `permit(owner, spender, value, deadline, v, r, s)`.
	async fn permit(
		&self,
		message: &PermitMessage,
		signature: &PermitSignature,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError>;

	/// `transferFrom(from, to, value)`.
	async fn transfer_from(
		&self,
		from: Address,
		to: Address,
		value: U256,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError>;
}

/// Shared handles delegate to the token they point at, so a caller can keep a
/// reference to an implementation it hands to a [`TokenService`].
#[async_trait]
impl<T: TokenInterface + ?Sized> TokenInterface for Arc<T> {
	fn address(&self) -> Address {
		(**self).address()
	}

	fn sender(&self) -> Address {
		(**self).sender()
	}

	async fn chain_id(&self) -> Result<u64, QueryError> {
		(**self).chain_id().await
	}

	async fn block_timestamp(&self) -> Result<u64, QueryError> {
		(**self).block_timestamp().await
	}

	async fn balance_of(&self, account: Address) -> Result<U256, QueryError> {
		(**self).balance_of(account).await
	}

	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, QueryError> {
		(**self).allowance(owner, spender).await
	}

	async fn nonces(&self, owner: Address) -> Result<U256, QueryError> {
		(**self).nonces(owner).await
	}

	async fn decimals(&self) -> Result<u8, QueryError> {
		(**self).decimals().await
	}

	async fn domain_separator(&self) -> Result<B256, QueryError> {
		(**self).domain_separator().await
	}

	async fn permit(
		&self,
		message: &PermitMessage,
		signature: &PermitSignature,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		(**self).permit(message, signature, policy).await
	}

	async fn transfer_from(
		&self,
		from: Address,
		to: Address,
		value: U256,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		(**self).transfer_from(from, to, value, policy).await
	}
}

/// Service wrapping the configured token implementation.
///
/// Adds structured logging around the calls and is what the rest of the
/// workspace holds (behind an `Arc`) instead of a raw implementation.
pub struct TokenService {
	implementation: Box<dyn TokenInterface>,
}

impl TokenService {
	pub fn new(implementation: Box<dyn TokenInterface>) -> Self {
		Self { implementation }
	}

	pub fn address(&self) -> Address {
		self.implementation.address()
	}

	pub fn sender(&self) -> Address {
		self.implementation.sender()
	}

	pub async fn chain_id(&self) -> Result<u64, QueryError> {
		self.implementation.chain_id().await
	}

	pub async fn block_timestamp(&self) -> Result<u64, QueryError> {
		self.implementation.block_timestamp().await
	}

	pub async fn balance_of(&self, account: Address) -> Result<U256, QueryError> {
		self.implementation.balance_of(account).await
	}

	pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, QueryError> {
		self.implementation.allowance(owner, spender).await
	}

	pub async fn nonces(&self, owner: Address) -> Result<U256, QueryError> {
		self.implementation.nonces(owner).await
	}

	pub async fn decimals(&self) -> Result<u8, QueryError> {
		self.implementation.decimals().await
	}

	pub async fn domain_separator(&self) -> Result<B256, QueryError> {
		self.implementation.domain_separator().await
	}

	pub async fn permit(
		&self,
		message: &PermitMessage,
		signature: &PermitSignature,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		tracing::debug!(
			owner = %message.owner,
			spender = %message.spender,
			value = %message.value,
			deadline = %message.deadline,
			"Sending permit"
		);
		let result = self.implementation.permit(message, signature, policy).await;
		log_outcome("permit", &result);
		result
	}

	pub async fn transfer_from(
		&self,
		from: Address,
		to: Address,
		value: U256,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		tracing::debug!(from = %from, to = %to, value = %value, "Sending transferFrom");
		let result = self
			.implementation
			.transfer_from(from, to, value, policy)
			.await;
		log_outcome("transferFrom", &result);
		result
	}
}

fn log_outcome(method: &str, result: &Result<TransactionReceipt, RelayError>) {
	match result {
		Ok(receipt) => tracing::info!(
			method,
			tx_hash = %receipt.hash,
			block_number = receipt.block_number,
			gas_used = receipt.gas_used,
			"Confirmed"
		),
		Err(e) => tracing::warn!(method, error = %e, "Call failed"),
	}
}
