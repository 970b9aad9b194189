//! Relay executor.
//!
//! Sends the two state-changing calls of the protocol from the relayer: the
//! `permit` that grants the allowance and the `transferFrom` that consumes it.
//! Each call waits for confirmation under the configured policy. Failures are
//! returned as-is; nothing is retried.

use crate::context::PermitContext;
use permit_token::{RelayError, RevertReason, TokenService};
use permit_types::{Address, ConfirmationPolicy, PermitMessage, PermitSignature, TransactionReceipt, U256};
use std::sync::Arc;

/// Submits permits and delegated transfers as the relayer.
pub struct RelayExecutor {
	token: Arc<TokenService>,
	policy: ConfirmationPolicy,
}

impl RelayExecutor {
	pub fn new(context: &PermitContext) -> Self {
		Self {
			token: context.token.clone(),
			policy: context.settings.confirmation,
		}
	}

	/// Overrides the confirmation policy, e.g. for a caller-specific timeout.
	pub fn with_policy(mut self, policy: ConfirmationPolicy) -> Self {
		self.policy = policy;
		self
	}

	pub fn policy(&self) -> &ConfirmationPolicy {
		&self.policy
	}

	/// Address every call is sent from.
	pub fn relayer(&self) -> Address {
		self.token.sender()
	}

	/// Calls `permit(owner, spender, value, deadline, v, r, s)`.
	///
	/// A message whose deadline is already behind the latest block is rejected
	/// locally with the same reason the contract would give, before any fee is
	/// spent. On success the allowance for (owner, spender) equals `value` and
	/// the owner's nonce has advanced by one.
	pub async fn submit_permit(
		&self,
		message: &PermitMessage,
		signature: &PermitSignature,
	) -> Result<TransactionReceipt, RelayError> {
		let now = self
			.token
			.block_timestamp()
			.await
			.map_err(|e| RelayError::Network(e.to_string()))?;

		if message.is_expired_at(now) {
			tracing::warn!(
				owner = %message.owner,
				deadline = %message.deadline,
				block_timestamp = now,
				"Permit deadline already passed, not broadcasting"
			);
			return Err(RelayError::Reverted {
				reason: RevertReason::ExpiredDeadline {
					deadline: message.deadline,
				},
				tx_hash: None,
			});
		}

		self.token.permit(message, signature, &self.policy).await
	}

	/// Calls `transferFrom(from, to, value)`, consuming allowance granted to
	/// the relayer.
	///
	/// Safe to retry with the same arguments while the allowance is unchanged.
	pub async fn delegated_transfer(
		&self,
		from: Address,
		to: Address,
		value: U256,
	) -> Result<TransactionReceipt, RelayError> {
		self.token
			.transfer_from(from, to, value, &self.policy)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::context::{Account, PermitSettings};
	use permit_token::MockTokenInterface;
	use permit_types::B256;
	use std::time::Duration;

	fn executor(mock: MockTokenInterface) -> RelayExecutor {
		let context = PermitContext::new(
			Account::address_only(Address::repeat_byte(1)),
			Arc::new(TokenService::new(Box::new(mock))),
			PermitSettings::new("MyGasslessToken", "1"),
		);
		RelayExecutor::new(&context)
	}

	fn message(deadline: u64) -> PermitMessage {
		PermitMessage {
			owner: Address::repeat_byte(1),
			spender: Address::repeat_byte(2),
			value: U256::from(10u64),
			nonce: U256::ZERO,
			deadline: U256::from(deadline),
		}
	}

	fn signature() -> PermitSignature {
		PermitSignature {
			v: 27,
			r: B256::repeat_byte(1),
			s: B256::repeat_byte(2),
		}
	}

	#[tokio::test]
	async fn test_expired_deadline_is_not_broadcast() {
		let mut mock = MockTokenInterface::new();
		mock.expect_block_timestamp().returning(|| Ok(1_000));
		mock.expect_permit().never();

		let err = executor(mock)
			.submit_permit(&message(999), &signature())
			.await
			.unwrap_err();
		assert!(err.is_deadline_expired());
	}

	#[tokio::test]
	async fn test_deadline_equal_to_block_time_is_sent() {
		let mut mock = MockTokenInterface::new();
		mock.expect_block_timestamp().returning(|| Ok(1_000));
		mock.expect_permit().times(1).returning(|_, _, _| {
			Ok(TransactionReceipt {
				hash: B256::repeat_byte(9),
				block_number: 5,
				gas_used: 50_000,
				success: true,
			})
		});

		let receipt = executor(mock)
			.submit_permit(&message(1_000), &signature())
			.await
			.unwrap();
		assert_eq!(receipt.block_number, 5);
	}

	#[tokio::test]
	async fn test_confirmation_timeout_keeps_tx_hash() {
		let mut mock = MockTokenInterface::new();
		mock.expect_transfer_from()
			.withf(|_, _, _, policy| policy.timeout == Duration::from_secs(3))
			.returning(|_, _, _, policy| {
				Err(RelayError::ConfirmationTimeout {
					tx_hash: B256::repeat_byte(7),
					timeout: policy.timeout,
				})
			});

		let executor =
			executor(mock).with_policy(ConfirmationPolicy::new(1, Duration::from_secs(3)));
		let err = executor
			.delegated_transfer(Address::repeat_byte(1), Address::repeat_byte(3), U256::from(1u64))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			RelayError::ConfirmationTimeout { tx_hash, .. } if tx_hash == B256::repeat_byte(7)
		));
	}
}
