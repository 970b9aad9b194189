//! In-memory EIP-2612 token.
//!
//! Reproduces the contract rules the relay depends on (deadline check against
//! the block clock, signer recovery over the domain-bound digest, per-owner
//! nonces, allowance and balance checks) without a node. State changes are
//! applied under a single write lock, so a failing call leaves no partial
//! effect. Useful for tests and for dry runs of the full flow.

use crate::{QueryError, RelayError, RevertReason, TokenInterface};
use alloy_primitives::{keccak256, Address, Signature, B256, U256};
use async_trait::async_trait;
use permit_types::{
	current_timestamp, ConfirmationPolicy, DomainDescriptor, PermitMessage, PermitSignature,
	TransactionReceipt, SECP256K1_HALF_ORDER,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

const PERMIT_GAS: u64 = 80_000;
const TRANSFER_FROM_GAS: u64 = 60_000;

#[derive(Debug, Default)]
struct Ledger {
	balances: HashMap<Address, U256>,
	allowances: HashMap<(Address, Address), U256>,
	nonces: HashMap<Address, U256>,
	block_number: u64,
	timestamp: u64,
}

impl Ledger {
	fn balance(&self, account: &Address) -> U256 {
		self.balances.get(account).copied().unwrap_or_default()
	}

	fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
		self.allowances
			.get(&(*owner, *spender))
			.copied()
			.unwrap_or_default()
	}

	fn nonce(&self, owner: &Address) -> U256 {
		self.nonces.get(owner).copied().unwrap_or_default()
	}

	/// Mines a block for a successful call and returns its receipt.
	fn mine(&mut self, gas_used: u64) -> TransactionReceipt {
		self.block_number += 1;
		self.timestamp += 1;
		let mut seed = [0u8; 16];
		seed[..8].copy_from_slice(&self.block_number.to_be_bytes());
		seed[8..].copy_from_slice(&self.timestamp.to_be_bytes());
		TransactionReceipt {
			hash: keccak256(seed),
			block_number: self.block_number,
			gas_used,
			success: true,
		}
	}
}

/// Token ledger held in process memory.
pub struct MemoryToken {
	domain: DomainDescriptor,
	sender: Address,
	decimals: u8,
	state: RwLock<Ledger>,
}

impl MemoryToken {
	/// Creates an empty token for `domain`, with `sender` as the relayer
	/// (`msg.sender` of every state-changing call).
	///
	/// The block clock starts at the current wall-clock time.
	pub fn new(domain: DomainDescriptor, sender: Address) -> Self {
		Self {
			domain,
			sender,
			decimals: 18,
			state: RwLock::new(Ledger {
				timestamp: current_timestamp(),
				..Ledger::default()
			}),
		}
	}

	pub fn with_decimals(mut self, decimals: u8) -> Self {
		self.decimals = decimals;
		self
	}

	pub fn domain(&self) -> &DomainDescriptor {
		&self.domain
	}

	/// Credits `amount` to `account`.
	pub async fn mint(&self, account: Address, amount: U256) {
		let mut ledger = self.state.write().await;
		let balance = ledger.balance(&account);
		ledger
			.balances
			.insert(account, balance.saturating_add(amount));
	}

	/// Sets the block clock.
	pub async fn set_timestamp(&self, timestamp: u64) {
		self.state.write().await.timestamp = timestamp;
	}

	/// Moves the block clock forward.
	pub async fn advance_time(&self, seconds: u64) {
		let mut ledger = self.state.write().await;
		ledger.timestamp = ledger.timestamp.saturating_add(seconds);
	}
}

/// Recovers the signer the way OpenZeppelin's `ECDSA.recover` does.
///
/// Zero components, `v` outside 27/28 and upper-half `s` values revert with
/// the library's error names instead of being normalized.
fn recover(signature: &PermitSignature, digest: &B256) -> Result<Address, RevertReason> {
	let invalid = |name: &str| RevertReason::Message(name.to_string());
	let r = U256::from_be_bytes(signature.r.0);
	let s = U256::from_be_bytes(signature.s.0);
	if s > SECP256K1_HALF_ORDER {
		return Err(invalid("ECDSAInvalidSignatureS"));
	}
	let parity = match signature.v {
		27 => false,
		28 => true,
		_ => return Err(invalid("ECDSAInvalidSignature")),
	};
	if r.is_zero() || s.is_zero() {
		return Err(invalid("ECDSAInvalidSignature"));
	}
	Signature::new(r, s, parity)
		.recover_address_from_prehash(digest)
		.map_err(|_| invalid("ECDSAInvalidSignature"))
}

#[async_trait]
impl TokenInterface for MemoryToken {
	fn address(&self) -> Address {
		self.domain.verifying_contract
	}

	fn sender(&self) -> Address {
		self.sender
	}

	async fn chain_id(&self) -> Result<u64, QueryError> {
		Ok(self.domain.chain_id)
	}

	async fn block_timestamp(&self) -> Result<u64, QueryError> {
		Ok(self.state.read().await.timestamp)
	}

	async fn balance_of(&self, account: Address) -> Result<U256, QueryError> {
		Ok(self.state.read().await.balance(&account))
	}

	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, QueryError> {
		Ok(self.state.read().await.allowance(&owner, &spender))
	}

	async fn nonces(&self, owner: Address) -> Result<U256, QueryError> {
		Ok(self.state.read().await.nonce(&owner))
	}

	async fn decimals(&self) -> Result<u8, QueryError> {
		Ok(self.decimals)
	}

	async fn domain_separator(&self) -> Result<B256, QueryError> {
		Ok(self.domain.separator())
	}

	async fn permit(
		&self,
		message: &PermitMessage,
		signature: &PermitSignature,
		_policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		let mut ledger = self.state.write().await;

		// Checked against the block this call would be mined in.
		if message.is_expired_at(ledger.timestamp + 1) {
			return Err(RelayError::Reverted {
				reason: RevertReason::ExpiredDeadline {
					deadline: message.deadline,
				},
				tx_hash: None,
			});
		}

		// The contract hashes its own current nonce, not the caller's.
		let current_nonce = ledger.nonce(&message.owner);
		let on_chain = PermitMessage {
			nonce: current_nonce,
			..message.clone()
		};
		let digest = on_chain.signing_hash(&self.domain);

		let signer = recover(signature, &digest).map_err(|reason| RelayError::Reverted {
			reason,
			tx_hash: None,
		})?;
		if signer != message.owner {
			return Err(RelayError::Reverted {
				reason: RevertReason::InvalidSigner {
					signer,
					owner: message.owner,
				},
				tx_hash: None,
			});
		}

		ledger
			.nonces
			.insert(message.owner, current_nonce + U256::from(1));
		ledger
			.allowances
			.insert((message.owner, message.spender), message.value);

		Ok(ledger.mine(PERMIT_GAS))
	}

	async fn transfer_from(
		&self,
		from: Address,
		to: Address,
		value: U256,
		_policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		let mut ledger = self.state.write().await;
		let spender = self.sender;

		let allowance = ledger.allowance(&from, &spender);
		if allowance < value {
			return Err(RelayError::Reverted {
				reason: RevertReason::InsufficientAllowance {
					spender,
					allowance,
					needed: value,
				},
				tx_hash: None,
			});
		}

		let balance = ledger.balance(&from);
		if balance < value {
			return Err(RelayError::Reverted {
				reason: RevertReason::InsufficientBalance {
					sender: from,
					balance,
					needed: value,
				},
				tx_hash: None,
			});
		}

		// An unlimited allowance is never decremented.
		if allowance != U256::MAX {
			ledger.allowances.insert((from, spender), allowance - value);
		}
		ledger.balances.insert(from, balance - value);
		let to_balance = ledger.balance(&to);
		ledger.balances.insert(to, to_balance + value);

		Ok(ledger.mine(TRANSFER_FROM_GAS))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;

	fn token(relayer: Address) -> MemoryToken {
		let domain =
			DomainDescriptor::new("Test Token", "1", 31337, Address::repeat_byte(0x42));
		MemoryToken::new(domain, relayer)
	}

	fn sign(signer: &PrivateKeySigner, message: &PermitMessage, domain: &DomainDescriptor) -> PermitSignature {
		let signature = signer
			.sign_hash_sync(&message.signing_hash(domain))
			.unwrap();
		PermitSignature {
			v: 27 + signature.v() as u8,
			r: B256::from(signature.r().to_be_bytes::<32>()),
			s: B256::from(signature.s().to_be_bytes::<32>()),
		}
	}

	fn message(owner: Address, spender: Address, value: u64, nonce: u64, deadline: u64) -> PermitMessage {
		PermitMessage {
			owner,
			spender,
			value: U256::from(value),
			nonce: U256::from(nonce),
			deadline: U256::from(deadline),
		}
	}

	#[tokio::test]
	async fn test_permit_then_transfer() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let recipient = Address::repeat_byte(0xbb);
		let token = token(relayer);
		token.mint(owner.address(), U256::from(1000u64)).await;
		let now = token.block_timestamp().await.unwrap();

		let msg = message(owner.address(), relayer, 1000, 0, now + 600);
		let sig = sign(&owner, &msg, token.domain());
		let policy = ConfirmationPolicy::default();

		let receipt = token.permit(&msg, &sig, &policy).await.unwrap();
		assert!(receipt.success);
		assert_eq!(token.nonces(owner.address()).await.unwrap(), U256::from(1u64));
		assert_eq!(
			token.allowance(owner.address(), relayer).await.unwrap(),
			U256::from(1000u64)
		);

		token
			.transfer_from(owner.address(), recipient, U256::from(1000u64), &policy)
			.await
			.unwrap();
		assert_eq!(token.balance_of(owner.address()).await.unwrap(), U256::ZERO);
		assert_eq!(
			token.balance_of(recipient).await.unwrap(),
			U256::from(1000u64)
		);
		assert_eq!(
			token.allowance(owner.address(), relayer).await.unwrap(),
			U256::ZERO
		);
	}

	#[tokio::test]
	async fn test_replayed_permit_is_rejected() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let token = token(relayer);
		let now = token.block_timestamp().await.unwrap();

		let msg = message(owner.address(), relayer, 5, 0, now + 600);
		let sig = sign(&owner, &msg, token.domain());
		let policy = ConfirmationPolicy::default();
		token.permit(&msg, &sig, &policy).await.unwrap();

		let err = token.permit(&msg, &sig, &policy).await.unwrap_err();
		assert!(matches!(
			err.revert_reason(),
			Some(RevertReason::InvalidSigner { .. })
		));
		assert_eq!(token.nonces(owner.address()).await.unwrap(), U256::from(1u64));
	}

	#[tokio::test]
	async fn test_expired_deadline_leaves_state_untouched() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let token = token(relayer);
		token.set_timestamp(1_000).await;

		let msg = message(owner.address(), relayer, 5, 0, 999);
		let sig = sign(&owner, &msg, token.domain());
		let err = token
			.permit(&msg, &sig, &ConfirmationPolicy::default())
			.await
			.unwrap_err();

		assert!(err.is_deadline_expired());
		assert_eq!(token.nonces(owner.address()).await.unwrap(), U256::ZERO);
		assert_eq!(
			token.allowance(owner.address(), relayer).await.unwrap(),
			U256::ZERO
		);
	}

	#[tokio::test]
	async fn test_signature_for_other_domain_is_rejected() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let token = token(relayer);
		let now = token.block_timestamp().await.unwrap();
		let other_chain = DomainDescriptor::new("Test Token", "1", 1, Address::repeat_byte(0x42));

		let msg = message(owner.address(), relayer, 5, 0, now + 600);
		let sig = sign(&owner, &msg, &other_chain);
		let err = token
			.permit(&msg, &sig, &ConfirmationPolicy::default())
			.await
			.unwrap_err();
		assert!(matches!(
			err.revert_reason(),
			Some(RevertReason::InvalidSigner { owner, .. }) if *owner == msg.owner
		));
	}

	#[tokio::test]
	async fn test_transfer_beyond_allowance_moves_nothing() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let recipient = Address::repeat_byte(0xbb);
		let token = token(relayer);
		token.mint(owner.address(), U256::from(1000u64)).await;
		let now = token.block_timestamp().await.unwrap();
		let policy = ConfirmationPolicy::default();

		let msg = message(owner.address(), relayer, 100, 0, now + 600);
		let sig = sign(&owner, &msg, token.domain());
		token.permit(&msg, &sig, &policy).await.unwrap();

		let err = token
			.transfer_from(owner.address(), recipient, U256::from(101u64), &policy)
			.await
			.unwrap_err();
		assert!(matches!(
			err.revert_reason(),
			Some(RevertReason::InsufficientAllowance { .. })
		));
		assert_eq!(
			token.balance_of(owner.address()).await.unwrap(),
			U256::from(1000u64)
		);
		assert_eq!(token.balance_of(recipient).await.unwrap(), U256::ZERO);
	}

	#[tokio::test]
	async fn test_transfer_beyond_balance_is_rejected() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let token = token(relayer);
		token.mint(owner.address(), U256::from(10u64)).await;
		let now = token.block_timestamp().await.unwrap();
		let policy = ConfirmationPolicy::default();

		let msg = message(owner.address(), relayer, 50, 0, now + 600);
		let sig = sign(&owner, &msg, token.domain());
		token.permit(&msg, &sig, &policy).await.unwrap();

		let err = token
			.transfer_from(owner.address(), relayer, U256::from(50u64), &policy)
			.await
			.unwrap_err();
		assert!(matches!(
			err.revert_reason(),
			Some(RevertReason::InsufficientBalance { .. })
		));
		assert_eq!(
			token.allowance(owner.address(), relayer).await.unwrap(),
			U256::from(50u64)
		);
	}

	#[test]
	fn test_recover_rejects_bad_v_and_zero_components() {
		let sig = PermitSignature {
			v: 1,
			r: B256::repeat_byte(1),
			s: B256::repeat_byte(1),
		};
		assert_eq!(
			recover(&sig, &B256::ZERO),
			Err(RevertReason::Message("ECDSAInvalidSignature".to_string()))
		);

		let zero_r = PermitSignature {
			v: 27,
			r: B256::ZERO,
			s: B256::repeat_byte(1),
		};
		assert_eq!(
			recover(&zero_r, &B256::ZERO),
			Err(RevertReason::Message("ECDSAInvalidSignature".to_string()))
		);
	}

	#[tokio::test]
	async fn test_malleable_twin_signature_is_rejected() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let token = token(relayer);
		let now = token.block_timestamp().await.unwrap();

		let msg = message(owner.address(), relayer, 5, 0, now + 600);
		let sig = sign(&owner, &msg, token.domain());

		// Same point, other half of the curve order: (n - s, flipped v).
		let order = SECP256K1_HALF_ORDER * U256::from(2u64) + U256::from(1u64);
		let twin = PermitSignature {
			v: if sig.v == 27 { 28 } else { 27 },
			r: sig.r,
			s: B256::from((order - U256::from_be_bytes(sig.s.0)).to_be_bytes::<32>()),
		};

		let err = token
			.permit(&msg, &twin, &ConfirmationPolicy::default())
			.await
			.unwrap_err();
		assert_eq!(
			err.revert_reason(),
			Some(&RevertReason::Message("ECDSAInvalidSignatureS".to_string()))
		);
		assert_eq!(token.nonces(owner.address()).await.unwrap(), U256::ZERO);

		// The canonical form still goes through.
		token
			.permit(&msg, &sig, &ConfirmationPolicy::default())
			.await
			.unwrap();
		assert_eq!(token.nonces(owner.address()).await.unwrap(), U256::from(1u64));
	}

	#[tokio::test]
	async fn test_deadline_is_checked_against_next_block() {
		let owner = PrivateKeySigner::random();
		let relayer = Address::repeat_byte(0xaa);
		let token = token(relayer);
		token.set_timestamp(1_000).await;
		let policy = ConfirmationPolicy::default();

		// The call lands in block 1001, past a deadline equal to the latest block.
		let msg = message(owner.address(), relayer, 5, 0, 1_000);
		let sig = sign(&owner, &msg, token.domain());
		let err = token.permit(&msg, &sig, &policy).await.unwrap_err();
		assert!(err.is_deadline_expired());

		let msg = message(owner.address(), relayer, 5, 0, 1_001);
		let sig = sign(&owner, &msg, token.domain());
		let receipt = token.permit(&msg, &sig, &policy).await.unwrap();
		assert!(receipt.success);
		assert_eq!(token.block_timestamp().await.unwrap(), 1_001);
	}
}
