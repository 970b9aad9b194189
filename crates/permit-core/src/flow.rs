//! The end-to-end permit protocol.
//!
//! [`PermitFlow`] runs the components in their required order:
//!
//! 1. build the typed message from current chain state
//! 2. sign it locally as the owner
//! 3. decompose the signature and, when enabled, recover the signer and cross
//!    check the domain against the contract
//! 4. submit `permit` from the relayer and wait for confirmation
//! 5. submit `transferFrom` from the relayer and wait for confirmation
//!
//! Steps 4 and 5 are separate transactions. If step 5 fails after step 4
//! confirmed, the allowance stays granted and the error carries the permit
//! transaction hash so the transfer alone can be retried.
//!
//! State-changing calls for one owner never overlap: each owner has an async
//! lock held for the whole submit or execute sequence.

use crate::builder::PermitBuilder;
use crate::codec;
use crate::context::PermitContext;
use crate::query::QueryFacade;
use crate::relay::RelayExecutor;
use crate::signer::OffChainSigner;
use crate::PermitError;
use dashmap::DashMap;
use permit_types::{
	truncate_id, Address, PermitAmount, PermitSignature, TransactionReceipt, TypedPermit, U256,
};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::instrument;

/// A permit ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPermit {
	pub permit: TypedPermit,
	pub signature: PermitSignature,
}

/// Receipts of a completed permit-and-transfer sequence.
#[derive(Debug, Clone)]
pub struct PermitOutcome {
	pub permit: SignedPermit,
	pub permit_receipt: TransactionReceipt,
	pub transfer_receipt: TransactionReceipt,
	pub recipient: Address,
}

/// Orchestrates the permit protocol for one owner and one token.
pub struct PermitFlow {
	owner: Address,
	query: QueryFacade,
	builder: PermitBuilder,
	signer: OffChainSigner,
	relay: RelayExecutor,
	verify_before_submit: bool,
	owner_locks: DashMap<Address, Arc<Mutex<()>>>,
}

impl PermitFlow {
	/// Fails if the context's owner has no signing key.
	pub fn new(context: &PermitContext) -> Result<Self, PermitError> {
		Ok(Self {
			owner: context.owner.address(),
			query: QueryFacade::new(context.token.clone()),
			builder: PermitBuilder::new(context),
			signer: OffChainSigner::new(&context.owner)?,
			relay: RelayExecutor::new(context),
			verify_before_submit: context.settings.verify_before_submit,
			owner_locks: DashMap::new(),
		})
	}

	pub fn owner(&self) -> Address {
		self.owner
	}

	/// The relayer: spender of every permit this flow builds.
	pub fn relayer(&self) -> Address {
		self.relay.relayer()
	}

	pub fn query(&self) -> &QueryFacade {
		&self.query
	}

	pub fn relay(&self) -> &RelayExecutor {
		&self.relay
	}

	/// Builds, signs and decomposes a permit for the relayer.
	///
	/// With verification enabled, the recovered signer must be the owner and
	/// the local domain separator must match the contract's.
	#[instrument(skip(self), fields(owner = %truncate_id(&self.owner.to_string())))]
	pub async fn prepare(&self, amount: PermitAmount) -> Result<SignedPermit, PermitError> {
		let permit = self
			.builder
			.build(self.owner, self.relayer(), amount)
			.await?;
		let signature = self.signer.sign(&permit).await?;
		let signature = codec::decompose(&signature)?;

		if self.verify_before_submit {
			codec::verify_signer(&permit, &signature)?;
			self.builder.verify_domain(&permit.domain).await?;
			tracing::debug!("Signer and domain verified");
		}

		tracing::info!(
			value = %permit.message.value,
			nonce = %permit.message.nonce,
			deadline = %permit.message.deadline,
			"Prepared permit"
		);
		Ok(SignedPermit { permit, signature })
	}

	/// Submits a prepared permit and waits for confirmation.
	#[instrument(skip_all, fields(owner = %truncate_id(&signed.permit.message.owner.to_string())))]
	pub async fn submit(&self, signed: &SignedPermit) -> Result<TransactionReceipt, PermitError> {
		let _guard = self.lock_owner(signed.permit.message.owner).await;
		self.submit_locked(signed).await
	}

	/// Moves `value` from `from` to `to` using allowance already granted to
	/// the relayer.
	#[instrument(skip(self), fields(from = %truncate_id(&from.to_string())))]
	pub async fn transfer(
		&self,
		from: Address,
		to: Address,
		value: U256,
	) -> Result<TransactionReceipt, PermitError> {
		let _guard = self.lock_owner(from).await;
		self.relay
			.delegated_transfer(from, to, value)
			.await
			.map_err(|source| PermitError::Transfer {
				permit_tx: None,
				source,
			})
	}

	/// Runs the full sequence: prepare, permit, then transfer the permitted
	/// value to `recipient`.
	#[instrument(skip(self), fields(owner = %truncate_id(&self.owner.to_string())))]
	pub async fn execute(
		&self,
		recipient: Address,
		amount: PermitAmount,
	) -> Result<PermitOutcome, PermitError> {
		let _guard = self.lock_owner(self.owner).await;

		let signed = self.prepare(amount).await?;
		let permit_receipt = self.submit_locked(&signed).await?;

		let message = &signed.permit.message;
		let transfer_receipt = self
			.relay
			.delegated_transfer(message.owner, recipient, message.value)
			.await
			.map_err(|source| {
				tracing::warn!(
					permit_tx = %permit_receipt.hash,
					error = %source,
					"Permit confirmed but transfer failed, allowance remains granted"
				);
				PermitError::Transfer {
					permit_tx: Some(permit_receipt.hash),
					source,
				}
			})?;

		tracing::info!(
			recipient = %recipient,
			value = %message.value,
			transfer_tx = %transfer_receipt.hash,
			"Permit sequence completed"
		);

		Ok(PermitOutcome {
			permit: signed,
			permit_receipt,
			transfer_receipt,
			recipient,
		})
	}

	async fn submit_locked(&self, signed: &SignedPermit) -> Result<TransactionReceipt, PermitError> {
		let message = &signed.permit.message;
		match self.relay.submit_permit(message, &signed.signature).await {
			Ok(receipt) => Ok(receipt),
			Err(source) => {
				let current_nonce = self.query.get_nonce(message.owner).await.ok();
				tracing::warn!(
					error = %source,
					expected_nonce = %message.nonce,
					current_nonce = ?current_nonce,
					"Permit rejected"
				);
				Err(PermitError::Relay {
					source,
					expected_nonce: message.nonce,
					current_nonce,
				})
			},
		}
	}

	async fn lock_owner(&self, owner: Address) -> OwnerGuard<'_> {
		let lock = self
			.owner_locks
			.entry(owner)
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		OwnerGuard {
			guard: Some(lock.lock_owned().await),
			owner,
			locks: &self.owner_locks,
		}
	}
}

/// Holds an owner's lock. On release the table entry is dropped unless
/// another task is waiting on it.
struct OwnerGuard<'a> {
	guard: Option<OwnedMutexGuard<()>>,
	owner: Address,
	locks: &'a DashMap<Address, Arc<Mutex<()>>>,
}

impl Drop for OwnerGuard<'_> {
	fn drop(&mut self) {
		drop(self.guard.take());
		self.locks
			.remove_if(&self.owner, |_, lock| Arc::strong_count(lock) == 1);
	}
}
