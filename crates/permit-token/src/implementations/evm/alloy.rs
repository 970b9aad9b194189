//! Token access over JSON-RPC using the Alloy library.
//!
//! View calls go through the generated `IERC20Permit` bindings. State-changing
//! calls are signed by the relayer wallet the provider was built with, so the
//! relayer is `msg.sender` and pays gas. Reverts are decoded from the node's
//! error payload into [`RevertReason`] where possible.

use crate::contracts::IERC20Permit::{self, IERC20PermitErrors, IERC20PermitInstance};
use crate::{QueryError, RelayError, RevertReason, TokenInterface};
use alloy_contract::SolCallBuilder;
use alloy_network::{Ethereum, EthereumWallet, NetworkWallet};
use alloy_primitives::{Address, B256, U256};
use alloy_provider::{DynProvider, PendingTransactionError, Provider, ProviderBuilder, WatchTxError};
use alloy_rpc_types::{BlockId, BlockNumberOrTag};
use alloy_sol_types::{Revert, SolCall, SolError, SolInterface};
use async_trait::async_trait;
use permit_types::{ConfirmationPolicy, PermitMessage, PermitSignature, TransactionReceipt};
use std::time::Duration;

/// Alloy-based token implementation for a single deployment.
pub struct AlloyToken {
	provider: DynProvider,
	contract: IERC20PermitInstance<DynProvider>,
	sender: Address,
}

impl AlloyToken {
	/// Connects to `rpc_url` and binds the token at `token`.
	///
	/// `wallet` signs every state-changing transaction this instance sends.
	pub async fn connect(
		rpc_url: &str,
		token: Address,
		wallet: EthereumWallet,
	) -> Result<Self, QueryError> {
		let sender = <EthereumWallet as NetworkWallet<Ethereum>>::default_signer_address(&wallet);

		let provider = ProviderBuilder::new()
			.wallet(wallet)
			.connect(rpc_url)
			.await
			.map_err(|e| QueryError::Network(format!("Failed to connect to {}: {}", rpc_url, e)))?;

		provider
			.client()
			.set_poll_interval(Duration::from_secs(2));

		let provider = provider.erased();
		let contract = IERC20Permit::new(token, provider.clone());

		tracing::info!(token = %token, relayer = %sender, "Connected token provider");

		Ok(Self {
			provider,
			contract,
			sender,
		})
	}

	/// Sends `call` as the relayer and waits for the receipt to satisfy
	/// `policy`.
	///
	/// A transaction that is mined with failed status is replayed against its
	/// block to recover the revert reason.
	async fn send_and_confirm<C>(
		&self,
		method: &'static str,
		call: SolCallBuilder<&DynProvider, C>,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError>
	where
		C: SolCall + Send + Sync,
	{
		let pending = call.send().await.map_err(|e| send_error(method, e))?;
		let tx_hash = *pending.tx_hash();
		tracing::info!(method, tx_hash = %tx_hash, "Submitted transaction");

		let receipt = pending
			.with_required_confirmations(policy.confirmations)
			.with_timeout(Some(policy.timeout))
			.get_receipt()
			.await
			.map_err(|e| match e {
				PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
					RelayError::ConfirmationTimeout {
						tx_hash,
						timeout: policy.timeout,
					}
				},
				other => RelayError::Network(format!(
					"Failed to confirm {} transaction {}: {}",
					method, tx_hash, other
				)),
			})?;

		if !receipt.status() {
			let replay = match receipt.block_number {
				Some(block) => call.call().block(BlockId::number(block)).await.map(|_| ()),
				None => Ok(()),
			};
			let reason = replayed_revert_reason(replay);
			tracing::warn!(
				method,
				tx_hash = %tx_hash,
				reason = %reason,
				"Transaction reverted on-chain"
			);
			return Err(RelayError::Reverted {
				reason,
				tx_hash: Some(tx_hash),
			});
		}

		Ok(TransactionReceipt {
			hash: receipt.transaction_hash,
			block_number: receipt.block_number.unwrap_or(0),
			gas_used: receipt.gas_used,
			success: true,
		})
	}
}

/// Reason for a mined revert, taken from replaying the call at its block.
///
/// A replay that succeeds or fails without revert data leaves the reason
/// unknown.
fn replayed_revert_reason<T>(replay: Result<T, alloy_contract::Error>) -> RevertReason {
	match replay {
		Ok(_) => RevertReason::Unknown,
		Err(e) => decode_revert(&e).unwrap_or(RevertReason::Unknown),
	}
}

/// Extracts a typed revert reason from a contract call error, if the node
/// reported one.
fn decode_revert(error: &alloy_contract::Error) -> Option<RevertReason> {
	if let Some(data) = error.as_revert_data() {
		return Some(revert_reason_from_data(&data));
	}

	// Some nodes only report a message without revert data.
	let text = error.to_string();
	text.contains("execution reverted")
		.then(|| RevertReason::from_message(&text))
}

/// Decodes OpenZeppelin custom errors first, then a legacy `Error(string)`.
fn revert_reason_from_data(data: &[u8]) -> RevertReason {
	if let Ok(custom) = IERC20PermitErrors::abi_decode(data) {
		return custom.into();
	}
	if let Ok(revert) = Revert::abi_decode(data) {
		return RevertReason::from_message(&revert.reason);
	}
	RevertReason::Message(format!(
		"undecoded revert data {}",
		alloy_primitives::hex::encode_prefixed(data)
	))
}

fn send_error(method: &'static str, error: alloy_contract::Error) -> RelayError {
	match decode_revert(&error) {
		Some(reason) => RelayError::Reverted {
			reason,
			tx_hash: None,
		},
		None => RelayError::Network(format!("Failed to send {}: {}", method, error)),
	}
}

fn call_error(method: &'static str, error: alloy_contract::Error) -> QueryError {
	QueryError::Call {
		method,
		reason: error.to_string(),
	}
}

#[async_trait]
impl TokenInterface for AlloyToken {
	fn address(&self) -> Address {
		*self.contract.address()
	}

	fn sender(&self) -> Address {
		self.sender
	}

	async fn chain_id(&self) -> Result<u64, QueryError> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| QueryError::Network(format!("Failed to get chain id: {}", e)))
	}

	async fn block_timestamp(&self) -> Result<u64, QueryError> {
		let block = self
			.provider
			.get_block_by_number(BlockNumberOrTag::Latest)
			.await
			.map_err(|e| QueryError::Network(format!("Failed to get latest block: {}", e)))?
			.ok_or_else(|| QueryError::Network("Latest block not available".to_string()))?;
		Ok(block.header.timestamp)
	}

	async fn balance_of(&self, account: Address) -> Result<U256, QueryError> {
		self.contract
			.balanceOf(account)
			.call()
			.await
			.map_err(|e| call_error("balanceOf", e))
	}

	async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, QueryError> {
		self.contract
			.allowance(owner, spender)
			.call()
			.await
			.map_err(|e| call_error("allowance", e))
	}

	async fn nonces(&self, owner: Address) -> Result<U256, QueryError> {
		self.contract
			.nonces(owner)
			.call()
			.await
			.map_err(|e| call_error("nonces", e))
	}

	async fn decimals(&self) -> Result<u8, QueryError> {
		self.contract
			.decimals()
			.call()
			.await
			.map_err(|e| call_error("decimals", e))
	}

	async fn domain_separator(&self) -> Result<B256, QueryError> {
		self.contract
			.DOMAIN_SEPARATOR()
			.call()
			.await
			.map_err(|e| call_error("DOMAIN_SEPARATOR", e))
	}

	async fn permit(
		&self,
		message: &PermitMessage,
		signature: &PermitSignature,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		let call = self.contract.permit(
			message.owner,
			message.spender,
			message.value,
			message.deadline,
			signature.v,
			signature.r,
			signature.s,
		);
		self.send_and_confirm("permit", call, policy).await
	}

	async fn transfer_from(
		&self,
		from: Address,
		to: Address,
		value: U256,
		policy: &ConfirmationPolicy,
	) -> Result<TransactionReceipt, RelayError> {
		let call = self.contract.transferFrom(from, to, value);
		self.send_and_confirm("transferFrom", call, policy).await
	}
}

/// Factory function to create a JSON-RPC backed token from configuration.
///
/// # Parameters
/// - `rpc_url`: HTTP(S) endpoint of the node
/// - `token`: address of the EIP-2612 token contract
/// - `relayer_wallet`: wallet that signs and pays for `permit` and `transferFrom`
pub async fn create_evm_token(
	rpc_url: &str,
	token: Address,
	relayer_wallet: EthereumWallet,
) -> Result<Box<dyn TokenInterface>, QueryError> {
	Ok(Box::new(
		AlloyToken::connect(rpc_url, token, relayer_wallet).await?,
	))
}
