//! Read-only token queries.
//!
//! Every call goes to the chain. Nothing is cached, since balances and nonces
//! can change between two reads.

use futures::future::try_join_all;
use permit_token::{QueryError, TokenService};
use permit_types::{Address, U256};
use std::sync::Arc;

/// Read-only view of the token used standalone and by the message builder.
#[derive(Clone)]
pub struct QueryFacade {
	token: Arc<TokenService>,
}

impl QueryFacade {
	pub fn new(token: Arc<TokenService>) -> Self {
		Self { token }
	}

	/// Token balance of `account` in the token's smallest unit.
	pub async fn get_balance(&self, account: Address) -> Result<U256, QueryError> {
		let balance = self.token.balance_of(account).await?;
		tracing::debug!(account = %account, balance = %balance, "Read balance");
		Ok(balance)
	}

	/// Amount `owner` has currently approved `spender` to move.
	pub async fn get_allowance(&self, owner: Address, spender: Address) -> Result<U256, QueryError> {
		let allowance = self.token.allowance(owner, spender).await?;
		tracing::debug!(owner = %owner, spender = %spender, allowance = %allowance, "Read allowance");
		Ok(allowance)
	}

	/// Current permit nonce of `owner`.
	pub async fn get_nonce(&self, owner: Address) -> Result<U256, QueryError> {
		self.token.nonces(owner).await
	}

	pub async fn get_decimals(&self) -> Result<u8, QueryError> {
		self.token.decimals().await
	}

	/// Balances of several accounts, read concurrently, in input order.
	pub async fn get_balances(&self, accounts: &[Address]) -> Result<Vec<U256>, QueryError> {
		try_join_all(accounts.iter().map(|account| self.get_balance(*account))).await
	}
}
