//! Typed-message builder.
//!
//! Assembles a [`TypedPermit`] from current chain state (balance, nonce, chain
//! id) and the caller's intent (spender, amount). Nothing is cached: the nonce
//! is read immediately before every build.

use crate::context::PermitContext;
use crate::query::QueryFacade;
use permit_token::{QueryError, TokenService};
use permit_types::{
	current_timestamp, Address, DomainDescriptor, PermitAmount, PermitMessage, TypedPermit, B256,
	U256,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that prevent assembling a well-formed permit.
#[derive(Debug, Error)]
pub enum BuildError {
	#[error("Query failed: {0}")]
	Query(#[from] QueryError),
	#[error("Chain id unavailable: {0}")]
	ChainId(String),
	#[error("Connected to chain {actual}, expected chain {expected}")]
	ChainMismatch { expected: u64, actual: u64 },
	#[error("Local domain separator {local} does not match contract's {contract}")]
	DomainMismatch { local: B256, contract: B256 },
}

/// Builds permit messages for one token deployment.
pub struct PermitBuilder {
	query: QueryFacade,
	token: Arc<TokenService>,
	token_name: String,
	token_version: String,
	expected_chain_id: Option<u64>,
	validity_window: Duration,
}

impl PermitBuilder {
	pub fn new(context: &PermitContext) -> Self {
		let settings = &context.settings;
		Self {
			query: QueryFacade::new(context.token.clone()),
			token: context.token.clone(),
			token_name: settings.token_name.clone(),
			token_version: settings.token_version.clone(),
			expected_chain_id: settings.expected_chain_id,
			validity_window: settings.validity_window,
		}
	}

	/// Builds a permit letting `spender` move `amount` of `owner`'s tokens.
	///
	/// A zero balance still yields a well-formed zero-value permit. The
	/// deadline is the local clock plus the validity window.
	pub async fn build(
		&self,
		owner: Address,
		spender: Address,
		amount: PermitAmount,
	) -> Result<TypedPermit, BuildError> {
		let (value, nonce) = tokio::try_join!(
			self.resolve_value(owner, amount),
			self.query.get_nonce(owner)
		)?;
		let domain = self.domain().await?;
		let deadline = U256::from(current_timestamp()) + U256::from(self.validity_window.as_secs());

		tracing::debug!(
			owner = %owner,
			spender = %spender,
			value = %value,
			nonce = %nonce,
			deadline = %deadline,
			chain_id = domain.chain_id,
			"Built permit"
		);

		Ok(TypedPermit {
			domain,
			message: PermitMessage {
				owner,
				spender,
				value,
				nonce,
				deadline,
			},
		})
	}

	/// Domain descriptor for the connected chain.
	pub async fn domain(&self) -> Result<DomainDescriptor, BuildError> {
		let chain_id = self
			.token
			.chain_id()
			.await
			.map_err(|e| BuildError::ChainId(e.to_string()))?;

		if let Some(expected) = self.expected_chain_id {
			if expected != chain_id {
				return Err(BuildError::ChainMismatch {
					expected,
					actual: chain_id,
				});
			}
		}

		Ok(DomainDescriptor::new(
			self.token_name.clone(),
			self.token_version.clone(),
			chain_id,
			self.token.address(),
		))
	}

	/// Compares `domain` with the separator the contract itself computes.
	///
	/// A mismatch means every signature under `domain` would be rejected.
	pub async fn verify_domain(&self, domain: &DomainDescriptor) -> Result<(), BuildError> {
		let contract = self.token.domain_separator().await?;
		let local = domain.separator();
		if local != contract {
			return Err(BuildError::DomainMismatch { local, contract });
		}
		Ok(())
	}

	async fn resolve_value(&self, owner: Address, amount: PermitAmount) -> Result<U256, QueryError> {
		match amount {
			PermitAmount::FullBalance => self.query.get_balance(owner).await,
			PermitAmount::Exact(value) => Ok(value),
		}
	}
}
