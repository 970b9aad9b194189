//! Subcommand handlers.
//!
//! Each handler works on an already wired [`PermitContext`], so the same code
//! runs against a live node or an in-memory token.

use permit_account::implementations::local::LocalAccount;
use permit_core::{PermitContext, PermitError, PermitFlow, QueryFacade};
use permit_types::{format_token_amount, Address, PermitAmount, U256};

/// Amount rendering for one token.
pub struct Display {
	decimals: u8,
}

impl Display {
	/// Uses the token's on-chain `decimals()`, falling back to `configured`.
	pub async fn resolve(query: &QueryFacade, configured: u8) -> Self {
		let decimals = match query.get_decimals().await {
			Ok(decimals) => decimals,
			Err(e) => {
				tracing::warn!(error = %e, fallback = configured, "Using configured decimals");
				configured
			},
		};
		Self { decimals }
	}

	pub fn amount(&self, raw: U256) -> String {
		format!("{} ({})", raw, format_token_amount(raw, self.decimals))
	}
}

pub async fn balance(
	context: &PermitContext,
	display: &Display,
	address: Address,
) -> Result<U256, PermitError> {
	let balance = QueryFacade::new(context.token.clone())
		.get_balance(address)
		.await?;
	println!("balance of {}: {}", address, display.amount(balance));
	Ok(balance)
}

pub async fn allowance(
	context: &PermitContext,
	display: &Display,
	owner: Address,
	spender: Address,
) -> Result<U256, PermitError> {
	let allowance = QueryFacade::new(context.token.clone())
		.get_allowance(owner, spender)
		.await?;
	println!(
		"allowance of {} for {}: {}",
		owner,
		spender,
		display.amount(allowance)
	);
	Ok(allowance)
}

/// Builds, signs and submits a permit for the relayer without transferring.
pub async fn permit(
	context: &PermitContext,
	display: &Display,
	amount: PermitAmount,
) -> Result<(), PermitError> {
	let flow = PermitFlow::new(context)?;
	let signed = flow.prepare(amount).await?;
	let message = &signed.permit.message;
	println!(
		"signed permit: owner {} spender {} value {} nonce {} deadline {}",
		message.owner,
		message.spender,
		display.amount(message.value),
		message.nonce,
		message.deadline
	);
	println!(
		"signature: v {} r {} s {}",
		signed.signature.v, signed.signature.r, signed.signature.s
	);

	let receipt = flow.submit(&signed).await?;
	println!(
		"permit confirmed: tx {} block {} gas {}",
		receipt.hash, receipt.block_number, receipt.gas_used
	);

	let query = flow.query();
	let allowance = query.get_allowance(message.owner, message.spender).await?;
	let nonce = query.get_nonce(message.owner).await?;
	println!("allowance now {}, nonce now {}", display.amount(allowance), nonce);
	Ok(())
}

/// Moves tokens with allowance already granted to the relayer.
pub async fn transfer(
	context: &PermitContext,
	display: &Display,
	from: Address,
	to: Address,
	value: U256,
) -> Result<(), PermitError> {
	let flow = PermitFlow::new(context)?;
	let receipt = flow.transfer(from, to, value).await?;
	println!(
		"transferred {} from {} to {}: tx {} block {}",
		display.amount(value),
		from,
		to,
		receipt.hash,
		receipt.block_number
	);
	Ok(())
}

/// Runs the whole permit-and-transfer sequence.
///
/// Without `to`, the tokens go to a freshly generated address.
pub async fn run(
	context: &PermitContext,
	display: &Display,
	to: Option<Address>,
	amount: PermitAmount,
) -> Result<Address, PermitError> {
	let flow = PermitFlow::new(context)?;
	let recipient = to.unwrap_or_else(|| {
		let address = LocalAccount::random().address();
		tracing::info!(recipient = %address, "Generated recipient");
		address
	});

	let parties = [flow.owner(), flow.relayer(), recipient];
	print_balances(flow.query(), display, "before", &parties).await?;

	let outcome = flow.execute(recipient, amount).await?;
	println!(
		"permit tx {} (block {}), transfer tx {} (block {})",
		outcome.permit_receipt.hash,
		outcome.permit_receipt.block_number,
		outcome.transfer_receipt.hash,
		outcome.transfer_receipt.block_number
	);

	print_balances(flow.query(), display, "after", &parties).await?;
	Ok(recipient)
}

async fn print_balances(
	query: &QueryFacade,
	display: &Display,
	label: &str,
	parties: &[Address; 3],
) -> Result<(), PermitError> {
	let balances = query.get_balances(parties).await?;
	for (role, (address, balance)) in ["owner", "relayer", "recipient"]
		.iter()
		.zip(parties.iter().zip(balances))
	{
		println!("{label}: {role} {address} holds {}", display.amount(balance));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use permit_account::AccountService;
	use permit_core::{Account, PermitSettings};
	use permit_token::implementations::memory::MemoryToken;
	use permit_token::TokenService;
	use permit_types::DomainDescriptor;
	use std::sync::Arc;

	async fn context(balance: u64) -> (PermitContext, Address) {
		let owner = LocalAccount::random();
		let owner_address = owner.address();
		let token = MemoryToken::new(
			DomainDescriptor::new("MyGasslessToken", "1", 1337, Address::repeat_byte(0x42)),
			Address::repeat_byte(0xaa),
		)
		.with_decimals(6);
		token.mint(owner_address, U256::from(balance)).await;

		let account = Account::with_signer(Arc::new(AccountService::new(Box::new(owner))))
			.await
			.unwrap();
		let context = PermitContext::new(
			account,
			Arc::new(TokenService::new(Box::new(token))),
			PermitSettings::new("MyGasslessToken", "1"),
		);
		(context, owner_address)
	}

	#[tokio::test]
	async fn test_display_uses_chain_decimals() {
		let (context, _) = context(0).await;
		let display = Display::resolve(&QueryFacade::new(context.token.clone()), 18).await;
		assert_eq!(display.amount(U256::from(1_500_000u64)), "1500000 (1.5)");
	}

	#[tokio::test]
	async fn test_run_moves_full_balance_to_generated_recipient() {
		let (context, owner) = context(1000).await;
		let display = Display { decimals: 6 };

		let recipient = run(&context, &display, None, PermitAmount::FullBalance)
			.await
			.unwrap();

		assert_ne!(recipient, owner);
		assert_eq!(
			balance(&context, &display, recipient).await.unwrap(),
			U256::from(1000u64)
		);
		assert_eq!(
			balance(&context, &display, owner).await.unwrap(),
			U256::ZERO
		);
	}

	#[tokio::test]
	async fn test_permit_then_transfer_commands() {
		let (context, owner) = context(300).await;
		let display = Display { decimals: 6 };
		let relayer = context.relayer();
		let recipient = Address::repeat_byte(0xcc);

		permit(
			&context,
			&display,
			PermitAmount::Exact(U256::from(120u64)),
		)
		.await
		.unwrap();
		assert_eq!(
			allowance(&context, &display, owner, relayer).await.unwrap(),
			U256::from(120u64)
		);

		transfer(&context, &display, owner, recipient, U256::from(120u64))
			.await
			.unwrap();
		assert_eq!(
			balance(&context, &display, recipient).await.unwrap(),
			U256::from(120u64)
		);
	}
}
