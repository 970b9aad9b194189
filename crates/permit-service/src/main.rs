//! Main entry point for the permit relay.
//!
//! Connects the owner and relayer accounts to one EIP-2612 token and runs a
//! single protocol step per invocation: read balances or allowances, grant a
//! permit, perform a delegated transfer, or run the whole sequence.

use clap::{Parser, Subcommand};
use permit_config::Config;
use permit_core::{PermitContext, QueryFacade};
use permit_types::{Address, PermitAmount, U256};
use std::path::PathBuf;

mod commands;

/// Command-line arguments for the permit relay.
#[derive(Parser, Debug)]
#[command(name = "permit-relay", author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show the token balance of an address
	Balance { address: Address },
	/// Show how much `spender` may move on behalf of `owner`
	Allowance { owner: Address, spender: Address },
	/// Sign a permit for the relayer and submit it, without transferring
	Permit {
		/// Amount in smallest units; defaults to the owner's full balance
		#[arg(long)]
		value: Option<U256>,
		/// Skip signer recovery and domain cross-check before submitting
		#[arg(long)]
		no_verify: bool,
	},
	/// Transfer with allowance already granted to the relayer
	Transfer { from: Address, to: Address, value: U256 },
	/// Permit and transfer in one sequence
	Run {
		/// Recipient; a fresh random address when omitted
		#[arg(long)]
		to: Option<Address>,
		/// Amount in smallest units; defaults to the owner's full balance
		#[arg(long)]
		value: Option<U256>,
	},
}

fn permit_amount(value: Option<U256>) -> PermitAmount {
	value.map_or(PermitAmount::FullBalance, PermitAmount::Exact)
}

/// Main entry point for the permit relay.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Connects to the token and runs the requested command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!(
		config = %args.config.display(),
		token = %config.token.address,
		"Loaded configuration"
	);

	let mut context = PermitContext::connect(&config).await?;
	let display =
		commands::Display::resolve(&QueryFacade::new(context.token.clone()), config.token.decimals)
			.await;

	match args.command {
		Command::Balance { address } => {
			commands::balance(&context, &display, address).await?;
		},
		Command::Allowance { owner, spender } => {
			commands::allowance(&context, &display, owner, spender).await?;
		},
		Command::Permit { value, no_verify } => {
			if no_verify {
				context.settings.verify_before_submit = false;
			}
			commands::permit(&context, &display, permit_amount(value)).await?;
		},
		Command::Transfer { from, to, value } => {
			commands::transfer(&context, &display, from, to, value).await?;
		},
		Command::Run { to, value } => {
			commands::run(&context, &display, to, permit_amount(value)).await?;
		},
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use permit_config::builders::ConfigBuilder;
	use tempfile::tempdir;

	#[test]
	fn test_parse_run_defaults() {
		let args = Args::try_parse_from(["permit-relay", "run"]).unwrap();
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
		match args.command {
			Command::Run { to, value } => {
				assert!(to.is_none());
				assert_eq!(permit_amount(value), PermitAmount::FullBalance);
			},
			other => panic!("unexpected command: {other:?}"),
		}
	}

	#[test]
	fn test_parse_addresses_and_amounts() {
		let args = Args::try_parse_from([
			"permit-relay",
			"--config",
			"relay.toml",
			"transfer",
			"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
			"0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
			"1000",
		])
		.unwrap();
		assert_eq!(args.config, PathBuf::from("relay.toml"));
		match args.command {
			Command::Transfer { value, .. } => assert_eq!(value, U256::from(1000u64)),
			other => panic!("unexpected command: {other:?}"),
		}

		let args =
			Args::try_parse_from(["permit-relay", "permit", "--value", "7", "--no-verify"]).unwrap();
		match args.command {
			Command::Permit { value, no_verify } => {
				assert_eq!(permit_amount(value), PermitAmount::Exact(U256::from(7u64)));
				assert!(no_verify);
			},
			other => panic!("unexpected command: {other:?}"),
		}

		assert!(Args::try_parse_from(["permit-relay", "balance", "not-an-address"]).is_err());
	}

	#[tokio::test]
	async fn test_config_file_loads() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("config.toml");
		let expected = ConfigBuilder::new().build();
		std::fs::write(
			&path,
			format!(
				r#"
[network]
rpc_url = "{}"
chain_id = 31337

[token]
address = "{}"
name = "{}"

[accounts]
owner_private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
relayer_private_key = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
"#,
				expected.network.rpc_url, expected.token.address, expected.token.name
			),
		)
		.unwrap();

		let config = Config::from_file(&path).await.unwrap();
		assert_eq!(config.token.address, expected.token.address);
		assert_eq!(config.permit.validity_window_seconds, 1800);
		assert!(config.permit.verify_before_submit);
	}
}
