//! String formatting utilities.
//!
//! Display helpers only. On-chain values are always raw integers in the
//! token's smallest unit; decimals are applied here for humans and never
//! fed back into a call.

use alloy_primitives::U256;

/// Truncates a hex string (hash, address) for log output.
pub fn truncate_id(id: &str) -> String {
	if id.len() <= 10 {
		id.to_string()
	} else {
		format!("{}..", &id[..10])
	}
}

/// Formats a raw token amount with decimal places for display.
///
/// `format_token_amount(U256::from(1_500_000u64), 6)` yields `"1.5"`.
/// Trailing zeros in the fractional part are dropped.
pub fn format_token_amount(amount: U256, decimals: u8) -> String {
	let raw = amount.to_string();
	if decimals == 0 {
		return raw;
	}

	let decimal_places = decimals as usize;
	let (integer_part, fraction_part) = if raw.len() <= decimal_places {
		("0".to_string(), format!("{:0>width$}", raw, width = decimal_places))
	} else {
		let split = raw.len() - decimal_places;
		(raw[..split].to_string(), raw[split..].to_string())
	};

	let fraction = fraction_part.trim_end_matches('0');
	if fraction.is_empty() {
		integer_part
	} else {
		format!("{}.{}", integer_part, fraction)
	}
}
