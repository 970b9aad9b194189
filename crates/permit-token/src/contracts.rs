use crate::RevertReason;
use alloy_sol_types::sol;

sol! {
	#[sol(rpc)]
	interface IERC20Permit {
		function balanceOf(address account) external view returns (uint256);
		function allowance(address owner, address spender) external view returns (uint256);
		function decimals() external view returns (uint8);
		function nonces(address owner) external view returns (uint256);
		function DOMAIN_SEPARATOR() external view returns (bytes32);

		function permit(
			address owner,
			address spender,
			uint256 value,
			uint256 deadline,
			uint8 v,
			bytes32 r,
			bytes32 s
		) external;
		function transferFrom(address from, address to, uint256 value) external returns (bool);

		error ERC2612ExpiredSignature(uint256 deadline);
		error ERC2612InvalidSigner(address signer, address owner);
		error InvalidAccountNonce(address account, uint256 currentNonce);
		error ERC20InsufficientAllowance(address spender, uint256 allowance, uint256 needed);
		error ERC20InsufficientBalance(address sender, uint256 balance, uint256 needed);
	}
}

impl From<IERC20Permit::IERC20PermitErrors> for RevertReason {
	fn from(error: IERC20Permit::IERC20PermitErrors) -> Self {
		use IERC20Permit::IERC20PermitErrors as E;
		match error {
			E::ERC2612ExpiredSignature(e) => RevertReason::ExpiredDeadline {
				deadline: e.deadline,
			},
			E::ERC2612InvalidSigner(e) => RevertReason::InvalidSigner {
				signer: e.signer,
				owner: e.owner,
			},
			E::InvalidAccountNonce(e) => RevertReason::InvalidNonce {
				account: e.account,
				current: e.currentNonce,
			},
			E::ERC20InsufficientAllowance(e) => RevertReason::InsufficientAllowance {
				spender: e.spender,
				allowance: e.allowance,
				needed: e.needed,
			},
			E::ERC20InsufficientBalance(e) => RevertReason::InsufficientBalance {
				sender: e.sender,
				balance: e.balance,
				needed: e.needed,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::IERC20Permit::*;
	use super::*;
	use alloy_primitives::{Address, U256};
	use alloy_sol_types::{SolError, SolInterface};

	#[test]
	fn test_custom_errors_decode_to_reasons() {
		let owner = Address::repeat_byte(0x11);
		let signer = Address::repeat_byte(0x22);
		let data = ERC2612InvalidSigner { signer, owner }.abi_encode();

		let decoded = IERC20PermitErrors::abi_decode(&data).unwrap();
		assert_eq!(
			RevertReason::from(decoded),
			RevertReason::InvalidSigner { signer, owner }
		);

		let data = ERC2612ExpiredSignature {
			deadline: U256::from(99u64),
		}
		.abi_encode();
		let decoded = IERC20PermitErrors::abi_decode(&data).unwrap();
		assert!(matches!(
			RevertReason::from(decoded),
			RevertReason::ExpiredDeadline { deadline } if deadline == U256::from(99u64)
		));
	}
}
