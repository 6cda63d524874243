//! Contract bindings used by the transfer flow
//!
//! Only the calls the flow needs: ERC20 allowance/approve and the bridge
//! `deposit` entry point.

#![allow(clippy::too_many_arguments)]

use alloy::sol;

sol! {
    /// Minimal ERC20 interface
    #[sol(rpc)]
    contract ERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

sol! {
    /// Bridge deposit contract
    #[sol(rpc)]
    contract BridgeBloc {
        /// Burn/lock `amount` of `sourceToken` for delivery of `destinationToken`
        /// to `recipient` on `destinationDomain`. `beneficiary` is the relayer
        /// that settles on the destination.
        function deposit(
            uint256 amount,
            address sourceToken,
            address destinationToken,
            uint32 destinationDomain,
            address recipient,
            address beneficiary
        ) external;
    }
}
