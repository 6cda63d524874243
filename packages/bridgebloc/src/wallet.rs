//! Wallet Collaborator Interface
//!
//! Everything the orchestrator needs from the connected wallet and its provider.
//! Contract ABI encoding lives behind this trait; see
//! [`crate::evm::LocalEvmWallet`] for the alloy-backed implementation.

use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::types::Receipt;

/// Failure reported by the wallet or its provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// The user declined the request in the wallet
    #[error("request rejected by user")]
    Rejected,

    #[error("wallet is not connected")]
    Disconnected,

    #[error("provider error: {0}")]
    Provider(String),
}

/// Arguments of the bridge `deposit` call, already resolved to on-chain types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositCall {
    /// Amount in source token base units
    pub amount: U256,
    pub source_token: Address,
    pub destination_token: Address,
    /// Numeric bridge domain of the destination chain
    pub destination_domain: u32,
    /// Account credited on the destination chain
    pub recipient: Address,
    /// Relay backend address designated as beneficiary
    pub beneficiary: Address,
}

#[async_trait]
pub trait Wallet: Send + Sync {
    /// Currently connected account, `None` when disconnected
    fn address(&self) -> Option<Address>;

    /// Native chain ID of the network the wallet is connected to
    fn chain_id(&self) -> u64;

    /// Sign a plain-text message (EIP-191), returning a 0x-prefixed signature
    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;

    /// Switch the connected network; resolves once the switch has completed
    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError>;

    /// ERC20 `allowance(owner, spender)` on the current chain
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, WalletError>;

    /// ERC20 `approve(spender, amount)`; resolves once the wallet broadcast it
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, WalletError>;

    /// Bridge `deposit(...)`; resolves with the pending transaction hash
    async fn deposit(&self, bridge: Address, call: &DepositCall) -> Result<TxHash, WalletError>;

    /// Resolve once the transaction is included. Never times out on its own.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, WalletError>;
}
