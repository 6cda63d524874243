//! EVM implementation of the [`crate::wallet::Wallet`] seam

pub mod contracts;
pub mod wallet;

pub use wallet::{LocalEvmWallet, LocalEvmWalletConfig};
