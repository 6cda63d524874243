//! Local-key EVM wallet
//!
//! Signs with a private key held by the process and talks to one HTTP RPC
//! endpoint per chain. "Switching chain" selects which configured endpoint the
//! next call goes to, after checking the endpoint actually serves that chain.
//!
//! Providers are built per call with `with_recommended_fillers()` so nonce, gas
//! and fees are filled by the node.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::contracts::{BridgeBloc, ERC20};
use crate::redact::Redacted;
use crate::types::Receipt;
use crate::wallet::{DepositCall, Wallet, WalletError};

/// EIP-1193 "user rejected request"
const USER_REJECTED_CODE: &str = "4001";

pub struct LocalEvmWalletConfig {
    pub private_key: Redacted<String>,
    /// chain id -> RPC URL
    pub rpc_urls: HashMap<u64, String>,
    /// Chain selected at startup
    pub initial_chain_id: u64,
    pub receipt_poll_interval: Duration,
}

impl fmt::Debug for LocalEvmWalletConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEvmWalletConfig")
            .field("private_key", &self.private_key)
            .field("rpc_urls", &self.rpc_urls.keys().collect::<Vec<_>>())
            .field("initial_chain_id", &self.initial_chain_id)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .finish()
    }
}

pub struct LocalEvmWallet {
    signer: PrivateKeySigner,
    wallet: EthereumWallet,
    rpc_urls: HashMap<u64, url::Url>,
    chain_id: AtomicU64,
    receipt_poll_interval: Duration,
}

impl LocalEvmWallet {
    pub fn new(config: LocalEvmWalletConfig) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .expose()
            .trim()
            .parse()
            .wrap_err("Invalid private key")?;

        let mut rpc_urls = HashMap::with_capacity(config.rpc_urls.len());
        for (chain_id, raw) in &config.rpc_urls {
            let url = raw
                .parse()
                .wrap_err_with(|| format!("Invalid RPC URL for chain {}", chain_id))?;
            rpc_urls.insert(*chain_id, url);
        }
        if !rpc_urls.contains_key(&config.initial_chain_id) {
            return Err(eyre!(
                "No RPC URL configured for initial chain {}",
                config.initial_chain_id
            ));
        }

        info!(
            address = %signer.address(),
            chains = ?rpc_urls.keys().collect::<Vec<_>>(),
            chain_id = config.initial_chain_id,
            "EVM wallet initialized"
        );

        Ok(Self {
            wallet: EthereumWallet::from(signer.clone()),
            signer,
            rpc_urls,
            chain_id: AtomicU64::new(config.initial_chain_id),
            receipt_poll_interval: config.receipt_poll_interval,
        })
    }

    fn rpc_url(&self, chain_id: u64) -> Result<url::Url, WalletError> {
        self.rpc_urls
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| {
                WalletError::Provider(format!("no RPC URL configured for chain {}", chain_id))
            })
    }

    fn current_url(&self) -> Result<url::Url, WalletError> {
        self.rpc_url(self.chain_id.load(Ordering::SeqCst))
    }
}

/// Map a provider/contract error, recognizing user rejections
fn classify(e: impl fmt::Display) -> WalletError {
    let message = e.to_string();
    let lower = message.to_ascii_lowercase();
    if (lower.contains(USER_REJECTED_CODE) && lower.contains("reject"))
        || lower.contains("user rejected")
        || lower.contains("user denied")
    {
        WalletError::Rejected
    } else {
        WalletError::Provider(message)
    }
}

#[async_trait]
impl Wallet for LocalEvmWallet {
    fn address(&self) -> Option<Address> {
        Some(self.signer.address())
    }

    fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(classify)?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        let url = self.rpc_url(chain_id)?;
        let provider = ProviderBuilder::new().on_http(url);
        let remote = provider.get_chain_id().await.map_err(classify)?;
        if remote != chain_id {
            return Err(WalletError::Provider(format!(
                "RPC for chain {} reports chain id {}",
                chain_id, remote
            )));
        }
        self.chain_id.store(chain_id, Ordering::SeqCst);
        debug!(chain_id, "Switched chain");
        Ok(())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, WalletError> {
        let provider = ProviderBuilder::new().on_http(self.current_url()?);
        let contract = ERC20::new(token, &provider);
        let result = contract
            .allowance(owner, spender)
            .call()
            .await
            .map_err(classify)?;
        Ok(result._0)
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, WalletError> {
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.wallet.clone())
            .on_http(self.current_url()?);
        let contract = ERC20::new(token, &provider);

        let pending = contract
            .approve(spender, amount)
            .send()
            .await
            .map_err(classify)?;
        Ok(*pending.tx_hash())
    }

    async fn deposit(&self, bridge: Address, call: &DepositCall) -> Result<TxHash, WalletError> {
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.wallet.clone())
            .on_http(self.current_url()?);
        let contract = BridgeBloc::new(bridge, &provider);

        let pending = contract
            .deposit(
                call.amount,
                call.source_token,
                call.destination_token,
                call.destination_domain,
                call.recipient,
                call.beneficiary,
            )
            .send()
            .await
            .map_err(classify)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, WalletError> {
        let provider = ProviderBuilder::new().on_http(self.current_url()?);

        loop {
            let receipt = provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(classify)?;

            if let Some(receipt) = receipt {
                return Ok(Receipt {
                    tx_hash,
                    success: receipt.status(),
                    block_number: receipt.block_number,
                });
            }

            debug!(tx_hash = %tx_hash, "Receipt not available yet");
            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Anvil's first default account
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn config() -> LocalEvmWalletConfig {
        LocalEvmWalletConfig {
            private_key: Redacted(TEST_KEY.to_string()),
            rpc_urls: HashMap::from([
                (1, "http://localhost:8545".to_string()),
                (42161, "http://localhost:8546".to_string()),
            ]),
            initial_chain_id: 1,
            receipt_poll_interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_new_wallet() {
        let wallet = LocalEvmWallet::new(config()).unwrap();
        assert_eq!(
            wallet.address().unwrap(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(wallet.chain_id(), 1);
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut bad_key = config();
        bad_key.private_key = Redacted("not-a-key".into());
        assert!(LocalEvmWallet::new(bad_key).is_err());

        let mut missing_rpc = config();
        missing_rpc.initial_chain_id = 10;
        assert!(LocalEvmWallet::new(missing_rpc).is_err());
    }

    #[test]
    fn test_debug_hides_private_key() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
    }

    #[tokio::test]
    async fn test_sign_message_is_deterministic() {
        let wallet = LocalEvmWallet::new(config()).unwrap();
        let a = wallet.sign_message("hello").await.unwrap();
        let b = wallet.sign_message("hello").await.unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        // r || s || v
        assert_eq!(a.len(), 2 + 65 * 2);
    }

    #[tokio::test]
    async fn test_switch_to_unconfigured_chain_fails() {
        let wallet = LocalEvmWallet::new(config()).unwrap();
        let err = wallet.switch_chain(137).await.unwrap_err();
        assert!(matches!(err, WalletError::Provider(_)));
        assert_eq!(wallet.chain_id(), 1);
    }

    #[test]
    fn test_classify_user_rejection() {
        assert_eq!(
            classify("error code 4001: User rejected the request."),
            WalletError::Rejected
        );
        assert_eq!(classify("MetaMask Tx Signature: User denied"), WalletError::Rejected);
        assert!(matches!(
            classify("error code -32000: nonce too low"),
            WalletError::Provider(_)
        ));
    }
}
