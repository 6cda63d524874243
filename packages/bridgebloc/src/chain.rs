//! Chain alignment: make sure the wallet points at the transfer's source chain
//! before any chain-specific read or write.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::TransferError;
use crate::wallet::{Wallet, WalletError};

pub struct ChainAligner {
    wallet: Arc<dyn Wallet>,
}

impl ChainAligner {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }

    pub fn is_aligned(&self, required_chain_id: u64) -> bool {
        self.wallet.chain_id() == required_chain_id
    }

    /// No-op if already connected to `required_chain_id`, otherwise switch and
    /// wait for the switch to complete.
    pub async fn ensure_chain(&self, required_chain_id: u64) -> Result<(), TransferError> {
        if self.is_aligned(required_chain_id) {
            debug!(chain_id = required_chain_id, "Wallet already on required chain");
            return Ok(());
        }

        let current = self.wallet.chain_id();

        info!(from = current, to = required_chain_id, "Requesting network switch");
        self.wallet
            .switch_chain(required_chain_id)
            .await
            .map_err(|e| match e {
                WalletError::Rejected => TransferError::NetworkSwitchRejected,
                other => TransferError::NetworkSwitchFailed(other.to_string()),
            })?;

        if !self.is_aligned(required_chain_id) {
            return Err(TransferError::NetworkSwitchFailed(format!(
                "wallet reports chain {} after switching to {}",
                self.wallet.chain_id(),
                required_chain_id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWallet;
    use alloy::primitives::Address;

    #[tokio::test]
    async fn test_no_switch_when_aligned() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)).on_chain(1));
        let aligner = ChainAligner::new(wallet.clone());

        aligner.ensure_chain(1).await.unwrap();

        assert_eq!(wallet.switch_count(), 0);
        assert!(aligner.is_aligned(1));
    }

    #[tokio::test]
    async fn test_switches_when_misaligned() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)).on_chain(1));
        let aligner = ChainAligner::new(wallet.clone());

        aligner.ensure_chain(42161).await.unwrap();

        assert_eq!(wallet.switch_count(), 1);
        assert_eq!(wallet.chain_id(), 42161);
    }

    #[tokio::test]
    async fn test_switch_rejected() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)).on_chain(1));
        wallet.reject_switch(true);
        let aligner = ChainAligner::new(wallet.clone());

        let err = aligner.ensure_chain(137).await.unwrap_err();

        assert_eq!(err, TransferError::NetworkSwitchRejected);
        assert_eq!(wallet.chain_id(), 1);
    }

    #[tokio::test]
    async fn test_switch_provider_failure() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)).on_chain(1));
        wallet.fail_switch(Some("unrecognized chain".into()));
        let aligner = ChainAligner::new(wallet);

        let err = aligner.ensure_chain(137).await.unwrap_err();

        assert!(matches!(err, TransferError::NetworkSwitchFailed(msg) if msg.contains("unrecognized")));
    }
}
