//! Confirmation Waiter
//!
//! Suspends until a submitted transaction is included, the timeout elapses, or
//! an interrupt (user abort, lost connectivity) fires. Interrupting only stops
//! the local wait; the broadcast transaction is unaffected.

use alloy::primitives::TxHash;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::connectivity::Interrupts;
use crate::error::TransferError;
use crate::types::Receipt;
use crate::wallet::Wallet;

pub struct ConfirmationWaiter {
    wallet: Arc<dyn Wallet>,
}

impl ConfirmationWaiter {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }

    pub async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout_ms: u64,
        interrupts: &mut Interrupts,
    ) -> Result<Receipt, TransferError> {
        interrupts.check()?;
        info!(tx_hash = %tx_hash, timeout_ms, "Waiting for confirmation");

        let wait = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.wallet.wait_for_receipt(tx_hash),
        );

        let receipt = tokio::select! {
            err = interrupts.triggered() => {
                warn!(tx_hash = %tx_hash, error = %err, "Confirmation wait interrupted");
                return Err(err);
            }
            res = wait => match res {
                Err(_) => {
                    return Err(TransferError::ConfirmationTimeout { tx_hash, timeout_ms });
                }
                Ok(Err(e)) => {
                    return Err(TransferError::ConfirmationFailed {
                        tx_hash,
                        reason: e.to_string(),
                    });
                }
                Ok(Ok(receipt)) => receipt,
            },
        };

        if !receipt.success {
            warn!(tx_hash = %tx_hash, "Transaction reverted");
            return Err(TransferError::TransactionReverted { tx_hash });
        }

        info!(
            tx_hash = %tx_hash,
            block_number = ?receipt.block_number,
            "Transaction confirmed"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::{AbortHandle, NetworkMonitor};
    use crate::testing::{MockWallet, ReceiptMode};
    use alloy::primitives::{Address, B256};

    fn setup(mode: ReceiptMode) -> (ConfirmationWaiter, AbortHandle, NetworkMonitor) {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)));
        wallet.set_receipt_mode(mode);
        (
            ConfirmationWaiter::new(wallet),
            AbortHandle::new(),
            NetworkMonitor::new(true),
        )
    }

    #[tokio::test]
    async fn test_confirmed() {
        let (waiter, abort, network) = setup(ReceiptMode::Success);
        let mut interrupts = Interrupts::new(&abort, &network);
        let tx = B256::repeat_byte(0xab);

        let receipt = waiter
            .wait_for_confirmation(tx, 1_000, &mut interrupts)
            .await
            .unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.tx_hash, tx);
    }

    #[tokio::test]
    async fn test_reverted() {
        let (waiter, abort, network) = setup(ReceiptMode::Reverted);
        let mut interrupts = Interrupts::new(&abort, &network);

        let err = waiter
            .wait_for_confirmation(B256::repeat_byte(1), 1_000, &mut interrupts)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            TransferError::TransactionReverted {
                tx_hash: B256::repeat_byte(1)
            }
        );
    }

    #[tokio::test]
    async fn test_timeout() {
        let (waiter, abort, network) = setup(ReceiptMode::Pending);
        let mut interrupts = Interrupts::new(&abort, &network);

        let err = waiter
            .wait_for_confirmation(B256::repeat_byte(2), 30, &mut interrupts)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::ConfirmationTimeout { timeout_ms: 30, .. }
        ));
    }

    #[tokio::test]
    async fn test_abort_releases_wait() {
        let (waiter, abort, network) = setup(ReceiptMode::Pending);
        let mut interrupts = Interrupts::new(&abort, &network);

        let aborter = abort.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            aborter.abort();
        });

        let err = waiter
            .wait_for_confirmation(B256::repeat_byte(3), 60_000, &mut interrupts)
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::Aborted);
    }

    #[tokio::test]
    async fn test_offline_releases_wait() {
        let (waiter, abort, network) = setup(ReceiptMode::Pending);
        let mut interrupts = Interrupts::new(&abort, &network);

        let monitor = network.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            monitor.set_online(false);
        });

        let err = waiter
            .wait_for_confirmation(B256::repeat_byte(4), 60_000, &mut interrupts)
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::Offline);
    }

    #[tokio::test]
    async fn test_provider_error() {
        let (waiter, abort, network) = setup(ReceiptMode::Error("connection reset".into()));
        let mut interrupts = Interrupts::new(&abort, &network);

        let err = waiter
            .wait_for_confirmation(B256::repeat_byte(5), 1_000, &mut interrupts)
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::ConfirmationFailed { .. }));
    }
}
