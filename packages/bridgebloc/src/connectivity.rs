//! Connectivity and abort signals
//!
//! - [`NetworkMonitor`] tracks whether the process believes it is online.
//! - [`AbortHandle`] lets the user cancel the attempt in flight.
//! - [`Interrupts`] combines both for long waits inside a transfer.
//!
//! Both are backed by `tokio::sync::watch`, so any number of waiters observe the
//! latest value without polling.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::TransferError;

// ============================================================================
// Network Monitor
// ============================================================================

/// Shared online/offline flag
#[derive(Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn set_online(&self, online: bool) {
        let previous = self.tx.send_replace(online);
        if previous != online {
            info!(online, "Network connectivity changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Keep `monitor` current by probing `url` every `interval`.
///
/// Any HTTP response counts as online; only transport failures flip it offline.
pub fn spawn_connectivity_probe(
    monitor: NetworkMonitor,
    url: String,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(interval).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Failed to build connectivity probe client");
                return;
            }
        };

        loop {
            let online = client.head(&url).send().await.is_ok();
            debug!(url = %url, online, "Connectivity probe");
            monitor.set_online(online);
            tokio::time::sleep(interval).await;
        }
    })
}

// ============================================================================
// Abort
// ============================================================================

/// Cancels the transfer attempt currently in flight
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation. Already-broadcast transactions are not affected.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clear a previous abort before a new attempt starts
    pub(crate) fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

// ============================================================================
// Interrupts
// ============================================================================

/// Abort and connectivity signals observed by one attempt
pub struct Interrupts {
    abort: watch::Receiver<bool>,
    online: watch::Receiver<bool>,
}

impl Interrupts {
    pub fn new(abort: &AbortHandle, network: &NetworkMonitor) -> Self {
        Self {
            abort: abort.subscribe(),
            online: network.subscribe(),
        }
    }

    /// Error for an interrupt that is already active, if any
    pub fn check(&self) -> Result<(), TransferError> {
        if *self.abort.borrow() {
            return Err(TransferError::Aborted);
        }
        if !*self.online.borrow() {
            return Err(TransferError::Offline);
        }
        Ok(())
    }

    /// Resolve with the first interrupt that fires. Pends forever if none does.
    pub async fn triggered(&mut self) -> TransferError {
        let abort = &mut self.abort;
        let online = &mut self.online;

        tokio::select! {
            res = abort.wait_for(|aborted| *aborted) => {
                if res.is_ok() {
                    return TransferError::Aborted;
                }
            }
            res = online.wait_for(|online| !*online) => {
                if res.is_ok() {
                    return TransferError::Offline;
                }
            }
        }

        // A sender was dropped; nothing can fire anymore
        std::future::pending::<TransferError>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_toggles() {
        let monitor = NetworkMonitor::default();
        assert!(monitor.is_online());
        monitor.set_online(false);
        assert!(!monitor.is_online());
        let clone = monitor.clone();
        clone.set_online(true);
        assert!(monitor.is_online());
    }

    #[test]
    fn test_abort_handle_reset() {
        let handle = AbortHandle::new();
        assert!(!handle.is_aborted());
        handle.abort();
        assert!(handle.is_aborted());
        handle.reset();
        assert!(!handle.is_aborted());
    }

    #[test]
    fn test_interrupts_check() {
        let handle = AbortHandle::new();
        let monitor = NetworkMonitor::new(true);
        let interrupts = Interrupts::new(&handle, &monitor);
        assert!(interrupts.check().is_ok());

        monitor.set_online(false);
        assert_eq!(interrupts.check(), Err(TransferError::Offline));

        handle.abort();
        assert_eq!(interrupts.check(), Err(TransferError::Aborted));
    }

    #[tokio::test]
    async fn test_triggered_on_abort() {
        let handle = AbortHandle::new();
        let monitor = NetworkMonitor::new(true);
        let mut interrupts = Interrupts::new(&handle, &monitor);

        let aborter = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            aborter.abort();
        });

        let err = tokio::time::timeout(Duration::from_secs(2), interrupts.triggered())
            .await
            .expect("interrupt should fire");
        assert_eq!(err, TransferError::Aborted);
    }

    #[tokio::test]
    async fn test_triggered_on_offline() {
        let handle = AbortHandle::new();
        let monitor = NetworkMonitor::new(true);
        let mut interrupts = Interrupts::new(&handle, &monitor);

        let flipper = monitor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            flipper.set_online(false);
        });

        let err = tokio::time::timeout(Duration::from_secs(2), interrupts.triggered())
            .await
            .expect("interrupt should fire");
        assert_eq!(err, TransferError::Offline);
    }

    #[tokio::test]
    async fn test_triggered_pends_without_signal() {
        let handle = AbortHandle::new();
        let monitor = NetworkMonitor::new(true);
        let mut interrupts = Interrupts::new(&handle, &monitor);

        let res = tokio::time::timeout(Duration::from_millis(30), interrupts.triggered()).await;
        assert!(res.is_err());
    }
}
