//! Transfer error taxonomy
//!
//! Every component reports failure as a [`TransferError`]; the orchestrator is
//! the only place that decides what to do with it. [`ErrorKind`] groups the
//! variants by how a caller may recover.

use alloy::primitives::TxHash;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Recovery class of a [`TransferError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Bad intent or unusable environment; fatal, never retried silently
    Validation,
    /// Signing, approval, switch or deposit declined; user must retry explicitly
    UserRejection,
    /// RPC/node failure; safe to retry the same step
    Provider,
    /// Transaction reverted; funds not moved, a new attempt is safe
    Chain,
    /// Notification failed after a confirmed deposit; must be retried
    Backend,
    /// Connectivity lost mid-flow
    Connectivity,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::UserRejection => "user_rejection",
            ErrorKind::Provider => "provider_error",
            ErrorKind::Chain => "chain_error",
            ErrorKind::Backend => "backend_error",
            ErrorKind::Connectivity => "connectivity_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    // ========================================================================
    // Validation
    // ========================================================================
    #[error("Invalid transfer intent: {0}")]
    InvalidIntent(String),

    #[error("Invalid amount {amount:?}: {reason}")]
    InvalidAmount { amount: String, reason: String },

    #[error("Wallet is not connected")]
    WalletDisconnected,

    #[error("Unknown source chain: {0}")]
    UnknownChain(String),

    #[error("No bridge domain configured for destination chain {0}")]
    UnknownDestinationDomain(String),

    #[error("A transfer attempt is already in flight")]
    AttemptInFlight,

    // ========================================================================
    // User Rejection
    // ========================================================================
    #[error("Authorization signature was rejected")]
    SigningRejected,

    #[error("Network switch was rejected")]
    NetworkSwitchRejected,

    #[error("Token approval was rejected")]
    ApprovalRejected,

    #[error("Deposit transaction was rejected")]
    TransactionRejected,

    #[error("Transfer aborted by user")]
    Aborted,

    // ========================================================================
    // Provider
    // ========================================================================
    #[error("Network switch failed: {0}")]
    NetworkSwitchFailed(String),

    #[error("Allowance query failed: {0}")]
    AllowanceQueryFailed(String),

    #[error("Approval transaction failed: {0}")]
    ApprovalFailed(String),

    #[error("Deposit submission failed: {0}")]
    TransactionSubmissionFailed(String),

    #[error("Transaction {tx_hash} not confirmed within {timeout_ms}ms")]
    ConfirmationTimeout { tx_hash: TxHash, timeout_ms: u64 },

    #[error("Failed to fetch receipt for {tx_hash}: {reason}")]
    ConfirmationFailed { tx_hash: TxHash, reason: String },

    // ========================================================================
    // Chain
    // ========================================================================
    #[error("Transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: TxHash },

    // ========================================================================
    // Backend
    // ========================================================================
    #[error("Backend rejected notification (status {status}): {message}")]
    BackendRejected { status: u16, message: String },

    #[error("Backend unreachable: {0}")]
    NetworkUnavailable(String),

    // ========================================================================
    // Connectivity
    // ========================================================================
    #[error("Network connectivity lost")]
    Offline,
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidIntent(_)
            | TransferError::InvalidAmount { .. }
            | TransferError::WalletDisconnected
            | TransferError::UnknownChain(_)
            | TransferError::UnknownDestinationDomain(_)
            | TransferError::AttemptInFlight => ErrorKind::Validation,

            TransferError::SigningRejected
            | TransferError::NetworkSwitchRejected
            | TransferError::ApprovalRejected
            | TransferError::TransactionRejected
            | TransferError::Aborted => ErrorKind::UserRejection,

            TransferError::NetworkSwitchFailed(_)
            | TransferError::AllowanceQueryFailed(_)
            | TransferError::ApprovalFailed(_)
            | TransferError::TransactionSubmissionFailed(_)
            | TransferError::ConfirmationTimeout { .. }
            | TransferError::ConfirmationFailed { .. } => ErrorKind::Provider,

            TransferError::TransactionReverted { .. } => ErrorKind::Chain,

            TransferError::BackendRejected { .. } | TransferError::NetworkUnavailable(_) => {
                ErrorKind::Backend
            }

            TransferError::Offline => ErrorKind::Connectivity,
        }
    }

    /// Whether repeating the same call may succeed without user involvement
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransferError::NetworkUnavailable(_)
                | TransferError::ConfirmationTimeout { .. }
                | TransferError::ConfirmationFailed { .. }
                | TransferError::AllowanceQueryFailed(_)
        )
    }
}
