//! Transfer data model
//!
//! Types shared by every stage of a cross-chain transfer: the user-declared
//! intent, the signed backend credential, allowance snapshots, on-chain receipts
//! and the orchestrator's step/attempt bookkeeping.

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{ErrorKind, TransferError};

// ============================================================================
// Transfer Intent
// ============================================================================

/// Token reference as declared by the user (address + decimals from the catalog)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRef {
    /// Token contract address (0x-prefixed hex)
    pub address: String,
    /// Token decimals; `None` when the catalog does not know them
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl TokenRef {
    pub fn new(address: impl Into<String>, decimals: Option<u8>) -> Self {
        Self {
            address: address.into(),
            decimals,
        }
    }
}

/// A user-declared request to move `amount` of `source_token` from
/// `source_chain` to `destination_chain`.
///
/// Immutable once handed to the orchestrator. Equality is structural, so the
/// same intent submitted twice maps to the same in-flight deposit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferIntent {
    /// Source chain name as known to the catalog (e.g. "ethereum")
    pub source_chain: String,
    pub source_token: TokenRef,
    /// Destination chain name as known to the catalog (e.g. "arbitrum")
    pub destination_chain: String,
    pub destination_token: TokenRef,
    /// Human-readable decimal amount (e.g. "10.5")
    pub amount: String,
    /// Destination recipient; defaults to the connected wallet address
    #[serde(default)]
    pub recipient_address: Option<String>,
}

// ============================================================================
// Authorization
// ============================================================================

/// Signed credential proving wallet ownership to the relay backend
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization {
    pub address: Address,
    /// 0x-prefixed signature over [`crate::auth::CHALLENGE_MESSAGE`]
    pub signature: String,
}

impl Authorization {
    pub fn new(address: Address, signature: impl Into<String>) -> Self {
        Self {
            address,
            signature: signature.into(),
        }
    }

    /// Value of the `Authorization` header expected by the backend
    pub fn header_value(&self) -> String {
        format!("Signature {}:{}", self.address, self.signature)
    }
}

/// Custom Debug that redacts the signature.
impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("address", &self.address)
            .field("signature", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Allowance
// ============================================================================

/// Snapshot of the bridge's spending allowance, both values in token base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceState {
    pub current_allowance: U256,
    pub required_amount: U256,
}

impl AllowanceState {
    pub fn new(current_allowance: U256, required_amount: U256) -> Self {
        Self {
            current_allowance,
            required_amount,
        }
    }

    /// Amount still missing before a deposit may be submitted
    pub fn shortfall(&self) -> U256 {
        self.required_amount.saturating_sub(self.current_allowance)
    }
}

// ============================================================================
// Receipt
// ============================================================================

/// Proof of on-chain inclusion for a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    /// `false` if the transaction was included but reverted
    pub success: bool,
    pub block_number: Option<u64>,
}

// ============================================================================
// Orchestrator State
// ============================================================================

/// Forward states of a transfer attempt, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStep {
    Idle,
    Validating,
    Authorizing,
    Aligning,
    CheckingAllowance,
    Approving,
    Depositing,
    Confirming,
    Notifying,
    Completed,
}

impl TransferStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStep::Idle => "idle",
            TransferStep::Validating => "validating",
            TransferStep::Authorizing => "authorizing",
            TransferStep::Aligning => "aligning",
            TransferStep::CheckingAllowance => "checking_allowance",
            TransferStep::Approving => "approving",
            TransferStep::Depositing => "depositing",
            TransferStep::Confirming => "confirming",
            TransferStep::Notifying => "notifying",
            TransferStep::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStep::Completed)
    }
}

impl fmt::Display for TransferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current state of an attempt: a forward step or the failed terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Step(TransferStep),
    Failed { at_step: TransferStep, reason: ErrorKind },
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Step(step) => write!(f, "{}", step),
            TransferState::Failed { at_step, reason } => {
                write!(f, "failed({}, at {})", reason, at_step)
            }
        }
    }
}

/// Bookkeeping for one run of the orchestrator. Not persisted.
#[derive(Debug, Clone)]
pub struct TransferAttempt {
    pub intent: TransferIntent,
    pub authorization: Option<Authorization>,
    pub state: TransferState,
    pub last_error: Option<TransferError>,
    pub tx_hash: Option<TxHash>,
    pub tracking_id: Option<String>,
    /// Every step entered, in order
    pub history: Vec<TransferStep>,
}

impl TransferAttempt {
    pub fn new(intent: TransferIntent) -> Self {
        Self {
            intent,
            authorization: None,
            state: TransferState::Step(TransferStep::Idle),
            last_error: None,
            tx_hash: None,
            tracking_id: None,
            history: vec![TransferStep::Idle],
        }
    }

    /// Last forward step entered
    pub fn current_step(&self) -> TransferStep {
        match self.state {
            TransferState::Step(step) => step,
            TransferState::Failed { at_step, .. } => at_step,
        }
    }

    pub fn visited(&self, step: TransferStep) -> bool {
        self.history.contains(&step)
    }

    pub(crate) fn enter(&mut self, step: TransferStep) {
        debug!(step = %step, "Entering step");
        self.state = TransferState::Step(step);
        self.history.push(step);
    }

    pub(crate) fn fail(&mut self, error: TransferError) {
        let at_step = self.current_step();
        self.state = TransferState::Failed {
            at_step,
            reason: error.kind(),
        };
        self.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent() -> TransferIntent {
        TransferIntent {
            source_chain: "ethereum".into(),
            source_token: TokenRef::new("0x0000000000000000000000000000000000000001", Some(6)),
            destination_chain: "arbitrum".into(),
            destination_token: TokenRef::new("0x0000000000000000000000000000000000000002", Some(6)),
            amount: "1".into(),
            recipient_address: None,
        }
    }

    #[test]
    fn test_authorization_header_format() {
        let address: Address = "0x8e326D9F79a9D944C920fC7aE899Dd181ecB0491".parse().unwrap();
        let auth = Authorization::new(address, "0xdead");
        assert_eq!(
            auth.header_value(),
            "Signature 0x8e326D9F79a9D944C920fC7aE899Dd181ecB0491:0xdead"
        );
    }

    #[test]
    fn test_authorization_debug_redacts_signature() {
        let auth = Authorization::new(Address::ZERO, "0xsecret");
        let debug = format!("{:?}", auth);
        assert!(!debug.contains("0xsecret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_allowance_shortfall() {
        let state = AllowanceState::new(U256::from(40u64), U256::from(100u64));
        assert_eq!(state.shortfall(), U256::from(60u64));
        let state = AllowanceState::new(U256::from(150u64), U256::from(100u64));
        assert_eq!(state.shortfall(), U256::ZERO);
    }

    #[test]
    fn test_attempt_records_failure_at_current_step() {
        let mut attempt = TransferAttempt::new(intent());
        attempt.enter(TransferStep::Validating);
        attempt.enter(TransferStep::Authorizing);
        attempt.fail(TransferError::SigningRejected);

        assert_eq!(
            attempt.state,
            TransferState::Failed {
                at_step: TransferStep::Authorizing,
                reason: ErrorKind::UserRejection,
            }
        );
        assert_eq!(attempt.current_step(), TransferStep::Authorizing);
        assert!(attempt.visited(TransferStep::Validating));
        assert!(!attempt.visited(TransferStep::Approving));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(TransferStep::CheckingAllowance.to_string(), "checking_allowance");
        assert!(TransferStep::Completed.is_terminal());
        assert!(!TransferStep::Notifying.is_terminal());
    }
}
