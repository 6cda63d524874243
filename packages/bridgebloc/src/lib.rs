//! BridgeBloc: cross-chain transfer orchestration
//!
//! Moves a token from a source EVM chain to a destination chain through a bridge
//! deposit contract and a relay backend:
//!
//! - **Authorization** - signed credential tying the wallet to backend calls
//! - **Chain Alignment** - wallet switched to the source chain
//! - **Allowance** - ERC20 approval only when the current allowance is short
//! - **Deposit** - bridge `deposit` call with destination routing
//! - **Confirmation** - cancellable wait for on-chain inclusion
//! - **Backend** - conversion registration, idempotent on the tx hash
//! - **Orchestrator** - the step machine tying the above together
//!
//! ## Feature Flags
//!
//! - `testing` - in-memory wallet and backend for driving the orchestrator

pub mod allowance;
pub mod amount;
pub mod auth;
pub mod backend;
pub mod catalog;
pub mod chain;
pub mod config;
pub mod confirmation;
pub mod connectivity;
pub mod deposit;
pub mod error;
pub mod evm;
pub mod intent;
pub mod orchestrator;
pub mod redact;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use allowance::{is_already_approved, AllowanceManager, ApprovalPolicy};
pub use auth::{is_already_signed, AuthorizationManager, FileCredentialStore, CHALLENGE_MESSAGE};
pub use backend::{BackendNotifier, HttpBackend, HttpBackendConfig};
pub use catalog::{Catalog, StaticCatalog};
pub use config::Config;
pub use connectivity::{AbortHandle, NetworkMonitor};
pub use error::{ErrorKind, TransferError};
pub use orchestrator::{OrchestratorSettings, TransferFailure, TransferOrchestrator};
pub use types::{
    AllowanceState, Authorization, Receipt, TokenRef, TransferAttempt, TransferIntent,
    TransferState, TransferStep,
};
pub use wallet::{Wallet, WalletError};
