//! In-memory collaborators for exercising the orchestrator without a live
//! wallet, chain or backend.
//!
//! - [`MockWallet`] - scripted wallet/provider that records every call
//! - [`MockBackend`] - idempotent conversion registry keyed by transaction hash

use alloy::primitives::{Address, TxHash, B256, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::backend::BackendNotifier;
use crate::error::TransferError;
use crate::types::{Authorization, Receipt};
use crate::wallet::{DepositCall, Wallet, WalletError};

// ============================================================================
// Mock Wallet
// ============================================================================

/// How [`MockWallet::wait_for_receipt`] resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptMode {
    Success,
    Reverted,
    /// Never included
    Pending,
    Error(String),
}

/// A wallet interaction, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletCall {
    SignMessage,
    SwitchChain(u64),
    Allowance,
    Approve(U256),
    Deposit(U256),
    WaitForReceipt(TxHash),
}

#[derive(Debug)]
struct MockWalletState {
    address: Option<Address>,
    chain_id: u64,
    allowance: U256,
    reject_signing: bool,
    reject_switch: bool,
    switch_failure: Option<String>,
    allowance_failure: Option<String>,
    reject_approval: bool,
    approval_failure: Option<String>,
    approval_mined: bool,
    reject_deposit: bool,
    deposit_failure: Option<String>,
    receipt_mode: ReceiptMode,
    tx_counter: u64,
    calls: Vec<WalletCall>,
    deposits: Vec<DepositCall>,
}

/// Scripted [`Wallet`] implementation
#[derive(Debug)]
pub struct MockWallet {
    state: Mutex<MockWalletState>,
}

impl MockWallet {
    /// Connected wallet on chain 1 with zero allowance
    pub fn new(address: Address) -> Self {
        Self {
            state: Mutex::new(MockWalletState {
                address: Some(address),
                chain_id: 1,
                allowance: U256::ZERO,
                reject_signing: false,
                reject_switch: false,
                switch_failure: None,
                allowance_failure: None,
                reject_approval: false,
                approval_failure: None,
                approval_mined: true,
                reject_deposit: false,
                deposit_failure: None,
                receipt_mode: ReceiptMode::Success,
                tx_counter: 0,
                calls: Vec::new(),
                deposits: Vec::new(),
            }),
        }
    }

    /// Wallet with no connected account
    pub fn disconnected() -> Self {
        let wallet = Self::new(Address::ZERO);
        wallet.state().address = None;
        wallet
    }

    pub fn on_chain(self, chain_id: u64) -> Self {
        self.state().chain_id = chain_id;
        self
    }

    pub fn with_allowance(self, allowance: U256) -> Self {
        self.state().allowance = allowance;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockWalletState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------------
    // Scripting
    // ------------------------------------------------------------------------

    pub fn set_address(&self, address: Option<Address>) {
        self.state().address = address;
    }

    pub fn set_allowance(&self, allowance: U256) {
        self.state().allowance = allowance;
    }

    pub fn reject_signing(&self, reject: bool) {
        self.state().reject_signing = reject;
    }

    pub fn reject_switch(&self, reject: bool) {
        self.state().reject_switch = reject;
    }

    pub fn fail_switch(&self, reason: Option<String>) {
        self.state().switch_failure = reason;
    }

    pub fn fail_allowance(&self, reason: Option<String>) {
        self.state().allowance_failure = reason;
    }

    pub fn reject_approval(&self, reject: bool) {
        self.state().reject_approval = reject;
    }

    pub fn fail_approval(&self, reason: Option<String>) {
        self.state().approval_failure = reason;
    }

    /// When false, approvals are broadcast but the allowance does not change yet
    pub fn approvals_mined(&self, mined: bool) {
        self.state().approval_mined = mined;
    }

    pub fn reject_deposit(&self, reject: bool) {
        self.state().reject_deposit = reject;
    }

    pub fn fail_deposit(&self, reason: Option<String>) {
        self.state().deposit_failure = reason;
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        self.state().receipt_mode = mode;
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<WalletCall> {
        self.state().calls.clone()
    }

    pub fn deposits(&self) -> Vec<DepositCall> {
        self.state().deposits.clone()
    }

    pub fn current_allowance(&self) -> U256 {
        self.state().allowance
    }

    fn count(&self, pred: impl Fn(&WalletCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn sign_count(&self) -> usize {
        self.count(|c| matches!(c, WalletCall::SignMessage))
    }

    pub fn switch_count(&self) -> usize {
        self.count(|c| matches!(c, WalletCall::SwitchChain(_)))
    }

    pub fn allowance_count(&self) -> usize {
        self.count(|c| matches!(c, WalletCall::Allowance))
    }

    pub fn approve_count(&self) -> usize {
        self.count(|c| matches!(c, WalletCall::Approve(_)))
    }

    pub fn deposit_count(&self) -> usize {
        self.count(|c| matches!(c, WalletCall::Deposit(_)))
    }

    fn next_tx_hash(state: &mut MockWalletState) -> TxHash {
        state.tx_counter += 1;
        B256::left_padding_from(&state.tx_counter.to_be_bytes())
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn address(&self) -> Option<Address> {
        self.state().address
    }

    fn chain_id(&self) -> u64 {
        self.state().chain_id
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        let mut state = self.state();
        state.calls.push(WalletCall::SignMessage);
        if state.reject_signing {
            return Err(WalletError::Rejected);
        }
        let address = state.address.ok_or(WalletError::Disconnected)?;
        Ok(format!(
            "0x{}{}",
            hex::encode(address.as_slice()),
            hex::encode(&message.as_bytes()[..8.min(message.len())])
        ))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), WalletError> {
        let mut state = self.state();
        state.calls.push(WalletCall::SwitchChain(chain_id));
        if state.reject_switch {
            return Err(WalletError::Rejected);
        }
        if let Some(reason) = &state.switch_failure {
            return Err(WalletError::Provider(reason.clone()));
        }
        state.chain_id = chain_id;
        Ok(())
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, WalletError> {
        let mut state = self.state();
        state.calls.push(WalletCall::Allowance);
        if let Some(reason) = &state.allowance_failure {
            return Err(WalletError::Provider(reason.clone()));
        }
        Ok(state.allowance)
    }

    async fn approve(
        &self,
        _token: Address,
        _spender: Address,
        amount: U256,
    ) -> Result<TxHash, WalletError> {
        let mut state = self.state();
        state.calls.push(WalletCall::Approve(amount));
        if state.reject_approval {
            return Err(WalletError::Rejected);
        }
        if let Some(reason) = &state.approval_failure {
            return Err(WalletError::Provider(reason.clone()));
        }
        if state.approval_mined {
            state.allowance = amount;
        }
        Ok(Self::next_tx_hash(&mut state))
    }

    async fn deposit(&self, _bridge: Address, call: &DepositCall) -> Result<TxHash, WalletError> {
        let mut state = self.state();
        state.calls.push(WalletCall::Deposit(call.amount));
        if state.reject_deposit {
            return Err(WalletError::Rejected);
        }
        if let Some(reason) = &state.deposit_failure {
            return Err(WalletError::Provider(reason.clone()));
        }
        state.allowance = state.allowance.saturating_sub(call.amount);
        state.deposits.push(call.clone());
        Ok(Self::next_tx_hash(&mut state))
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, WalletError> {
        let mode = {
            let mut state = self.state();
            state.calls.push(WalletCall::WaitForReceipt(tx_hash));
            state.receipt_mode.clone()
        };

        match mode {
            ReceiptMode::Success => Ok(Receipt {
                tx_hash,
                success: true,
                block_number: Some(100),
            }),
            ReceiptMode::Reverted => Ok(Receipt {
                tx_hash,
                success: false,
                block_number: Some(100),
            }),
            ReceiptMode::Pending => std::future::pending().await,
            ReceiptMode::Error(reason) => Err(WalletError::Provider(reason)),
        }
    }
}

// ============================================================================
// Mock Backend
// ============================================================================

#[derive(Debug, Default)]
struct MockBackendState {
    records: HashMap<TxHash, String>,
    next_id: u64,
    scripted_failures: Vec<TransferError>,
    calls: usize,
    last_header: Option<String>,
}

/// Conversion registry that is idempotent on `tx_hash`, like the relay backend
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockBackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// First id handed out is `first_id`
    pub fn starting_at(first_id: u64) -> Self {
        let backend = Self::default();
        backend.state().next_id = first_id;
        backend
    }

    fn state(&self) -> MutexGuard<'_, MockBackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next call with `error`; queued failures are consumed in order
    pub fn fail_next(&self, error: TransferError) {
        self.state().scripted_failures.push(error);
    }

    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    pub fn tracking_id(&self, tx_hash: &TxHash) -> Option<String> {
        self.state().records.get(tx_hash).cloned()
    }

    pub fn last_header(&self) -> Option<String> {
        self.state().last_header.clone()
    }
}

#[async_trait]
impl BackendNotifier for MockBackend {
    async fn notify(
        &self,
        authorization: &Authorization,
        tx_hash: TxHash,
        _source_chain: &str,
        _destination_chain: &str,
    ) -> Result<String, TransferError> {
        let mut state = self.state();
        state.calls += 1;
        state.last_header = Some(authorization.header_value());

        if !state.scripted_failures.is_empty() {
            return Err(state.scripted_failures.remove(0));
        }

        if let Some(id) = state.records.get(&tx_hash) {
            return Ok(id.clone());
        }

        let id = state.next_id.to_string();
        state.next_id += 1;
        state.records.insert(tx_hash, id.clone());
        Ok(id)
    }
}
