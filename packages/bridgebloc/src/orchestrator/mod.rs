//! Transfer Orchestrator
//!
//! Drives one [`TransferAttempt`] through the fixed step sequence:
//!
//! ```text
//! Idle -> Validating -> Authorizing -> Aligning -> CheckingAllowance
//!      -> [Approving] -> Depositing -> Confirming -> Notifying -> Completed
//! ```
//!
//! Any step may end the attempt in `Failed { at_step, reason }`. Nothing is
//! retried automatically; a retry is a fresh [`TransferOrchestrator::run`] that
//! starts again from `Validating`. Each step short-circuits when its work is
//! already done (cached authorization, aligned chain, sufficient allowance,
//! recorded deposit), so a rerun never repeats a signature, an approval or a
//! deposit.


use alloy::primitives::{Address, TxHash, U256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::allowance::{is_already_approved, AllowanceManager, AllowanceRequest, ApprovalPolicy};
use crate::amount::from_base_units;
use crate::auth::{AuthorizationManager, CredentialStore};
use crate::backend::BackendNotifier;
use crate::catalog::Catalog;
use crate::chain::ChainAligner;
use crate::confirmation::ConfirmationWaiter;
use crate::connectivity::{AbortHandle, Interrupts, NetworkMonitor};
use crate::deposit::DepositSubmitter;
use crate::error::{ErrorKind, TransferError};
use crate::intent::{validate_intent, ValidatedIntent};
use crate::types::{Authorization, TransferAttempt, TransferIntent, TransferStep};
use crate::wallet::Wallet;

/// Default confirmation timeout (10 minutes)
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 600_000;

/// Contract addresses and limits used by every attempt
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Bridge deposit contract; also the allowance spender
    pub bridge_address: Address,
    /// Relay backend address passed to `deposit` as beneficiary
    pub relay_address: Address,
    pub confirmation_timeout_ms: u64,
    pub approval_policy: ApprovalPolicy,
}

impl OrchestratorSettings {
    pub fn new(bridge_address: Address) -> Self {
        Self {
            bridge_address,
            relay_address: bridge_address,
            confirmation_timeout_ms: DEFAULT_CONFIRMATION_TIMEOUT_MS,
            approval_policy: ApprovalPolicy::default(),
        }
    }
}

/// A terminal failure, with the attempt as it stood when it failed
#[derive(Debug, Clone, Error)]
#[error("transfer failed at {at_step} ({}): {error}", .error.kind())]
pub struct TransferFailure {
    pub at_step: TransferStep,
    #[source]
    pub error: TransferError,
    pub attempt: TransferAttempt,
}

impl TransferFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Hash of a deposit that was broadcast before the failure, if any
    pub fn tx_hash(&self) -> Option<TxHash> {
        self.attempt.tx_hash
    }

    /// What to do about a deposit broadcast before the failure
    pub fn recovery_hint(&self) -> Option<String> {
        let tx_hash = self.tx_hash()?;
        let notify = format!(
            "bridgebloc notify --from {} --to {} --tx-hash {}",
            self.attempt.intent.source_chain, self.attempt.intent.destination_chain, tx_hash
        );

        // Notifying is only entered once the deposit is confirmed
        let confirmed = self.attempt.visited(TransferStep::Notifying);
        Some(match self.kind() {
            ErrorKind::Chain => format!("Deposit {} reverted; no funds were moved.", tx_hash),
            _ if confirmed => format!(
                "!!! Deposit {} is confirmed on-chain but NOT registered with the backend.\n\
                 !!! Register it with: {}",
                tx_hash, notify
            ),
            _ => format!(
                "Deposit {} was broadcast but is not confirmed yet.\n\
                 Wait for it to confirm, then register it with: {}",
                tx_hash, notify
            ),
        })
    }
}

/// A deposit broadcast for an intent that has not completed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingDeposit {
    tx_hash: TxHash,
    confirmed: bool,
}

/// What a deposit moves and who sent it, in on-chain terms.
///
/// Built from the validated intent, so `"10.5"` and `"10.50"` map to the same
/// deposit while another sender never sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DepositKey {
    sender: Address,
    source_chain_id: u64,
    source_token: Address,
    destination_chain: String,
    destination_token: Address,
    recipient: Address,
    amount: U256,
}

impl DepositKey {
    fn new(sender: Address, intent: &TransferIntent, validated: &ValidatedIntent) -> Self {
        Self {
            sender,
            source_chain_id: validated.source_chain_id,
            source_token: validated.source_token,
            destination_chain: intent.destination_chain.trim().to_string(),
            destination_token: validated.destination_token,
            recipient: validated.recipient,
            amount: validated.amount,
        }
    }
}

type DepositLedger = HashMap<DepositKey, PendingDeposit>;

pub struct TransferOrchestrator {
    wallet: Arc<dyn Wallet>,
    catalog: Arc<dyn Catalog>,
    backend: Arc<dyn BackendNotifier>,
    network: NetworkMonitor,
    authorization: AuthorizationManager,
    aligner: ChainAligner,
    allowance: AllowanceManager,
    depositor: DepositSubmitter,
    waiter: ConfirmationWaiter,
    settings: OrchestratorSettings,
    /// Deposits awaiting completion. Holding the lock marks an attempt in flight.
    ledger: Mutex<DepositLedger>,
    abort: AbortHandle,
    last_attempt: std::sync::Mutex<Option<TransferAttempt>>,
}

impl TransferOrchestrator {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        catalog: Arc<dyn Catalog>,
        backend: Arc<dyn BackendNotifier>,
        credentials: Arc<dyn CredentialStore>,
        network: NetworkMonitor,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            authorization: AuthorizationManager::new(wallet.clone(), credentials),
            aligner: ChainAligner::new(wallet.clone()),
            allowance: AllowanceManager::new(wallet.clone(), settings.approval_policy),
            depositor: DepositSubmitter::new(
                wallet.clone(),
                catalog.clone(),
                settings.bridge_address,
                settings.relay_address,
            ),
            waiter: ConfirmationWaiter::new(wallet.clone()),
            wallet,
            catalog,
            backend,
            network,
            settings,
            ledger: Mutex::new(HashMap::new()),
            abort: AbortHandle::new(),
            last_attempt: std::sync::Mutex::new(None),
        }
    }

    /// Handle that cancels the attempt in flight
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn authorization(&self) -> &AuthorizationManager {
        &self.authorization
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Most recent attempt that ran to a terminal state
    pub fn last_attempt(&self) -> Option<TransferAttempt> {
        self.last_attempt.lock().ok().and_then(|a| a.clone())
    }

    /// Hash of a deposit the connected wallet made for `intent` that has not
    /// completed yet
    pub async fn pending_deposit(&self, intent: &TransferIntent) -> Option<TxHash> {
        let sender = self.wallet.address()?;
        let validated = validate_intent(intent, sender, self.catalog.as_ref()).ok()?;
        let key = DepositKey::new(sender, intent, &validated);
        self.ledger.lock().await.get(&key).map(|p| p.tx_hash)
    }

    /// Run `intent` from `Validating` to a terminal state.
    ///
    /// Fails immediately with [`TransferError::AttemptInFlight`] if another
    /// attempt is running on this orchestrator.
    pub async fn run(&self, intent: TransferIntent) -> Result<TransferAttempt, TransferFailure> {
        let mut attempt = TransferAttempt::new(intent);

        let mut ledger = match self.ledger.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Rejecting transfer: another attempt is in flight");
                attempt.enter(TransferStep::Validating);
                return Err(self.failure(attempt, TransferError::AttemptInFlight));
            }
        };

        self.abort.reset();
        let mut interrupts = Interrupts::new(&self.abort, &self.network);

        info!(
            source_chain = %attempt.intent.source_chain,
            destination_chain = %attempt.intent.destination_chain,
            amount = %attempt.intent.amount,
            "Starting transfer"
        );

        let result = self.drive(&mut attempt, &mut ledger, &mut interrupts).await;
        drop(ledger);

        match result {
            Ok(()) => {
                info!(
                    tx_hash = ?attempt.tx_hash,
                    tracking_id = ?attempt.tracking_id,
                    "Transfer completed"
                );
                self.record(&attempt);
                Ok(attempt)
            }
            Err(e) => {
                let failure = self.failure(attempt, e);
                self.record(&failure.attempt);
                Err(failure)
            }
        }
    }

    fn failure(&self, mut attempt: TransferAttempt, error: TransferError) -> TransferFailure {
        attempt.fail(error.clone());
        let at_step = attempt.current_step();

        match error.kind() {
            ErrorKind::Backend => error!(
                at_step = %at_step,
                tx_hash = ?attempt.tx_hash,
                error = %error,
                "Deposit confirmed but backend notification failed; retry to re-notify"
            ),
            kind => warn!(
                at_step = %at_step,
                kind = %kind,
                error = %error,
                "Transfer failed"
            ),
        }

        TransferFailure {
            at_step,
            error,
            attempt,
        }
    }

    fn record(&self, attempt: &TransferAttempt) {
        if let Ok(mut last) = self.last_attempt.lock() {
            *last = Some(attempt.clone());
        }
    }

    async fn drive(
        &self,
        attempt: &mut TransferAttempt,
        ledger: &mut MutexGuard<'_, DepositLedger>,
        interrupts: &mut Interrupts,
    ) -> Result<(), TransferError> {
        attempt.enter(TransferStep::Validating);
        let (sender, validated) = self.validate(&attempt.intent)?;

        interrupts.check()?;
        attempt.enter(TransferStep::Authorizing);
        let authorization = self.authorize(sender, interrupts).await?;
        attempt.authorization = Some(authorization.clone());

        interrupts.check()?;
        attempt.enter(TransferStep::Aligning);
        self.align(&validated, interrupts).await?;

        let key = DepositKey::new(sender, &attempt.intent, &validated);
        let pending = ledger.get(&key).copied();
        let request = AllowanceRequest {
            token: validated.source_token,
            token_decimals: Some(validated.source_decimals),
            spender: self.settings.bridge_address,
            owner: sender,
            required_amount: validated.amount,
        };

        interrupts.check()?;
        attempt.enter(TransferStep::CheckingAllowance);
        let needs_approval = match pending {
            // The recorded deposit already consumed the allowance
            Some(_) => {
                debug!("Deposit already recorded; allowance check skipped");
                false
            }
            None => self.check_allowance(&request, interrupts).await?,
        };

        if needs_approval {
            interrupts.check()?;
            attempt.enter(TransferStep::Approving);
            self.approve(&request).await?;
        }

        interrupts.check()?;
        attempt.enter(TransferStep::Depositing);
        let deposit = match pending {
            Some(pending) => {
                info!(tx_hash = %pending.tx_hash, "Reusing previously submitted deposit");
                pending
            }
            None => {
                let pending = PendingDeposit {
                    tx_hash: self.deposit(&attempt.intent, &validated).await?,
                    confirmed: false,
                };
                ledger.insert(key.clone(), pending);
                pending
            }
        };
        attempt.tx_hash = Some(deposit.tx_hash);

        attempt.enter(TransferStep::Confirming);
        if deposit.confirmed {
            debug!(tx_hash = %deposit.tx_hash, "Deposit already confirmed");
        } else {
            self.confirm(&key, deposit.tx_hash, ledger, interrupts).await?;
        }

        interrupts.check()?;
        attempt.enter(TransferStep::Notifying);
        let tracking_id = self
            .notify(&attempt.intent, &authorization, deposit.tx_hash)
            .await?;
        attempt.tracking_id = Some(tracking_id);
        ledger.remove(&key);

        attempt.enter(TransferStep::Completed);
        Ok(())
    }

    fn validate(&self, intent: &TransferIntent) -> Result<(Address, ValidatedIntent), TransferError> {
        let sender = self.wallet.address().ok_or(TransferError::WalletDisconnected)?;
        if !self.network.is_online() {
            return Err(TransferError::Offline);
        }
        let validated = validate_intent(intent, sender, self.catalog.as_ref())?;

        if self
            .authorization
            .cached()
            .is_some_and(|auth| auth.address != sender)
        {
            self.authorization.on_wallet_changed(Some(sender));
        }

        debug!(
            sender = %sender,
            chain_id = validated.source_chain_id,
            amount = %from_base_units(validated.amount, validated.source_decimals),
            base_units = %validated.amount,
            "Intent validated"
        );
        Ok((sender, validated))
    }

    async fn authorize(
        &self,
        sender: Address,
        interrupts: &mut Interrupts,
    ) -> Result<Authorization, TransferError> {
        interruptible(
            interrupts,
            self.authorization.get_or_create_authorization(sender),
        )
        .await
    }

    async fn align(
        &self,
        validated: &ValidatedIntent,
        interrupts: &mut Interrupts,
    ) -> Result<(), TransferError> {
        interruptible(interrupts, self.aligner.ensure_chain(validated.source_chain_id)).await
    }

    /// Whether an approval is needed before depositing
    async fn check_allowance(
        &self,
        request: &AllowanceRequest,
        interrupts: &mut Interrupts,
    ) -> Result<bool, TransferError> {
        let state = interruptible(interrupts, self.allowance.check_allowance(request)).await?;
        Ok(!is_already_approved(&state))
    }

    async fn approve(&self, request: &AllowanceRequest) -> Result<(), TransferError> {
        self.allowance.approve(request).await.map(|_| ())
    }

    async fn deposit(
        &self,
        intent: &TransferIntent,
        validated: &ValidatedIntent,
    ) -> Result<TxHash, TransferError> {
        let routing = self.depositor.resolve_routing(&intent.destination_chain)?;
        self.depositor.submit_deposit(validated, routing).await
    }

    async fn confirm(
        &self,
        key: &DepositKey,
        tx_hash: TxHash,
        ledger: &mut MutexGuard<'_, DepositLedger>,
        interrupts: &mut Interrupts,
    ) -> Result<(), TransferError> {
        match self
            .waiter
            .wait_for_confirmation(tx_hash, self.settings.confirmation_timeout_ms, interrupts)
            .await
        {
            Ok(_) => {
                if let Some(pending) = ledger.get_mut(key) {
                    pending.confirmed = true;
                }
                Ok(())
            }
            Err(e @ TransferError::TransactionReverted { .. }) => {
                // Funds never moved; the next attempt must deposit again
                ledger.remove(key);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn notify(
        &self,
        intent: &TransferIntent,
        authorization: &Authorization,
        tx_hash: TxHash,
    ) -> Result<String, TransferError> {
        self.backend
            .notify(
                authorization,
                tx_hash,
                &intent.source_chain,
                &intent.destination_chain,
            )
            .await
    }
}

/// Await `fut` unless an abort or connectivity loss fires first
async fn interruptible<T>(
    interrupts: &mut Interrupts,
    fut: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::select! {
        err = interrupts.triggered() => Err(err),
        res = fut => res,
    }
}
