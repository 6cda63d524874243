//! Allowance Manager
//!
//! Makes sure the bridge contract may pull the deposit amount from the owner.
//! An approval is only requested when the current allowance is below the
//! required amount; both are compared in token base units.

use alloy::primitives::{Address, TxHash, U256};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::TransferError;
use crate::types::AllowanceState;
use crate::wallet::{Wallet, WalletError};

/// A deposit may proceed without approval only if this holds
pub fn is_already_approved(state: &AllowanceState) -> bool {
    state.current_allowance >= state.required_amount
}

/// How much to approve when the allowance is insufficient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// Exactly the required amount
    #[default]
    Exact,
    /// `U256::MAX`, so later transfers skip approval
    Unlimited,
}

impl ApprovalPolicy {
    pub fn approval_amount(&self, required: U256) -> U256 {
        match self {
            ApprovalPolicy::Exact => required,
            ApprovalPolicy::Unlimited => U256::MAX,
        }
    }
}

impl std::str::FromStr for ApprovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(ApprovalPolicy::Exact),
            "unlimited" | "max" => Ok(ApprovalPolicy::Unlimited),
            other => Err(format!("unknown approval policy: {}", other)),
        }
    }
}

/// Parameters of an allowance check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowanceRequest {
    pub token: Address,
    /// Decimals of `token`; required so `required_amount` is known to be in base units
    pub token_decimals: Option<u8>,
    pub spender: Address,
    pub owner: Address,
    /// Base units
    pub required_amount: U256,
}

impl AllowanceRequest {
    fn validate(&self) -> Result<(), TransferError> {
        if self.token_decimals.is_none() {
            return Err(TransferError::InvalidIntent(format!(
                "token {} has undefined decimals",
                self.token
            )));
        }
        if self.required_amount.is_zero() {
            return Err(TransferError::InvalidAmount {
                amount: "0".to_string(),
                reason: "required amount must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Result of [`AllowanceManager::ensure_allowance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowanceOutcome {
    AlreadySufficient(AllowanceState),
    Approved {
        tx_hash: TxHash,
        /// Allowance re-read after the approval was broadcast
        refreshed: AllowanceState,
    },
}

pub struct AllowanceManager {
    wallet: Arc<dyn Wallet>,
    policy: ApprovalPolicy,
}

impl AllowanceManager {
    pub fn new(wallet: Arc<dyn Wallet>, policy: ApprovalPolicy) -> Self {
        Self { wallet, policy }
    }

    /// Read the current allowance
    pub async fn check_allowance(
        &self,
        request: &AllowanceRequest,
    ) -> Result<AllowanceState, TransferError> {
        request.validate()?;

        let current = self
            .wallet
            .allowance(request.token, request.owner, request.spender)
            .await
            .map_err(|e| TransferError::AllowanceQueryFailed(e.to_string()))?;

        let state = AllowanceState::new(current, request.required_amount);
        debug!(
            token = %request.token,
            current = %state.current_allowance,
            required = %state.required_amount,
            "Allowance checked"
        );
        Ok(state)
    }

    /// Submit an approval and re-read the allowance.
    ///
    /// The approval need not be mined, but the re-read must cover the required
    /// amount; otherwise this fails with a retryable [`TransferError::ApprovalFailed`].
    pub async fn approve(
        &self,
        request: &AllowanceRequest,
    ) -> Result<(TxHash, AllowanceState), TransferError> {
        request.validate()?;

        let amount = self.policy.approval_amount(request.required_amount);
        info!(
            token = %request.token,
            spender = %request.spender,
            amount = %amount,
            "Requesting token approval"
        );

        let tx_hash = self
            .wallet
            .approve(request.token, request.spender, amount)
            .await
            .map_err(|e| match e {
                WalletError::Rejected => TransferError::ApprovalRejected,
                other => TransferError::ApprovalFailed(other.to_string()),
            })?;
        info!(tx_hash = %tx_hash, "Approval submitted");

        let refreshed = self.check_allowance(request).await?;
        if !is_already_approved(&refreshed) {
            warn!(
                tx_hash = %tx_hash,
                current = %refreshed.current_allowance,
                shortfall = %refreshed.shortfall(),
                "Approval not reflected in allowance yet"
            );
            return Err(TransferError::ApprovalFailed(format!(
                "approval {} submitted but allowance is still {} short",
                tx_hash,
                refreshed.shortfall()
            )));
        }
        Ok((tx_hash, refreshed))
    }

    /// Check, and approve only if the allowance is insufficient
    pub async fn ensure_allowance(
        &self,
        request: &AllowanceRequest,
    ) -> Result<AllowanceOutcome, TransferError> {
        let state = self.check_allowance(request).await?;
        if is_already_approved(&state) {
            return Ok(AllowanceOutcome::AlreadySufficient(state));
        }
        let (tx_hash, refreshed) = self.approve(request).await?;
        Ok(AllowanceOutcome::Approved { tx_hash, refreshed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWallet;

    fn request(required: u64) -> AllowanceRequest {
        AllowanceRequest {
            token: Address::repeat_byte(0xaa),
            token_decimals: Some(6),
            spender: Address::repeat_byte(0xbb),
            owner: Address::repeat_byte(0x01),
            required_amount: U256::from(required),
        }
    }

    #[test]
    fn test_is_already_approved_boundary() {
        let required = U256::from(1_100_000u64);
        assert!(is_already_approved(&AllowanceState::new(required, required)));
        assert!(is_already_approved(&AllowanceState::new(
            required + U256::from(1u8),
            required
        )));
        assert!(!is_already_approved(&AllowanceState::new(
            required - U256::from(1u8),
            required
        )));
    }

    #[test]
    fn test_policy_amount_and_parse() {
        let required = U256::from(5u8);
        assert_eq!(ApprovalPolicy::Exact.approval_amount(required), required);
        assert_eq!(ApprovalPolicy::Unlimited.approval_amount(required), U256::MAX);
        assert_eq!("EXACT".parse::<ApprovalPolicy>(), Ok(ApprovalPolicy::Exact));
        assert_eq!("max".parse::<ApprovalPolicy>(), Ok(ApprovalPolicy::Unlimited));
        assert!("some".parse::<ApprovalPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_equal_allowance_skips_approval() {
        let wallet = Arc::new(
            MockWallet::new(Address::repeat_byte(1)).with_allowance(U256::from(1_100_000u64)),
        );
        let manager = AllowanceManager::new(wallet.clone(), ApprovalPolicy::Exact);

        let outcome = manager.ensure_allowance(&request(1_100_000)).await.unwrap();

        assert!(matches!(outcome, AllowanceOutcome::AlreadySufficient(_)));
        assert_eq!(wallet.approve_count(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_allowance_approves_and_refreshes() {
        let wallet =
            Arc::new(MockWallet::new(Address::repeat_byte(1)).with_allowance(U256::from(10u64)));
        let manager = AllowanceManager::new(wallet.clone(), ApprovalPolicy::Exact);

        let outcome = manager.ensure_allowance(&request(500)).await.unwrap();

        match outcome {
            AllowanceOutcome::Approved { refreshed, .. } => {
                assert_eq!(refreshed.current_allowance, U256::from(500u64));
                assert!(is_already_approved(&refreshed));
            }
            other => panic!("expected approval, got {:?}", other),
        }
        assert_eq!(wallet.approve_count(), 1);
        // initial read + refresh
        assert_eq!(wallet.allowance_count(), 2);
    }

    #[tokio::test]
    async fn test_unlimited_policy_approves_max() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)));
        let manager = AllowanceManager::new(wallet.clone(), ApprovalPolicy::Unlimited);

        manager.ensure_allowance(&request(500)).await.unwrap();

        assert_eq!(wallet.current_allowance(), U256::MAX);
    }

    #[tokio::test]
    async fn test_unreflected_approval_fails_retryably() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)));
        wallet.approvals_mined(false);
        let manager = AllowanceManager::new(wallet.clone(), ApprovalPolicy::Exact);

        let err = manager.approve(&request(500)).await.unwrap_err();

        assert!(matches!(err, TransferError::ApprovalFailed(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Provider);
        assert_eq!(wallet.approve_count(), 1);
        assert_eq!(wallet.allowance_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_amount_and_undefined_decimals_rejected() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)));
        let manager = AllowanceManager::new(wallet.clone(), ApprovalPolicy::Exact);

        let err = manager.ensure_allowance(&request(0)).await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidAmount { .. }));

        let mut no_decimals = request(500);
        no_decimals.token_decimals = None;
        let err = manager.ensure_allowance(&no_decimals).await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidIntent(_)));

        assert_eq!(wallet.allowance_count(), 0);
        assert_eq!(wallet.approve_count(), 0);
    }

    #[tokio::test]
    async fn test_approval_errors() {
        let wallet = Arc::new(MockWallet::new(Address::repeat_byte(1)));
        let manager = AllowanceManager::new(wallet.clone(), ApprovalPolicy::Exact);

        wallet.reject_approval(true);
        assert_eq!(
            manager.ensure_allowance(&request(5)).await.unwrap_err(),
            TransferError::ApprovalRejected
        );

        wallet.reject_approval(false);
        wallet.fail_approval(Some("insufficient funds for gas".into()));
        assert!(matches!(
            manager.ensure_allowance(&request(5)).await.unwrap_err(),
            TransferError::ApprovalFailed(_)
        ));

        wallet.fail_allowance(Some("rpc timeout".into()));
        assert!(matches!(
            manager.ensure_allowance(&request(5)).await.unwrap_err(),
            TransferError::AllowanceQueryFailed(_)
        ));
    }
}
