//! Deposit Submitter
//!
//! Builds and broadcasts the bridge `deposit` call that locks/burns the source
//! asset and records destination routing. Returns as soon as the transaction is
//! submitted; confirmation is a separate step.

use alloy::primitives::{Address, TxHash};
use std::sync::Arc;
use tracing::info;

use crate::catalog::Catalog;
use crate::error::TransferError;
use crate::intent::ValidatedIntent;
use crate::wallet::{DepositCall, Wallet, WalletError};

/// Destination routing resolved from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositRouting {
    pub destination_domain: u32,
}

pub struct DepositSubmitter {
    wallet: Arc<dyn Wallet>,
    catalog: Arc<dyn Catalog>,
    bridge_address: Address,
    /// Relay backend address passed as beneficiary
    relay_address: Address,
}

impl DepositSubmitter {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        catalog: Arc<dyn Catalog>,
        bridge_address: Address,
        relay_address: Address,
    ) -> Self {
        Self {
            wallet,
            catalog,
            bridge_address,
            relay_address,
        }
    }

    pub fn bridge_address(&self) -> Address {
        self.bridge_address
    }

    /// Map the destination chain to its bridge domain
    pub fn resolve_routing(&self, destination_chain: &str) -> Result<DepositRouting, TransferError> {
        self.catalog
            .domain_for_chain(destination_chain)
            .map(|destination_domain| DepositRouting { destination_domain })
            .ok_or_else(|| TransferError::UnknownDestinationDomain(destination_chain.to_string()))
    }

    /// Arguments of the deposit call, in contract order
    pub fn prepare_deposit(&self, intent: &ValidatedIntent, routing: DepositRouting) -> DepositCall {
        DepositCall {
            amount: intent.amount,
            source_token: intent.source_token,
            destination_token: intent.destination_token,
            destination_domain: routing.destination_domain,
            recipient: intent.recipient,
            beneficiary: self.relay_address,
        }
    }

    /// Broadcast the deposit and return its pending transaction hash
    pub async fn submit_deposit(
        &self,
        intent: &ValidatedIntent,
        routing: DepositRouting,
    ) -> Result<TxHash, TransferError> {
        let call = self.prepare_deposit(intent, routing);
        info!(
            bridge = %self.bridge_address,
            token = %call.source_token,
            amount = %call.amount,
            destination_domain = call.destination_domain,
            "Submitting deposit"
        );

        let tx_hash = self
            .wallet
            .deposit(self.bridge_address, &call)
            .await
            .map_err(|e| match e {
                WalletError::Rejected => TransferError::TransactionRejected,
                other => TransferError::TransactionSubmissionFailed(other.to_string()),
            })?;

        info!(tx_hash = %tx_hash, "Deposit submitted");
        Ok(tx_hash)
    }
}
