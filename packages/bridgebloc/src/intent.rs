//! Intent validation
//!
//! Turns a user-declared [`TransferIntent`] into on-chain typed values before any
//! side effect happens. Anything missing or malformed is a validation error.

use alloy::primitives::{Address, U256};
use std::str::FromStr;

use crate::amount::to_base_units;
use crate::catalog::Catalog;
use crate::error::TransferError;
use crate::types::TransferIntent;

/// A [`TransferIntent`] with every field parsed and resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIntent {
    pub source_chain_id: u64,
    pub source_token: Address,
    pub source_decimals: u8,
    pub destination_token: Address,
    pub recipient: Address,
    /// Amount in source token base units, never zero
    pub amount: U256,
}

fn parse_address(field: &str, value: &str) -> Result<Address, TransferError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TransferError::InvalidIntent(format!("{} is empty", field)));
    }
    let address = Address::from_str(value)
        .map_err(|e| TransferError::InvalidIntent(format!("{} is not an address: {}", field, e)))?;
    if address.is_zero() {
        return Err(TransferError::InvalidIntent(format!("{} is the zero address", field)));
    }
    Ok(address)
}

/// Validate `intent` for a transfer sent by `sender`
pub fn validate_intent(
    intent: &TransferIntent,
    sender: Address,
    catalog: &dyn Catalog,
) -> Result<ValidatedIntent, TransferError> {
    if intent.source_chain.trim().is_empty() {
        return Err(TransferError::InvalidIntent("source chain is empty".into()));
    }
    if intent.destination_chain.trim().is_empty() {
        return Err(TransferError::InvalidIntent("destination chain is empty".into()));
    }
    if intent.source_chain == intent.destination_chain {
        return Err(TransferError::InvalidIntent(
            "source and destination chains are the same".into(),
        ));
    }

    let source_chain_id = catalog
        .chain_id_for(&intent.source_chain)
        .ok_or_else(|| TransferError::UnknownChain(intent.source_chain.clone()))?;

    let source_token = parse_address("source token", &intent.source_token.address)?;
    let destination_token = parse_address("destination token", &intent.destination_token.address)?;

    let source_decimals = intent.source_token.decimals.ok_or_else(|| {
        TransferError::InvalidIntent(format!("source token {} has undefined decimals", source_token))
    })?;

    let amount = to_base_units(&intent.amount, source_decimals)?;
    if amount.is_zero() {
        return Err(TransferError::InvalidAmount {
            amount: intent.amount.clone(),
            reason: "amount must be greater than zero".into(),
        });
    }

    let recipient = match intent.recipient_address.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => parse_address("recipient", r)?,
        _ => sender,
    };

    Ok(ValidatedIntent {
        source_chain_id,
        source_token,
        source_decimals,
        destination_token,
        recipient,
        amount,
    })
}
