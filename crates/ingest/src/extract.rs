//! Turns decoded payloads into [`TransferRecord`]s for the monitored account.
//!
//! Filtering (wrong asset, wrong recipient, balance did not grow) yields
//! `Ok(None)`. Anything that prevents a record from being built for a single
//! item yields a [`ProcessingError`] scoped to that item.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use strum_macros::AsRefStr;
use thiserror::Error;
use transfer_watch_domain::config::IngestConfig;
use transfer_watch_domain::{
    addresses_match, parse_timestamp, HashFormatError, TransactionHash, TransferRecord,
    NATIVE_ASSET_SENTINEL,
};

use crate::payload::{LegacyEvent, RawTransaction};

#[derive(Debug, Error, Clone, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingError {
    #[error("transaction item could not be decoded: {0}")]
    MalformedItem(String),
    #[error("transaction item has no signature")]
    MissingSignature,
    #[error("transaction hash is unusable as a lookup key: {0}")]
    InvalidHash(HashFormatError),
    #[error("transaction item has no account keys")]
    EmptyAccountKeys,
    #[error("transaction item has no instructions; sender cannot be inferred")]
    EmptyInstructions,
    #[error("first instruction references no accounts; sender cannot be inferred")]
    MissingSender,
    #[error("account index {0} is outside the account key list")]
    AccountIndexOutOfRange(usize),
    #[error("transaction item has no pre/post balance metadata")]
    MissingBalances,
    #[error("no balance entry for account index {0}")]
    BalanceIndexOutOfRange(usize),
    #[error("amount `{0}` cannot be represented as a decimal")]
    InvalidAmount(String),
    #[error("timestamp `{0}` cannot be parsed")]
    InvalidTimestamp(String),
    #[error("balance delta cannot be converted to display units")]
    AmountOverflow,
}

/// The account and asset the pipeline records transfers for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTarget {
    pub address: String,
    pub asset: String,
    pub native_units_per_whole: u64,
}

impl MonitorTarget {
    pub fn new(
        address: impl Into<String>,
        asset: impl Into<String>,
        native_units_per_whole: u64,
    ) -> Self {
        Self {
            address: address.into(),
            asset: asset.into(),
            native_units_per_whole,
        }
    }
}

impl From<&IngestConfig> for MonitorTarget {
    fn from(config: &IngestConfig) -> Self {
        Self::new(
            config.monitored_address(),
            config.monitored_asset(),
            config.native_units_per_whole(),
        )
    }
}

/// Records a legacy token event only when both the asset and the recipient
/// match the target (case-insensitive).
pub fn extract_legacy(
    event: &LegacyEvent,
    target: &MonitorTarget,
) -> Result<Option<TransferRecord>, ProcessingError> {
    if !addresses_match(&event.token_address, &target.asset) {
        return Ok(None);
    }
    if !addresses_match(&event.to, &target.address) {
        return Ok(None);
    }

    let amount = Decimal::from_str(&event.amount)
        .map_err(|_| ProcessingError::InvalidAmount(event.amount.clone()))?;
    let timestamp = parse_timestamp(&event.timestamp)
        .ok_or_else(|| ProcessingError::InvalidTimestamp(event.timestamp.clone()))?;
    let transaction_hash =
        TransactionHash::parse(&event.hash).map_err(ProcessingError::InvalidHash)?;

    Ok(Some(TransferRecord {
        amount,
        asset_identifier: event.token_address.clone(),
        from: event.from.clone(),
        to: event.to.clone(),
        timestamp,
        transaction_hash,
    }))
}

/// Records an incoming native transfer when the target's balance grew in this
/// transaction. The sender is taken from the first account of the first
/// instruction, which can misattribute multi-instruction or multi-signer
/// transactions.
pub fn extract_from_transaction(
    tx: &RawTransaction,
    target: &MonitorTarget,
    observed_at: DateTime<Utc>,
) -> Result<Option<TransferRecord>, ProcessingError> {
    let transaction_hash = check_structure(tx)?;

    let Some(index) = tx
        .account_keys
        .iter()
        .position(|key| addresses_match(key, &target.address))
    else {
        return Ok(None);
    };

    let (pre, post) = balances_at(tx, index)?;
    if post <= pre {
        return Ok(None);
    }

    let amount = Decimal::from(post - pre)
        .checked_div(Decimal::from(target.native_units_per_whole))
        .ok_or(ProcessingError::AmountOverflow)?;
    let from = infer_sender(tx)?;

    Ok(Some(TransferRecord {
        amount,
        asset_identifier: NATIVE_ASSET_SENTINEL.to_string(),
        from: from.to_string(),
        to: target.address.clone(),
        timestamp: observed_at,
        transaction_hash,
    }))
}

/// Returns the item's signature as a hash once the item is known to be usable.
fn check_structure(tx: &RawTransaction) -> Result<TransactionHash, ProcessingError> {
    let hash = TransactionHash::parse(&tx.signature).map_err(|err| match err {
        HashFormatError::Empty => ProcessingError::MissingSignature,
        other => ProcessingError::InvalidHash(other),
    })?;
    if tx.account_keys.is_empty() {
        return Err(ProcessingError::EmptyAccountKeys);
    }
    if tx.instructions.is_empty() {
        return Err(ProcessingError::EmptyInstructions);
    }
    match &tx.meta {
        Some(meta) if meta.pre_balances.is_some() && meta.post_balances.is_some() => Ok(hash),
        _ => Err(ProcessingError::MissingBalances),
    }
}

fn balances_at(tx: &RawTransaction, index: usize) -> Result<(u64, u64), ProcessingError> {
    let meta = tx.meta.as_ref().ok_or(ProcessingError::MissingBalances)?;
    let lookup = |list: &Option<Vec<u64>>| -> Result<u64, ProcessingError> {
        list.as_ref()
            .ok_or(ProcessingError::MissingBalances)?
            .get(index)
            .copied()
            .ok_or(ProcessingError::BalanceIndexOutOfRange(index))
    };

    Ok((lookup(&meta.pre_balances)?, lookup(&meta.post_balances)?))
}

fn infer_sender(tx: &RawTransaction) -> Result<&str, ProcessingError> {
    let first = tx
        .instructions
        .first()
        .ok_or(ProcessingError::EmptyInstructions)?;
    let account_index = *first.accounts.first().ok_or(ProcessingError::MissingSender)?;

    tx.account_keys
        .get(account_index)
        .map(String::as_str)
        .ok_or(ProcessingError::AccountIndexOutOfRange(account_index))
}
