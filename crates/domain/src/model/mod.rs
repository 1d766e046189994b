//! Data structures and identifier helpers shared across the ingest and API
//! crates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Asset identifier recorded for native-asset transfers. It is the wrapped
/// SOL mint, so it also satisfies the address format checks when configured
/// as the monitored asset.
pub const NATIVE_ASSET_SENTINEL: &str = "So11111111111111111111111111111111111111112";

/// Lamports per SOL.
pub const DEFAULT_NATIVE_UNITS_PER_WHOLE: u64 = 1_000_000_000;

pub const ADDRESS_MIN_LENGTH: usize = 32;
pub const ADDRESS_MAX_LENGTH: usize = 44;

/// Upper bound on a transaction hash, enforced both when records are ingested
/// and when they are looked up. Real signatures are ~88 chars.
pub const MAX_HASH_LENGTH: usize = 128;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Errors emitted when an account or mint address fails validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressFormatError {
    #[error("address must be {ADDRESS_MIN_LENGTH}-{ADDRESS_MAX_LENGTH} characters, got {0}")]
    WrongLength(usize),
    #[error("address contains non base-58 characters")]
    NonBase58,
}

/// Validates the base-58, 32-44 character address contract.
pub fn validate_address(address: &str) -> Result<(), AddressFormatError> {
    let len = address.len();
    if !(ADDRESS_MIN_LENGTH..=ADDRESS_MAX_LENGTH).contains(&len) {
        return Err(AddressFormatError::WrongLength(len));
    }

    if !address.bytes().all(|b| BASE58_ALPHABET.contains(&b)) {
        return Err(AddressFormatError::NonBase58);
    }

    Ok(())
}

/// Case-insensitive address comparison used by every monitored-address and
/// monitored-asset filter.
pub fn addresses_match(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

/// Parses an ISO-8601 point in time. RFC 3339 values keep their offset;
/// date-times without an offset and bare dates are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Errors emitted when a transaction hash supplied on the lookup path is
/// unusable as a key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashFormatError {
    #[error("transaction hash must not be empty")]
    Empty,
    #[error("transaction hash exceeds {MAX_HASH_LENGTH} characters")]
    TooLong,
}

/// Natural key of a transfer record. Stored exactly as received; signatures
/// are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(String);

impl TransactionHash {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn parse(raw: &str) -> Result<Self, HashFormatError> {
        if raw.trim().is_empty() {
            return Err(HashFormatError::Empty);
        }
        if raw.len() > MAX_HASH_LENGTH {
            return Err(HashFormatError::TooLong);
        }
        Ok(Self::new(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical transfer extracted from a webhook notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub amount: Decimal,
    pub asset_identifier: String,
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub transaction_hash: TransactionHash,
}
