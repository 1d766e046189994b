//! Validation and decoding of the two webhook payload shapes.
//!
//! A top-level `type` key selects the address-activity shape; its absence
//! selects the legacy token-event shape. Request-level problems are returned
//! as [`ValidationError`] and abort the whole delivery.

mod types;

use serde::Deserialize;
use serde_json::{Map, Value};
use strum_macros::AsRefStr;
use thiserror::Error;
use transfer_watch_domain::{
    parse_timestamp, validate_address, TransactionHash, MAX_HASH_LENGTH,
};

pub use types::{
    ActivityItem, AddressActivity, DecodedPayload, LegacyEvent, PayloadKind, RawInstruction,
    RawTransaction, TransactionMeta,
};

/// Discriminator value carried by raw-activity deliveries.
pub const ADDRESS_ACTIVITY_TYPE: &str = "ADDRESS_ACTIVITY";

const LEGACY_REQUIRED_FIELDS: [&str; 6] =
    ["tokenAddress", "to", "from", "amount", "hash", "timestamp"];
const LEGACY_ADDRESS_FIELDS: [&str; 3] = ["tokenAddress", "from", "to"];

#[derive(Debug, Error, Clone, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ValidationError {
    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("unsupported webhook type `{0}`")]
    UnsupportedType(String),
    #[error("payload is missing the `event` object")]
    MissingEvent,
    #[error("event is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("field `{0}` is not a valid base-58 address")]
    InvalidAddressFormat(&'static str),
    #[error("amount must be a plain decimal numeral")]
    InvalidAmountFormat,
    #[error("hash must be a non-empty string of at most {} characters", MAX_HASH_LENGTH)]
    InvalidHashFormat,
    #[error("timestamp must be an ISO-8601 date or date-time")]
    InvalidTimestampFormat,
    #[error("invalid transaction structure: {0}")]
    InvalidTransactionStructure(String),
}

/// Decodes the raw request body. Signature checks must already have run on
/// these same bytes.
pub fn decode_body(raw_body: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(raw_body).map_err(|err| ValidationError::MalformedJson(err.to_string()))
}

pub fn parse_payload(value: &Value) -> Result<DecodedPayload, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

    match object.get("type") {
        Some(Value::String(kind)) if kind == ADDRESS_ACTIVITY_TYPE => {
            parse_address_activity(object).map(DecodedPayload::AddressActivity)
        }
        Some(Value::String(kind)) => Err(ValidationError::UnsupportedType(kind.clone())),
        Some(other) => Err(ValidationError::UnsupportedType(other.to_string())),
        None => parse_legacy(object).map(DecodedPayload::Legacy),
    }
}

fn parse_legacy(object: &Map<String, Value>) -> Result<LegacyEvent, ValidationError> {
    let event = object
        .get("event")
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingEvent)?;

    let missing: Vec<&'static str> = LEGACY_REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| matches!(event.get(*field), None | Some(Value::Null)))
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    for field in LEGACY_ADDRESS_FIELDS {
        let valid = event
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|address| validate_address(address).is_ok());
        if !valid {
            return Err(ValidationError::InvalidAddressFormat(field));
        }
    }

    let amount = event
        .get("amount")
        .and_then(Value::as_str)
        .filter(|amount| is_plain_decimal(amount))
        .ok_or(ValidationError::InvalidAmountFormat)?;

    let hash = event
        .get("hash")
        .and_then(Value::as_str)
        .filter(|hash| TransactionHash::parse(hash).is_ok())
        .ok_or(ValidationError::InvalidHashFormat)?;

    let timestamp = event
        .get("timestamp")
        .and_then(Value::as_str)
        .filter(|ts| parse_timestamp(ts).is_some())
        .ok_or(ValidationError::InvalidTimestampFormat)?;

    // Presence and string-ness of the address fields were checked above.
    let text = |field: &str| {
        event
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(LegacyEvent {
        token_address: text("tokenAddress"),
        from: text("from"),
        to: text("to"),
        amount: amount.to_string(),
        hash: hash.to_string(),
        timestamp: timestamp.to_string(),
    })
}

fn parse_address_activity(
    object: &Map<String, Value>,
) -> Result<AddressActivity, ValidationError> {
    let structure =
        |reason: &str| ValidationError::InvalidTransactionStructure(reason.to_string());

    let event = object
        .get("event")
        .and_then(Value::as_object)
        .ok_or_else(|| structure("missing `event` object"))?;
    let entries = event
        .get("transaction")
        .and_then(Value::as_array)
        .ok_or_else(|| structure("missing `transaction` list"))?;
    if entries.is_empty() {
        return Err(structure("`transaction` list is empty"));
    }

    let items = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(ValidationError::InvalidTransactionStructure(format!(
                    "transaction item {index} is not an object"
                )));
            }
            Ok(match RawTransaction::deserialize(entry) {
                Ok(tx) => ActivityItem::Transaction(tx),
                Err(err) => ActivityItem::Malformed {
                    reason: err.to_string(),
                },
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let optional_text = |map: &Map<String, Value>, key: &str| {
        map.get(key).and_then(Value::as_str).map(str::to_string)
    };

    Ok(AddressActivity {
        webhook_id: optional_text(object, "webhookId"),
        network: optional_text(event, "network"),
        items,
    })
}

/// Digits, optionally followed by a single `.` and more digits.
fn is_plain_decimal(raw: &str) -> bool {
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (raw, None),
    };
    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

    all_digits(whole) && fraction.map_or(true, all_digits)
}
