use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

/// Decoded webhook body. The parser produces exactly one variant and the
/// pipeline matches on it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Legacy(LegacyEvent),
    AddressActivity(AddressActivity),
}

impl DecodedPayload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            DecodedPayload::Legacy(_) => PayloadKind::Legacy,
            DecodedPayload::AddressActivity(_) => PayloadKind::AddressActivity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PayloadKind {
    Legacy,
    AddressActivity,
}

/// Flat token-event notification. Every field has passed format validation;
/// numeric conversion happens during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEvent {
    pub token_address: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressActivity {
    pub webhook_id: Option<String>,
    pub network: Option<String>,
    pub items: Vec<ActivityItem>,
}

/// One entry of the activity batch. Entries are decoded independently so a
/// badly typed sibling does not sink the rest of the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityItem {
    Transaction(RawTransaction),
    Malformed { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub slot: Option<u64>,
    #[serde(default)]
    pub account_keys: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<RawInstruction>,
    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RawInstruction {
    #[serde(default)]
    pub program_id_index: Option<usize>,
    /// Indices into the owning transaction's `account_keys`.
    #[serde(default)]
    pub accounts: Vec<usize>,
    #[serde(default)]
    pub data: String,
}

/// Native balances in lamports, index-aligned with `account_keys`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransactionMeta {
    #[serde(default)]
    pub pre_balances: Option<Vec<u64>>,
    #[serde(default)]
    pub post_balances: Option<Vec<u64>>,
    #[serde(default)]
    pub fee: Option<u64>,
}
