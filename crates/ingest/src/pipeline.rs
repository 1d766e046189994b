//! Per-delivery orchestration: authenticate -> parse -> extract -> store.
//!
//! Authentication and payload validation fail the whole delivery. Extraction
//! failures are scoped to one item and collected in the [`IngestReport`];
//! the remaining items are still processed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use strum_macros::AsRefStr;
use thiserror::Error;
use tracing::{debug, info, warn};
use transfer_watch_domain::config::IngestConfig;
use transfer_watch_domain::storage::{StorageError, StorageResult, TransferStore};
use transfer_watch_domain::{
    AuthenticationError, SignatureVerifier, TransactionHash, TransferRecord,
};

use crate::extract::{extract_from_transaction, extract_legacy, MonitorTarget, ProcessingError};
use crate::payload::{
    decode_body, parse_payload, ActivityItem, DecodedPayload, PayloadKind, ValidationError,
};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthenticationError),
    #[error("invalid payload: {0}")]
    Invalid(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

/// What happened to a single item of a delivery.
#[derive(Debug, Clone, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ItemOutcome {
    Stored(TransactionHash),
    Filtered,
    Failed(ProcessingError),
}

/// Summary of one accepted delivery. Item outcomes are in payload order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub kind: PayloadKind,
    pub outcomes: Vec<ItemOutcome>,
}

impl IngestReport {
    fn new(kind: PayloadKind) -> Self {
        Self {
            kind,
            outcomes: Vec::new(),
        }
    }

    pub fn stored(&self) -> impl Iterator<Item = &TransactionHash> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ItemOutcome::Stored(hash) => Some(hash),
            _ => None,
        })
    }

    pub fn stored_count(&self) -> usize {
        self.stored().count()
    }

    pub fn filtered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ItemOutcome::Filtered))
            .count()
    }

    /// Item index and error for every item that could not be processed.
    pub fn failures(&self) -> impl Iterator<Item = (usize, &ProcessingError)> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                ItemOutcome::Failed(err) => Some((index, err)),
                _ => None,
            })
    }
}

/// Observability port for the pipeline. The pipeline's contract is its
/// return value; observers only see copies of what happened.
pub trait IngestObserver: Send + Sync {
    fn delivery_rejected(&self, error: &IngestError);
    fn item_settled(&self, kind: PayloadKind, index: usize, outcome: &ItemOutcome);
    fn delivery_accepted(&self, report: &IngestReport);
}

/// Default observer: `tracing` events plus `metrics` counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl IngestObserver for TracingObserver {
    fn delivery_rejected(&self, error: &IngestError) {
        let status = match error {
            IngestError::Unauthorized(_) => "unauthorized",
            IngestError::Invalid(_) => "invalid",
            IngestError::Storage(_) => "error",
        };
        counter!("webhook_requests_total", "status" => status).increment(1);
        match error {
            IngestError::Invalid(reason) => {
                let reason: &str = reason.as_ref();
                warn!(reason, %error, "rejected webhook payload")
            }
            _ => warn!(%error, "rejected webhook delivery"),
        }
    }

    fn item_settled(&self, kind: PayloadKind, index: usize, outcome: &ItemOutcome) {
        let result = outcome.as_ref().to_owned();
        counter!("webhook_items_total", "result" => result).increment(1);
        let kind: &str = kind.as_ref();
        match outcome {
            ItemOutcome::Stored(hash) => info!(kind, index, %hash, "stored transfer"),
            ItemOutcome::Filtered => debug!(kind, index, "item not relevant"),
            ItemOutcome::Failed(err) => {
                let reason: &str = err.as_ref();
                warn!(kind, index, reason, %err, "skipping unprocessable item")
            }
        }
    }

    fn delivery_accepted(&self, report: &IngestReport) {
        counter!("webhook_requests_total", "status" => "accepted").increment(1);
        let kind: &str = report.kind.as_ref();
        info!(
            kind,
            items = report.outcomes.len(),
            stored = report.stored_count(),
            filtered = report.filtered_count(),
            failed = report.failures().count(),
            "webhook accepted"
        );
    }
}

/// Composes signature verification, parsing, extraction and storage for each
/// delivery. Generic over the store so tests can substitute their own.
pub struct IngestPipeline<S> {
    verifier: SignatureVerifier,
    target: MonitorTarget,
    store: S,
    observer: Arc<dyn IngestObserver>,
}

impl<S> IngestPipeline<S>
where
    S: TransferStore,
{
    pub fn new(config: &IngestConfig, store: S) -> Self {
        Self {
            verifier: SignatureVerifier::new(config.webhook_secret()),
            target: MonitorTarget::from(config),
            store,
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one delivery. `raw_body` must be the exact bytes received; the
    /// signature is checked over them before any decoding happens.
    pub async fn ingest(
        &self,
        raw_body: &[u8],
        claimed_signature: Option<&str>,
    ) -> Result<IngestReport, IngestError> {
        match self.run(raw_body, claimed_signature).await {
            Ok(report) => {
                self.observer.delivery_accepted(&report);
                Ok(report)
            }
            Err(err) => {
                self.observer.delivery_rejected(&err);
                Err(err)
            }
        }
    }

    pub async fn query_by_hash(
        &self,
        hash: &TransactionHash,
    ) -> StorageResult<Option<TransferRecord>> {
        self.store.find_transfer(hash).await
    }

    async fn run(
        &self,
        raw_body: &[u8],
        claimed_signature: Option<&str>,
    ) -> Result<IngestReport, IngestError> {
        self.verifier.authenticate(raw_body, claimed_signature)?;
        let value = decode_body(raw_body)?;
        let payload = parse_payload(&value)?;

        let observed_at = Utc::now();
        let mut report = IngestReport::new(payload.kind());
        match &payload {
            DecodedPayload::Legacy(event) => {
                let extracted = extract_legacy(event, &self.target);
                self.settle(&mut report, extracted).await?;
            }
            DecodedPayload::AddressActivity(activity) => {
                for item in &activity.items {
                    let extracted = self.extract_item(item, observed_at);
                    self.settle(&mut report, extracted).await?;
                }
            }
        }

        Ok(report)
    }

    fn extract_item(
        &self,
        item: &ActivityItem,
        observed_at: DateTime<Utc>,
    ) -> Result<Option<TransferRecord>, ProcessingError> {
        match item {
            ActivityItem::Transaction(tx) => {
                extract_from_transaction(tx, &self.target, observed_at)
            }
            ActivityItem::Malformed { reason } => {
                Err(ProcessingError::MalformedItem(reason.clone()))
            }
        }
    }

    /// Stores a successful extraction and appends the item outcome. Only a
    /// storage failure escapes; item errors are recorded and swallowed.
    async fn settle(
        &self,
        report: &mut IngestReport,
        extracted: Result<Option<TransferRecord>, ProcessingError>,
    ) -> Result<(), IngestError> {
        let outcome = match extracted {
            Ok(Some(record)) => {
                let hash = record.transaction_hash.clone();
                self.store.upsert_transfer(record).await?;
                ItemOutcome::Stored(hash)
            }
            Ok(None) => ItemOutcome::Filtered,
            Err(err) => ItemOutcome::Failed(err),
        };

        self.observer
            .item_settled(report.kind, report.outcomes.len(), &outcome);
        report.outcomes.push(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use transfer_watch_domain::signature::compute_signature;
    use transfer_watch_storage::InMemoryTransferStore;

    use crate::payload::ADDRESS_ACTIVITY_TYPE;

    const SECRET: &str = "webhook-secret";
    const MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
    const SENDER: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";
    const OTHER: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
    const PROGRAM: &str = "11111111111111111111111111111111";

    fn config() -> IngestConfig {
        IngestConfig::new(SECRET, WALLET, MINT, 1_000_000_000).expect("valid config")
    }

    fn pipeline() -> IngestPipeline<InMemoryTransferStore> {
        IngestPipeline::new(&config(), InMemoryTransferStore::new())
    }

    fn sign(body: &[u8]) -> String {
        compute_signature(body, SECRET.as_bytes()).unwrap()
    }

    fn legacy_body(to: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event": {
                "tokenAddress": MINT,
                "from": SENDER,
                "to": to,
                "amount": "12.5",
                "hash": "abc123",
                "timestamp": "2024-05-01T12:00:00Z"
            }
        }))
        .unwrap()
    }

    fn activity_item(signature: &str, pre: u64, post: u64) -> Value {
        json!({
            "signature": signature,
            "slot": 250_000_000u64,
            "account_keys": [SENDER, WALLET, PROGRAM],
            "instructions": [
                { "program_id_index": 2, "accounts": [0, 1], "data": "3Bxs4h24hBtQy9rw" }
            ],
            "meta": {
                "pre_balances": [9_000_000_000u64, pre, 1],
                "post_balances": [8_000_000_000u64, post, 1],
                "fee": 5000
            }
        })
    }

    fn activity_body(items: Vec<Value>) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "webhookId": "wh_1",
            "type": ADDRESS_ACTIVITY_TYPE,
            "event": { "network": "SOLANA_MAINNET", "transaction": items }
        }))
        .unwrap()
    }

    async fn ingest_signed(
        pipeline: &IngestPipeline<InMemoryTransferStore>,
        body: &[u8],
    ) -> Result<IngestReport, IngestError> {
        let signature = sign(body);
        pipeline.ingest(body, Some(&signature)).await
    }

    #[tokio::test]
    async fn legacy_delivery_for_monitored_wallet_is_stored() {
        let pipeline = pipeline();
        let report = ingest_signed(&pipeline, &legacy_body(WALLET))
            .await
            .expect("accepted");

        assert_eq!(report.kind, PayloadKind::Legacy);
        assert_eq!(report.stored_count(), 1);
        let record = pipeline
            .query_by_hash(&TransactionHash::new("abc123"))
            .await
            .unwrap()
            .expect("record stored");
        assert_eq!(record.amount, Decimal::new(125, 1));
        assert_eq!(record.transaction_hash.as_str(), "abc123");
        assert_eq!(pipeline.store().len().unwrap(), 1);
    }

    #[tokio::test]
    async fn legacy_delivery_for_other_recipient_is_accepted_but_not_stored() {
        let pipeline = pipeline();
        let report = ingest_signed(&pipeline, &legacy_body(OTHER))
            .await
            .expect("accepted");

        assert_eq!(report.outcomes, vec![ItemOutcome::Filtered]);
        assert!(pipeline.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn activity_delivery_records_incoming_delta() {
        let pipeline = pipeline();
        let body = activity_body(vec![activity_item("sig-in", 1_000_000_000, 1_500_000_000)]);
        let report = ingest_signed(&pipeline, &body).await.expect("accepted");

        assert_eq!(report.kind, PayloadKind::AddressActivity);
        let record = pipeline
            .query_by_hash(&TransactionHash::new("sig-in"))
            .await
            .unwrap()
            .expect("record stored");
        assert_eq!(record.amount, Decimal::new(5, 1));
        assert_eq!(record.from, SENDER);
        assert_eq!(record.to, WALLET);
    }

    #[tokio::test]
    async fn activity_delivery_ignores_outgoing_delta() {
        let pipeline = pipeline();
        let body = activity_body(vec![activity_item("sig-out", 1_500_000_000, 1_000_000_000)]);
        let report = ingest_signed(&pipeline, &body).await.expect("accepted");

        assert_eq!(report.outcomes, vec![ItemOutcome::Filtered]);
        assert!(pipeline.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_before_parsing() {
        let pipeline = pipeline();
        let err = pipeline
            .ingest(b"definitely not json", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Unauthorized(AuthenticationError::MissingSignature)
        ));
        assert!(pipeline.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn mismatched_signature_is_rejected() {
        let pipeline = pipeline();
        let body = legacy_body(WALLET);
        let err = pipeline
            .ingest(&body, Some(&sign(b"something else")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Unauthorized(AuthenticationError::InvalidSignature)
        ));
        assert!(pipeline.store().is_empty().unwrap());
    }

    #[tokio::test]
    async fn signed_garbage_is_invalid_not_unauthorized() {
        let pipeline = pipeline();
        let err = ingest_signed(&pipeline, b"[1, 2").await.unwrap_err();
        assert!(matches!(
            err,
            IngestError::Invalid(ValidationError::MalformedJson(_))
        ));
    }

    #[tokio::test]
    async fn malformed_item_does_not_sink_its_siblings() {
        let pipeline = pipeline();
        let mut broken = activity_item("sig-broken", 0, 10);
        broken["instructions"] = json!([]);
        let body = activity_body(vec![broken, activity_item("sig-ok", 0, 2_000_000_000)]);

        let report = ingest_signed(&pipeline, &body).await.expect("accepted");

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures, vec![(0, &ProcessingError::EmptyInstructions)]);
        assert_eq!(
            report.stored().cloned().collect::<Vec<_>>(),
            vec![TransactionHash::new("sig-ok")]
        );
        assert_eq!(pipeline.store().len().unwrap(), 1);
        assert!(pipeline
            .query_by_hash(&TransactionHash::new("sig-broken"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn badly_typed_item_is_isolated() {
        let pipeline = pipeline();
        let mut broken = activity_item("sig-typed", 0, 10);
        broken["meta"]["pre_balances"] = json!(["lots"]);
        let body = activity_body(vec![broken, activity_item("sig-fine", 0, 1)]);

        let report = ingest_signed(&pipeline, &body).await.expect("accepted");
        assert!(matches!(
            report.outcomes[0],
            ItemOutcome::Failed(ProcessingError::MalformedItem(_))
        ));
        assert_eq!(report.stored_count(), 1);
    }

    #[tokio::test]
    async fn redelivery_overwrites_by_hash() {
        let pipeline = pipeline();
        let body = legacy_body(WALLET);
        ingest_signed(&pipeline, &body).await.unwrap();
        ingest_signed(&pipeline, &body).await.unwrap();
        assert_eq!(pipeline.store().len().unwrap(), 1);
    }

    #[tokio::test]
    async fn oversized_signature_is_isolated_and_bounded_hash_is_queryable() {
        let pipeline = pipeline();
        let longest = "5".repeat(transfer_watch_domain::MAX_HASH_LENGTH);
        let oversized = format!("{longest}5");
        let body = activity_body(vec![
            activity_item(&oversized, 0, 1_000_000_000),
            activity_item(&longest, 0, 1_000_000_000),
        ]);

        let report = ingest_signed(&pipeline, &body).await.expect("accepted");
        assert!(matches!(
            report.outcomes[0],
            ItemOutcome::Failed(ProcessingError::InvalidHash(_))
        ));
        assert_eq!(report.stored_count(), 1);

        let lookup = TransactionHash::parse(&longest).expect("within bounds");
        assert!(pipeline.query_by_hash(&lookup).await.unwrap().is_some());
        assert!(TransactionHash::parse(&oversized).is_err());
    }

    struct FailingStore;

    #[async_trait]
    impl TransferStore for FailingStore {
        async fn upsert_transfer(&self, _record: TransferRecord) -> StorageResult<()> {
            Err(StorageError::Backend("disk on fire".into()))
        }

        async fn find_transfer(
            &self,
            _hash: &TransactionHash,
        ) -> StorageResult<Option<TransferRecord>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn storage_failure_surfaces_as_error() {
        let pipeline = IngestPipeline::new(&config(), FailingStore);
        let err = ingest_signed_with(&pipeline, &legacy_body(WALLET))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Storage(_)));
    }

    async fn ingest_signed_with<S: TransferStore>(
        pipeline: &IngestPipeline<S>,
        body: &[u8],
    ) -> Result<IngestReport, IngestError> {
        let signature = sign(body);
        pipeline.ingest(body, Some(&signature)).await
    }

    #[derive(Default)]
    struct RecordingObserver {
        rejected: AtomicUsize,
        accepted: AtomicUsize,
        items: Mutex<Vec<(usize, String)>>,
    }

    impl IngestObserver for RecordingObserver {
        fn delivery_rejected(&self, _error: &IngestError) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }

        fn item_settled(&self, _kind: PayloadKind, index: usize, outcome: &ItemOutcome) {
            self.items
                .lock()
                .unwrap()
                .push((index, outcome.as_ref().to_owned()));
        }

        fn delivery_accepted(&self, _report: &IngestReport) {
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn observer_sees_every_item_in_order() {
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = pipeline().with_observer(observer.clone());

        let mut broken = activity_item("sig-a", 0, 10);
        broken["account_keys"] = json!([]);
        let body = activity_body(vec![
            broken,
            activity_item("sig-b", 5, 1),
            activity_item("sig-c", 1, 5),
        ]);
        ingest_signed(&pipeline, &body).await.unwrap();
        let _ = pipeline.ingest(&body, None).await;

        assert_eq!(observer.accepted.load(Ordering::SeqCst), 1);
        assert_eq!(observer.rejected.load(Ordering::SeqCst), 1);
        assert_eq!(
            *observer.items.lock().unwrap(),
            vec![
                (0, "failed".to_string()),
                (1, "filtered".to_string()),
                (2, "stored".to_string()),
            ]
        );
    }
}
