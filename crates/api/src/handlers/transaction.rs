use actix_web::{web, HttpResponse};
use metrics::counter;
use strum_macros::AsRefStr;
use transfer_watch_domain::TransactionHash;

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Clone, Copy, AsRefStr)]
#[strum(serialize_all = "snake_case")]
enum LookupStatus {
    Found,
    NotFound,
    InvalidHash,
    Error,
}

fn record_lookup(status: LookupStatus) {
    let status = status.as_ref().to_owned();
    counter!("transaction_lookups_total", "status" => status).increment(1);
}

/// Returns the stored transfer for `hash`, serialized as camelCase JSON.
pub async fn transaction_handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let hash = TransactionHash::parse(&path.into_inner()).inspect_err(|_| {
        record_lookup(LookupStatus::InvalidHash);
    })?;

    let record = state
        .pipeline()
        .query_by_hash(&hash)
        .await
        .inspect_err(|_| record_lookup(LookupStatus::Error))?;

    match record {
        Some(record) => {
            record_lookup(LookupStatus::Found);
            Ok(HttpResponse::Ok().json(record))
        }
        None => {
            record_lookup(LookupStatus::NotFound);
            Err(ApiError::NotFound)
        }
    }
}
