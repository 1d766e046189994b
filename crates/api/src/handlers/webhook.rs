use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

use super::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub stored: usize,
}

/// Accepts one provider delivery. The body is taken as raw bytes so the
/// signature is checked over exactly what was sent.
pub async fn webhook_handler(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    // A header that is not visible ASCII counts as absent.
    let claimed = request
        .headers()
        .get(state.signature_header())
        .and_then(|value| value.to_str().ok());

    let report = state.pipeline().ingest(&body, claimed).await?;

    Ok(HttpResponse::Ok().json(WebhookResponse {
        status: "accepted".to_string(),
        stored: report.stored_count(),
    }))
}
