use actix_web::{web::Data, HttpResponse};

use crate::state::AppState;

/// Prometheus text exposition of every counter recorded so far.
pub async fn metrics_handler(state: Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(state.telemetry().render_metrics())
}
