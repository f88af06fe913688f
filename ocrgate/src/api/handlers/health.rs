use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub status: String,
    pub provider: String,
    pub version: String,
}

/// `GET /api/health`
///
/// Reports the active backend without calling it.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthData> {
    Json(HealthData {
        status: "ok".to_string(),
        provider: state.ocr.provider_name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
