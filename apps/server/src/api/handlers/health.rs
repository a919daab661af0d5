use crate::{state::AppState, Result};
use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

/// Liveness plus a store round-trip
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse> {
    state.store.ping().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
