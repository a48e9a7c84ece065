//! Health check endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::server::error::ApiError;
use crate::server::state::SharedState;

pub async fn health_handler(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let st = state.lock().await;
    let profiles = st.storage.count_profiles()?;
    let body = serde_json::json!({
        "status": "ok",
        "profiles": profiles,
        "connections": st.registry.connection_count(),
    });
    Ok((StatusCode::OK, axum::Json(body)).into_response())
}
