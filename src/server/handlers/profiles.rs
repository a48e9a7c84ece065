//! Registration and profile handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::logging::profile_id;
use crate::profile::{validate_identificator, ProfileUpdate};
use crate::server::error::{ApiError, ApiJson, AuthProfile};
use crate::server::state::SharedState;
use crate::storage::{now_secs, StorageError};

#[derive(Deserialize)]
pub struct RegisterPayload {
    #[serde(default)]
    identificator: String,
    username: Option<String>,
}

pub async fn register_handler(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<RegisterPayload>,
) -> Result<Response, ApiError> {
    let identificator = validate_identificator(&req.identificator)?;
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let st = state.lock().await;
    let is_admin = st.is_admin_identificator(&identificator);
    let profile = match st.storage.insert_profile(&identificator, username, is_admin) {
        Ok(p) => p,
        Err(StorageError::AlreadyExists(_)) => {
            return Err(ApiError::invalid(
                "identificator",
                "identificator is already taken",
            ))
        }
        Err(e) => return Err(e.into()),
    };
    let token = st.signer.issue(profile.id, now_secs());
    crate::tlog!(
        "registered {} as {}{}",
        profile_id(profile.id),
        profile.identificator,
        if is_admin { " (admin)" } else { "" }
    );

    let body = serde_json::json!({
        "profile": profile.own_view(),
        "token": token,
    });
    Ok((StatusCode::CREATED, axum::Json(body)).into_response())
}

pub async fn get_own_profile_handler(AuthProfile(me): AuthProfile) -> Response {
    axum::Json(me.own_view()).into_response()
}

pub async fn update_own_profile_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Response, ApiError> {
    // Merge into the stored row, not the copy taken at extraction time.
    let st = state.lock().await;
    let mut current = st
        .storage
        .get_profile(me.id)?
        .ok_or(ApiError::Unauthorized)?;
    update.apply(&mut current);
    st.storage.update_profile(&current)?;
    crate::tlog!("updated profile {}", profile_id(current.id));
    Ok(axum::Json(current.own_view()).into_response())
}

pub async fn get_public_profile_handler(
    State(state): State<SharedState>,
    AuthProfile(_me): AuthProfile,
    Path(identificator): Path<String>,
) -> Result<Response, ApiError> {
    let st = state.lock().await;
    let profile = st
        .storage
        .find_profile_by_identificator(identificator.trim())?
        .ok_or_else(|| ApiError::not_found("profile"))?;
    Ok(axum::Json(profile.public_view()).into_response())
}
