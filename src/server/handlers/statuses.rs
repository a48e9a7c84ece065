//! Status catalog handlers. Reads are open to any profile; mutations are
//! admin only and push `catalog_updated` to every connected client.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::catalog::ValidationErrors;
use crate::logging::profile_id;
use crate::profile::Profile;
use crate::server::error::{ApiError, ApiJson, AuthProfile};
use crate::server::registry::ConnectionRegistry;
use crate::server::state::{PushEvent, SharedState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default)]
    name: String,
    #[serde(default)]
    min_trust: Option<i64>,
}

#[derive(Deserialize)]
pub struct ActionPayload {
    #[serde(default)]
    name: String,
}

fn require_admin(profile: &Profile) -> Result<(), ApiError> {
    if profile.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Threshold checks that the storage layer can't express with a `u32`.
fn parse_min_trust(raw: Option<i64>) -> Result<u32, ApiError> {
    let mut errors = ValidationErrors::new();
    let value = match raw {
        None => {
            errors.push("minTrust", "minTrust is required");
            0
        }
        Some(v) if v < 0 => {
            errors.push("minTrust", "minTrust must not be negative");
            0
        }
        Some(v) => u32::try_from(v).unwrap_or_else(|_| {
            errors.push("minTrust", "minTrust is too large");
            0
        }),
    };
    errors.into_result()?;
    Ok(value)
}

async fn catalog_changed(registry: Arc<ConnectionRegistry>) {
    registry.publish_all(PushEvent::CatalogUpdated).await;
}

pub async fn list_statuses_handler(
    State(state): State<SharedState>,
    AuthProfile(_me): AuthProfile,
) -> Result<Response, ApiError> {
    let st = state.lock().await;
    let statuses = st.storage.list_statuses()?;
    Ok(axum::Json(statuses).into_response())
}

pub async fn create_status_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    ApiJson(req): ApiJson<StatusPayload>,
) -> Result<Response, ApiError> {
    require_admin(&me)?;
    let min_trust = parse_min_trust(req.min_trust)?;
    let (status, registry) = {
        let st = state.lock().await;
        let status = st.storage.create_status(&req.name, min_trust)?;
        (status, Arc::clone(&st.registry))
    };
    crate::tlog!(
        "catalog: {} created status {} '{}' at {}",
        profile_id(me.id),
        status.id,
        status.name,
        status.min_trust
    );
    catalog_changed(registry).await;
    Ok((StatusCode::CREATED, axum::Json(status)).into_response())
}

pub async fn update_status_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<StatusPayload>,
) -> Result<Response, ApiError> {
    require_admin(&me)?;
    let min_trust = parse_min_trust(req.min_trust)?;
    let (status, registry) = {
        let st = state.lock().await;
        let status = st.storage.update_status(id, &req.name, min_trust)?;
        (status, Arc::clone(&st.registry))
    };
    crate::tlog!(
        "catalog: {} updated status {} to '{}' at {}",
        profile_id(me.id),
        status.id,
        status.name,
        status.min_trust
    );
    catalog_changed(registry).await;
    Ok(axum::Json(status).into_response())
}

pub async fn delete_status_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    require_admin(&me)?;
    let registry = {
        let st = state.lock().await;
        st.storage.delete_status(id)?;
        Arc::clone(&st.registry)
    };
    crate::tlog!("catalog: {} deleted status {}", profile_id(me.id), id);
    catalog_changed(registry).await;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn create_action_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(status_id): Path<i64>,
    ApiJson(req): ApiJson<ActionPayload>,
) -> Result<Response, ApiError> {
    require_admin(&me)?;
    let (action, registry) = {
        let st = state.lock().await;
        let action = st.storage.create_action(status_id, &req.name)?;
        (action, Arc::clone(&st.registry))
    };
    crate::tlog!(
        "catalog: {} created action {} '{}' in status {}",
        profile_id(me.id),
        action.id,
        action.name,
        status_id
    );
    catalog_changed(registry).await;
    Ok((StatusCode::CREATED, axum::Json(action)).into_response())
}

pub async fn update_action_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path((status_id, action_id)): Path<(i64, i64)>,
    ApiJson(req): ApiJson<ActionPayload>,
) -> Result<Response, ApiError> {
    require_admin(&me)?;
    let (action, registry) = {
        let st = state.lock().await;
        let action = st.storage.update_action(status_id, action_id, &req.name)?;
        (action, Arc::clone(&st.registry))
    };
    crate::tlog!(
        "catalog: {} renamed action {} to '{}'",
        profile_id(me.id),
        action.id,
        action.name
    );
    catalog_changed(registry).await;
    Ok(axum::Json(action).into_response())
}

pub async fn delete_action_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path((status_id, action_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    require_admin(&me)?;
    let registry = {
        let st = state.lock().await;
        st.storage.delete_action(status_id, action_id)?;
        Arc::clone(&st.registry)
    };
    crate::tlog!(
        "catalog: {} deleted action {} from status {}",
        profile_id(me.id),
        action_id,
        status_id
    );
    catalog_changed(registry).await;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_trust_parsing() {
        assert_eq!(parse_min_trust(Some(40)).unwrap(), 40);
        for bad in [None, Some(-1), Some(i64::MAX)] {
            match parse_min_trust(bad) {
                Err(ApiError::Validation(errors)) => assert!(errors.has_field("minTrust")),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
    }
}
