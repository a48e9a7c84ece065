//! HTTP error mapping and request authentication.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use serde::de::DeserializeOwned;

use crate::auth::{bearer_token, AuthError};
use crate::catalog::ValidationErrors;
use crate::contact::ContactError;
use crate::profile::Profile;
use crate::server::state::{AppState, SharedState};
use crate::storage::{now_secs, StorageError};

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    Unauthorized,
    Forbidden,
    NotFound(String),
    /// Logged in full, reported to the client without detail.
    Internal(String),
}

impl ApiError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(ValidationErrors::single(field, message))
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                axum::Json(serde_json::json!({ "errors": errors.errors })),
            )
                .into_response(),
            ApiError::Unauthorized => api_error(StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Forbidden => api_error(StatusCode::FORBIDDEN, "forbidden"),
            ApiError::NotFound(msg) => api_error(StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                crate::tlog!("internal error: {}", msg);
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        ApiError::Validation(e)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Invalid(errors) => ApiError::Validation(errors),
            StorageError::NotFound(what) => ApiError::not_found(&what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(e: ContactError) -> Self {
        match e {
            ContactError::NotParticipant(_) => ApiError::not_found("contact"),
            ContactError::NotAllowed { .. } => ApiError::invalid("status", e.to_string()),
            ContactError::InvalidState(inner) => ApiError::Internal(format!("BUG: {inner}")),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        crate::tlog!("auth rejected: {}", e);
        ApiError::Unauthorized
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid("body", rejection.body_text())
    }
}

/// `axum::Json` whose rejections use the same `{"errors": [...]}` body as
/// every other validation failure.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Resolve a bearer token to a live profile.
pub fn authenticate(st: &AppState, token: &str) -> Result<Profile, ApiError> {
    let claims = st.signer.verify(token, now_secs())?;
    st.storage
        .get_profile(claims.sub)?
        .ok_or(ApiError::Unauthorized)
}

/// The caller's profile, taken from `Authorization: Bearer <token>`.
pub struct AuthProfile(pub Profile);

#[axum::async_trait]
impl FromRequestParts<SharedState> for AuthProfile {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header_value)?;
        let st = state.lock().await;
        authenticate(&st, token).map(AuthProfile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::{DisplayStatus, InvalidStateError, SideStatus, Transition};

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::invalid("name", "x"), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ApiError::Forbidden, StatusCode::FORBIDDEN),
            (ApiError::not_found("contact"), StatusCode::NOT_FOUND),
            (
                ApiError::Internal("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.into_response().status(), code);
        }
    }

    #[test]
    fn test_contact_error_mapping() {
        let not_allowed = ContactError::NotAllowed {
            transition: Transition::Accept,
            current: DisplayStatus::Connected,
        };
        assert!(matches!(ApiError::from(not_allowed), ApiError::Validation(_)));

        let invalid = ContactError::InvalidState(InvalidStateError {
            mine: SideStatus::Pending,
            theirs: SideStatus::Pending,
        });
        assert!(matches!(ApiError::from(invalid), ApiError::Internal(_)));
        assert!(matches!(
            ApiError::from(ContactError::NotParticipant(3)),
            ApiError::NotFound(_)
        ));
    }
}
