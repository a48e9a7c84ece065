//! Contact handlers: requests, transitions, trust, names and actions.
//!
//! Every mutation pushes `contact_updated` to both parties, each with their
//! own view, after the state lock is released.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::catalog::Status;
use crate::contact::{Contact, DisplayStatus, Transition};
use crate::logging::{contact_id, profile_id};
use crate::server::config::MAX_CUSTOM_NAME_LEN;
use crate::server::error::{ApiError, ApiJson, AuthProfile};
use crate::server::registry::ConnectionRegistry;
use crate::server::state::{AppState, PushEvent, SharedState};
use crate::server::views::{both_views, contact_view, listed_views, ContactView};
use crate::storage::StorageError;
use crate::trust;

#[derive(Deserialize)]
pub struct ContactRequestPayload {
    #[serde(default)]
    identificator: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomNamePayload {
    #[serde(default)]
    custom_name: Option<String>,
}

#[derive(Deserialize)]
pub struct TrustPayload {
    #[serde(default)]
    delta: i64,
}

/// Load a contact the viewer is a party of. Anything else is reported as
/// not found so contact ids of other profiles don't leak.
fn load_contact(st: &AppState, id: i64, viewer: i64) -> Result<Contact, ApiError> {
    match st.storage.get_contact(id)? {
        Some(contact) if contact.involves(viewer) => Ok(contact),
        _ => Err(ApiError::not_found("contact")),
    }
}

fn require_connected(contact: &Contact, viewer: i64) -> Result<(), ApiError> {
    if contact.display_status(viewer)? != DisplayStatus::Connected {
        return Err(ApiError::invalid("status", "contact is not connected"));
    }
    Ok(())
}

struct ContactUpdate {
    mine: ContactView,
    other: i64,
    theirs: ContactView,
    registry: Arc<ConnectionRegistry>,
}

impl ContactUpdate {
    fn collect(st: &AppState, contact_id: i64, actor: i64) -> Result<Self, ApiError> {
        let contact = st
            .storage
            .get_contact(contact_id)?
            .ok_or_else(|| ApiError::not_found("contact"))?;
        let (mine, other, theirs) = both_views(&st.storage, &contact, actor)?;
        Ok(Self {
            mine,
            other,
            theirs,
            registry: Arc::clone(&st.registry),
        })
    }

    /// Push to both parties and answer the actor with their view.
    async fn publish(self, actor: i64) -> Response {
        self.registry
            .publish(
                actor,
                PushEvent::ContactUpdated {
                    contact: self.mine.clone(),
                },
            )
            .await;
        self.registry
            .publish(
                self.other,
                PushEvent::ContactUpdated {
                    contact: self.theirs,
                },
            )
            .await;
        axum::Json(self.mine).into_response()
    }
}

pub async fn list_contacts_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
) -> Result<Response, ApiError> {
    let st = state.lock().await;
    let views = listed_views(&st.storage, me.id)?;
    Ok(axum::Json(views).into_response())
}

pub async fn get_contact_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let st = state.lock().await;
    let contact = load_contact(&st, id, me.id)?;
    let statuses = st.storage.list_statuses()?;
    let view = contact_view(&st.storage, &statuses, &contact, me.id)?;
    Ok(axum::Json(view).into_response())
}

pub async fn request_contact_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    ApiJson(req): ApiJson<ContactRequestPayload>,
) -> Result<Response, ApiError> {
    let identificator = req.identificator.trim();
    if identificator.is_empty() {
        return Err(ApiError::invalid("identificator", "identificator is required"));
    }

    let update = {
        let st = state.lock().await;
        let other = st
            .storage
            .find_profile_by_identificator(identificator)?
            .ok_or_else(|| {
                ApiError::invalid("identificator", "no profile with this identificator")
            })?;
        if other.id == me.id {
            return Err(ApiError::invalid(
                "identificator",
                "cannot send a contact request to yourself",
            ));
        }
        let duplicate = || {
            ApiError::invalid(
                "identificator",
                "a contact with this profile already exists",
            )
        };
        if st.storage.find_contact_between(me.id, other.id)?.is_some() {
            return Err(duplicate());
        }
        let contact = match st
            .storage
            .insert_contact(&Contact::request_sides(me.id, other.id))
        {
            Ok(c) => c,
            Err(StorageError::AlreadyExists(_)) => return Err(duplicate()),
            Err(e) => return Err(e.into()),
        };
        crate::tlog!(
            "contact {}: {} requested {}",
            contact_id(contact.id),
            profile_id(me.id),
            profile_id(other.id)
        );
        ContactUpdate::collect(&st, contact.id, me.id)?
    };
    Ok(update.publish(me.id).await)
}

async fn transition(
    state: SharedState,
    actor: i64,
    id: i64,
    transition: Transition,
) -> Result<Response, ApiError> {
    let update = {
        let st = state.lock().await;
        let mut contact = load_contact(&st, id, actor)?;
        let status = contact.apply(actor, transition)?;
        let (mine, _) = contact.sides_for(actor)?;
        st.storage.update_contact_side(contact.id, mine)?;
        crate::tlog!(
            "contact {}: {} {} -> {:?}",
            contact_id(contact.id),
            profile_id(actor),
            transition.as_str(),
            status
        );
        ContactUpdate::collect(&st, contact.id, actor)?
    };
    Ok(update.publish(actor).await)
}

pub async fn accept_contact_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    transition(state, me.id, id, Transition::Accept).await
}

pub async fn reject_contact_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    transition(state, me.id, id, Transition::Reject).await
}

pub async fn remove_contact_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    transition(state, me.id, id, Transition::Remove).await
}

pub async fn acknowledge_contact_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    transition(state, me.id, id, Transition::Acknowledge).await
}

pub async fn set_custom_name_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<CustomNamePayload>,
) -> Result<Response, ApiError> {
    let custom_name = req
        .custom_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(name) = &custom_name {
        if name.chars().count() > MAX_CUSTOM_NAME_LEN {
            return Err(ApiError::invalid(
                "customName",
                format!("customName must be at most {MAX_CUSTOM_NAME_LEN} characters"),
            ));
        }
    }

    let update = {
        let st = state.lock().await;
        let mut contact = load_contact(&st, id, me.id)?;
        let side = contact.side_mut(me.id)?;
        side.custom_name = custom_name;
        st.storage.update_contact_side(id, side)?;
        crate::tlog!(
            "contact {}: {} renamed",
            contact_id(id),
            profile_id(me.id)
        );
        ContactUpdate::collect(&st, contact.id, me.id)?
    };
    Ok(update.publish(me.id).await)
}

pub async fn change_trust_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<TrustPayload>,
) -> Result<Response, ApiError> {
    if req.delta == 0 {
        return Err(ApiError::invalid("delta", "delta must not be zero"));
    }

    let update = {
        let st = state.lock().await;
        let mut contact = load_contact(&st, id, me.id)?;
        require_connected(&contact, me.id)?;
        let side = contact.side_mut(me.id)?;
        let before = side.trust_points;
        side.trust_points = trust::apply_trust_delta(before, req.delta);
        st.storage.update_contact_side(id, side)?;
        crate::tlog!(
            "contact {}: {} trust {} -> {}",
            contact_id(id),
            profile_id(me.id),
            before,
            side.trust_points
        );
        ContactUpdate::collect(&st, contact.id, me.id)?
    };
    Ok(update.publish(me.id).await)
}

fn require_action_exists(statuses: &[Status], action_id: i64) -> Result<(), ApiError> {
    let exists = statuses
        .iter()
        .flat_map(|s| s.actions.iter())
        .any(|a| a.id == action_id);
    if exists {
        Ok(())
    } else {
        Err(ApiError::not_found("action"))
    }
}

fn require_unlocked(
    statuses: &[Status],
    contact: &Contact,
    viewer: i64,
    action_id: i64,
) -> Result<(), ApiError> {
    let (mine, theirs) = contact.sides_for(viewer)?;
    let mutual = trust::mutual_trust(mine.trust_points, theirs.trust_points);
    if !trust::is_action_unlocked(statuses, mutual, action_id) {
        return Err(ApiError::invalid(
            "actionId",
            "action is not unlocked for this contact",
        ));
    }
    Ok(())
}

pub async fn mark_action_done_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path((id, action_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let update = {
        let st = state.lock().await;
        let contact = load_contact(&st, id, me.id)?;
        require_connected(&contact, me.id)?;
        let statuses = st.storage.list_statuses()?;
        require_action_exists(&statuses, action_id)?;
        require_unlocked(&statuses, &contact, me.id, action_id)?;
        if st.storage.set_action_done(contact.id, action_id)? {
            crate::tlog!(
                "contact {}: {} marked action {} done",
                contact_id(contact.id),
                profile_id(me.id),
                action_id
            );
        }
        ContactUpdate::collect(&st, contact.id, me.id)?
    };
    Ok(update.publish(me.id).await)
}

pub async fn undo_action_handler(
    State(state): State<SharedState>,
    AuthProfile(me): AuthProfile,
    Path((id, action_id)): Path<(i64, i64)>,
) -> Result<Response, ApiError> {
    let update = {
        let st = state.lock().await;
        let contact = load_contact(&st, id, me.id)?;
        require_connected(&contact, me.id)?;
        let statuses = st.storage.list_statuses()?;
        require_action_exists(&statuses, action_id)?;
        // A recorded action can always be undone, even after trust dropped.
        if !st.storage.list_done_actions(contact.id)?.contains(&action_id) {
            require_unlocked(&statuses, &contact, me.id, action_id)?;
        }
        if st.storage.clear_action_done(contact.id, action_id)? {
            crate::tlog!(
                "contact {}: {} undid action {}",
                contact_id(contact.id),
                profile_id(me.id),
                action_id
            );
        }
        ContactUpdate::collect(&st, contact.id, me.id)?
    };
    Ok(update.publish(me.id).await)
}
