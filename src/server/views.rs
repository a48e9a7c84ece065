//! Per-viewer JSON projections of contacts.

use serde::Serialize;

use crate::catalog::Status;
use crate::contact::{Contact, DisplayStatus};
use crate::profile::PublicProfile;
use crate::server::error::ApiError;
use crate::storage::Storage;
use crate::trust;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub id: i64,
    pub name: String,
    pub min_trust: u32,
}

/// A contact as one of its parties sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactView {
    pub id: i64,
    pub status: DisplayStatus,
    /// The other party.
    pub profile: PublicProfile,
    pub custom_name: Option<String>,
    pub my_trust_points: u32,
    pub their_trust_points: u32,
    pub mutual_trust: u32,
    pub unlocked_status: Option<StatusSummary>,
    pub done_actions: Vec<i64>,
}

/// Build `viewer`'s view of `contact`. `statuses` must be the current
/// catalog, ascending by threshold.
pub fn contact_view(
    storage: &Storage,
    statuses: &[Status],
    contact: &Contact,
    viewer: i64,
) -> Result<ContactView, ApiError> {
    let status = contact.display_status(viewer)?;
    let (mine, theirs) = contact.sides_for(viewer)?;
    let other = storage.get_profile(theirs.profile_id)?.ok_or_else(|| {
        ApiError::Internal(format!(
            "contact {} references missing profile {}",
            contact.id, theirs.profile_id
        ))
    })?;
    let mutual = trust::mutual_trust(mine.trust_points, theirs.trust_points);
    let unlocked_status = trust::unlocked_status(statuses, mutual).map(|s| StatusSummary {
        id: s.id,
        name: s.name.clone(),
        min_trust: s.min_trust,
    });

    Ok(ContactView {
        id: contact.id,
        status,
        profile: other.public_view(),
        custom_name: mine.custom_name.clone(),
        my_trust_points: mine.trust_points,
        their_trust_points: theirs.trust_points,
        mutual_trust: mutual,
        unlocked_status,
        done_actions: storage.list_done_actions(contact.id)?,
    })
}

/// Views for both parties: `(actor's view, other party id, other party's view)`.
pub fn both_views(
    storage: &Storage,
    contact: &Contact,
    actor: i64,
) -> Result<(ContactView, i64, ContactView), ApiError> {
    let statuses = storage.list_statuses()?;
    let other = contact.other_profile(actor)?;
    let mine = contact_view(storage, &statuses, contact, actor)?;
    let theirs = contact_view(storage, &statuses, contact, other)?;
    Ok((mine, other, theirs))
}

/// The viewer's listed contacts. A contact whose sides form an impossible
/// combination is logged and skipped rather than failing the whole list.
pub fn listed_views(storage: &Storage, viewer: i64) -> Result<Vec<ContactView>, ApiError> {
    let statuses = storage.list_statuses()?;
    let mut views = Vec::new();
    for contact in storage.list_contacts_for(viewer)? {
        match contact.display_status(viewer) {
            Ok(status) if status.is_listed() => {
                views.push(contact_view(storage, &statuses, &contact, viewer)?);
            }
            Ok(_) => {}
            Err(e) => crate::tlog!(
                "BUG: skipping contact {}: {}",
                crate::logging::contact_id(contact.id),
                e
            ),
        }
    }
    Ok(views)
}
