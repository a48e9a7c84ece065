//! Admin-managed status tiers and the actions they unlock.
//!
//! Status names and `min_trust` thresholds are unique across the catalog;
//! action names are unique within their status only.

use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub id: i64,
    pub status_id: i64,
    pub name: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub id: i64,
    pub name: String,
    pub min_trust: u32,
    pub actions: Vec<Action>,
}

/// A single user-correctable problem with a submitted field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Per-field validation failures, reported together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "validation failed ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Trim `raw` and check it is a usable catalog name.
pub fn normalize_name(raw: &str, errors: &mut ValidationErrors) -> String {
    let name = raw.trim().to_string();
    if name.is_empty() {
        errors.push("name", "name is required");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.push(
            "name",
            format!("name must be at most {MAX_NAME_LEN} characters"),
        );
    }
    name
}

/// Check a status candidate against the existing catalog.
///
/// `exclude_id` is the status being updated, if any.
pub fn check_status_unique(
    existing: &[Status],
    name: &str,
    min_trust: u32,
    exclude_id: Option<i64>,
    errors: &mut ValidationErrors,
) {
    let others = existing.iter().filter(|s| Some(s.id) != exclude_id);
    for other in others {
        if other.name == name && !errors.has_field("name") {
            errors.push("name", "a status with this name already exists");
        }
        if other.min_trust == min_trust && !errors.has_field("minTrust") {
            errors.push("minTrust", "a status with this minTrust already exists");
        }
    }
}

/// Check an action candidate against the other actions of its status.
pub fn check_action_unique(
    siblings: &[Action],
    name: &str,
    exclude_id: Option<i64>,
    errors: &mut ValidationErrors,
) {
    let clash = siblings
        .iter()
        .any(|a| Some(a.id) != exclude_id && a.name == name);
    if clash {
        errors.push("name", "an action with this name already exists in this status");
    }
}

/// Validate a status create/update request in full.
pub fn validate_status(
    existing: &[Status],
    raw_name: &str,
    min_trust: u32,
    exclude_id: Option<i64>,
) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = normalize_name(raw_name, &mut errors);
    check_status_unique(existing, &name, min_trust, exclude_id, &mut errors);
    errors.into_result().map(|_| name)
}

/// Validate an action create/update request in full.
pub fn validate_action(
    siblings: &[Action],
    raw_name: &str,
    exclude_id: Option<i64>,
) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = normalize_name(raw_name, &mut errors);
    if errors.is_empty() {
        check_action_unique(siblings, &name, exclude_id, &mut errors);
    }
    errors.into_result().map(|_| name)
}
