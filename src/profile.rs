//! Profiles: a user's public identity in the contact graph.

use serde::{Deserialize, Serialize};

use crate::catalog::ValidationErrors;

pub const IDENTIFICATOR_MIN_LEN: usize = 3;
pub const IDENTIFICATOR_MAX_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: i64,
    pub identificator: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<String>,
    pub initialized: bool,
    pub is_admin: bool,
    pub created_at: u64,
}

/// What any authenticated profile may see about another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub identificator: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<String>,
}

/// The owner's view, including onboarding and role flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnProfile {
    pub id: i64,
    pub identificator: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<String>,
    pub initialized: bool,
    pub is_admin: bool,
}

impl Profile {
    pub fn public_view(&self) -> PublicProfile {
        PublicProfile {
            identificator: self.identificator.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            gender: self.gender.clone(),
        }
    }

    pub fn own_view(&self) -> OwnProfile {
        OwnProfile {
            id: self.id,
            identificator: self.identificator.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
            gender: self.gender.clone(),
            initialized: self.initialized,
            is_admin: self.is_admin,
        }
    }
}

/// Partial update of the editable profile fields. `None` leaves a field as is;
/// an empty string clears an optional text field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub gender: Option<String>,
    pub initialized: Option<bool>,
}

fn merge_text(current: &mut Option<String>, update: &Option<String>) {
    if let Some(value) = update {
        let trimmed = value.trim();
        *current = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
    }
}

impl ProfileUpdate {
    pub fn apply(&self, profile: &mut Profile) {
        merge_text(&mut profile.username, &self.username);
        merge_text(&mut profile.avatar_url, &self.avatar_url);
        merge_text(&mut profile.gender, &self.gender);
        if let Some(initialized) = self.initialized {
            profile.initialized = initialized;
        }
    }
}

/// Trim and check a public handle.
pub fn validate_identificator(raw: &str) -> Result<String, ValidationErrors> {
    let ident = raw.trim();
    let len = ident.chars().count();
    if len < IDENTIFICATOR_MIN_LEN || len > IDENTIFICATOR_MAX_LEN {
        return Err(ValidationErrors::single(
            "identificator",
            format!(
                "identificator must be {IDENTIFICATOR_MIN_LEN}-{IDENTIFICATOR_MAX_LEN} characters"
            ),
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    if !ident.chars().all(allowed) {
        return Err(ValidationErrors::single(
            "identificator",
            "identificator may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(ident.to_string())
}
