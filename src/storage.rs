//! SQLite storage layer.
//!
//! Holds profiles, contacts, the status/action catalog and the per-contact
//! record of completed actions. Multi-step writes run inside a transaction
//! and uniqueness is backed by schema constraints as well as pre-checks.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::catalog::{self, Action, Status, ValidationErrors};
use crate::contact::{Contact, ContactSide, SideStatus};
use crate::profile::Profile;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StorageError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    NotFound(String),
    AlreadyExists(String),
    Invalid(ValidationErrors),
    /// A stored value could not be decoded.
    Corrupt(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Sqlite(e) => write!(f, "sqlite error: {e}"),
            StorageError::Io(e) => write!(f, "io error: {e}"),
            StorageError::NotFound(msg) => write!(f, "not found: {msg}"),
            StorageError::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
            StorageError::Invalid(e) => write!(f, "{e}"),
            StorageError::Corrupt(msg) => write!(f, "corrupt row: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Sqlite(e)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<ValidationErrors> for StorageError {
    fn from(e: ValidationErrors) -> Self {
        StorageError::Invalid(e)
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const PROFILE_COLUMNS: &str =
    "id, identificator, username, avatar_url, gender, initialized, is_admin, created_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        identificator: row.get(1)?,
        username: row.get(2)?,
        avatar_url: row.get(3)?,
        gender: row.get(4)?,
        initialized: row.get::<_, i32>(5)? != 0,
        is_admin: row.get::<_, i32>(6)? != 0,
        created_at: row.get::<_, i64>(7)? as u64,
    })
}

const CONTACT_COLUMNS: &str = "id, profile_low, low_status, low_trust, low_custom_name,
     profile_high, high_status, high_trust, high_custom_name, created_at, updated_at";

/// Raw contact row; statuses are decoded after the query so a bad value
/// surfaces as [`StorageError::Corrupt`] rather than a SQLite error.
struct ContactRow {
    id: i64,
    sides: [(i64, String, u32, Option<String>); 2],
    created_at: u64,
    updated_at: u64,
}

fn contact_row(row: &Row<'_>) -> rusqlite::Result<ContactRow> {
    Ok(ContactRow {
        id: row.get(0)?,
        sides: [
            (
                row.get(1)?,
                row.get(2)?,
                row.get::<_, i64>(3)? as u32,
                row.get(4)?,
            ),
            (
                row.get(5)?,
                row.get(6)?,
                row.get::<_, i64>(7)? as u32,
                row.get(8)?,
            ),
        ],
        created_at: row.get::<_, i64>(9)? as u64,
        updated_at: row.get::<_, i64>(10)? as u64,
    })
}

impl ContactRow {
    fn decode(self) -> Result<Contact, StorageError> {
        let id = self.id;
        let [low, high] = self.sides;
        let side = |(profile_id, status, trust_points, custom_name): (
            i64,
            String,
            u32,
            Option<String>,
        )|
         -> Result<ContactSide, StorageError> {
            let status = SideStatus::parse(&status)
                .ok_or_else(|| StorageError::Corrupt(format!("contact {id}: status {status}")))?;
            Ok(ContactSide {
                profile_id,
                status,
                trust_points,
                custom_name,
            })
        };
        Ok(Contact {
            id,
            sides: [side(low)?, side(high)?],
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn load_statuses(conn: &Connection) -> Result<Vec<Status>, StorageError> {
    let mut stmt =
        conn.prepare("SELECT id, name, min_trust FROM statuses ORDER BY min_trust ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok(Status {
            id: row.get(0)?,
            name: row.get(1)?,
            min_trust: row.get::<_, i64>(2)? as u32,
            actions: Vec::new(),
        })
    })?;
    let mut statuses = Vec::new();
    for row in rows {
        statuses.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT id, status_id, name, position FROM actions ORDER BY status_id, position, id",
    )?;
    let rows = stmt.query_map([], action_from_row)?;
    for row in rows {
        let action = row?;
        if let Some(status) = statuses.iter_mut().find(|s| s.id == action.status_id) {
            status.actions.push(action);
        }
    }
    Ok(statuses)
}

fn action_from_row(row: &Row<'_>) -> rusqlite::Result<Action> {
    Ok(Action {
        id: row.get(0)?,
        status_id: row.get(1)?,
        name: row.get(2)?,
        position: row.get::<_, i64>(3)? as u32,
    })
}

fn find_status(statuses: &[Status], status_id: i64) -> Result<&Status, StorageError> {
    statuses
        .iter()
        .find(|s| s.id == status_id)
        .ok_or_else(|| StorageError::NotFound(format!("status {status_id}")))
}

// ---------------------------------------------------------------------------
// Storage handle
// ---------------------------------------------------------------------------

/// Main storage handle wrapping a SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path. Creates schema if needed.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let storage = Self { conn };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS profiles (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                identificator   TEXT NOT NULL UNIQUE,
                username        TEXT,
                avatar_url      TEXT,
                gender          TEXT,
                initialized     INTEGER NOT NULL DEFAULT 0,
                is_admin        INTEGER NOT NULL DEFAULT 0,
                created_at      INTEGER NOT NULL
            );

            -- One row per unordered pair; sides are stored low/high by profile id.
            CREATE TABLE IF NOT EXISTS contacts (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                profile_low         INTEGER NOT NULL REFERENCES profiles(id),
                low_status          TEXT NOT NULL,
                low_trust           INTEGER NOT NULL DEFAULT 0,
                low_custom_name     TEXT,
                profile_high        INTEGER NOT NULL REFERENCES profiles(id),
                high_status         TEXT NOT NULL,
                high_trust          INTEGER NOT NULL DEFAULT 0,
                high_custom_name    TEXT,
                created_at          INTEGER NOT NULL,
                updated_at          INTEGER NOT NULL,
                CHECK (profile_low < profile_high),
                UNIQUE (profile_low, profile_high)
            );

            CREATE INDEX IF NOT EXISTS idx_contacts_high ON contacts(profile_high);

            CREATE TABLE IF NOT EXISTS statuses (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL UNIQUE,
                min_trust   INTEGER NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS actions (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                status_id   INTEGER NOT NULL REFERENCES statuses(id) ON DELETE CASCADE,
                name        TEXT NOT NULL,
                position    INTEGER NOT NULL,
                UNIQUE (status_id, name)
            );

            CREATE TABLE IF NOT EXISTS contact_actions (
                contact_id  INTEGER NOT NULL REFERENCES contacts(id),
                action_id   INTEGER NOT NULL REFERENCES actions(id) ON DELETE CASCADE,
                done_at     INTEGER NOT NULL,
                PRIMARY KEY (contact_id, action_id)
            );
            ",
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    pub fn insert_profile(
        &self,
        identificator: &str,
        username: Option<&str>,
        is_admin: bool,
    ) -> Result<Profile, StorageError> {
        let now = now_secs();
        let result = self.conn.execute(
            "INSERT INTO profiles (identificator, username, is_admin, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![identificator, username, is_admin as i32, now as i64],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StorageError::AlreadyExists(format!(
                    "profile {identificator}"
                )))
            }
            Err(e) => return Err(e.into()),
        }
        let id = self.conn.last_insert_rowid();
        self.get_profile(id)?
            .ok_or_else(|| StorageError::NotFound(format!("profile {id}")))
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<Profile>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
                params![id],
                profile_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn find_profile_by_identificator(
        &self,
        identificator: &str,
    ) -> Result<Option<Profile>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE identificator = ?1"),
                params![identificator],
                profile_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Persist the editable fields of a profile.
    pub fn update_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        let affected = self.conn.execute(
            "UPDATE profiles SET username = ?1, avatar_url = ?2, gender = ?3, initialized = ?4
             WHERE id = ?5",
            params![
                profile.username,
                profile.avatar_url,
                profile.gender,
                profile.initialized as i32,
                profile.id,
            ],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("profile {}", profile.id)));
        }
        Ok(())
    }

    pub fn count_profiles(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // -----------------------------------------------------------------------
    // Contacts
    // -----------------------------------------------------------------------

    /// Create a contact from two sides. Fails with `AlreadyExists` when the
    /// pair already has a contact in either orientation.
    pub fn insert_contact(&self, sides: &[ContactSide; 2]) -> Result<Contact, StorageError> {
        let (low, high) = if sides[0].profile_id < sides[1].profile_id {
            (&sides[0], &sides[1])
        } else {
            (&sides[1], &sides[0])
        };
        if low.profile_id == high.profile_id {
            return Err(StorageError::Invalid(ValidationErrors::single(
                "identificator",
                "cannot create a contact with yourself",
            )));
        }
        let now = now_secs();
        let result = self.conn.execute(
            "INSERT INTO contacts
             (profile_low, low_status, low_trust, low_custom_name,
              profile_high, high_status, high_trust, high_custom_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                low.profile_id,
                low.status.as_str(),
                low.trust_points as i64,
                low.custom_name,
                high.profile_id,
                high.status.as_str(),
                high.trust_points as i64,
                high.custom_name,
                now as i64,
            ],
        );
        match result {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StorageError::AlreadyExists(format!(
                    "contact between {} and {}",
                    low.profile_id, high.profile_id
                )))
            }
            Err(e) => return Err(e.into()),
        }
        let id = self.conn.last_insert_rowid();
        self.get_contact(id)?
            .ok_or_else(|| StorageError::NotFound(format!("contact {id}")))
    }

    pub fn get_contact(&self, id: i64) -> Result<Option<Contact>, StorageError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id],
                contact_row,
            )
            .optional()?;
        row.map(ContactRow::decode).transpose()
    }

    pub fn find_contact_between(&self, a: i64, b: i64) -> Result<Option<Contact>, StorageError> {
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts
                     WHERE profile_low = ?1 AND profile_high = ?2"
                ),
                params![low, high],
                contact_row,
            )
            .optional()?;
        row.map(ContactRow::decode).transpose()
    }

    /// Every contact the profile is a side of, newest first.
    pub fn list_contacts_for(&self, profile_id: i64) -> Result<Vec<Contact>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE profile_low = ?1 OR profile_high = ?1
             ORDER BY updated_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![profile_id], contact_row)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?.decode()?);
        }
        Ok(result)
    }

    /// Write one side of a contact. The other side's columns are untouched.
    pub fn update_contact_side(
        &self,
        contact_id: i64,
        side: &ContactSide,
    ) -> Result<(), StorageError> {
        let now = now_secs();
        let sql = "UPDATE contacts SET
                 low_status = CASE WHEN profile_low = ?2 THEN ?3 ELSE low_status END,
                 low_trust = CASE WHEN profile_low = ?2 THEN ?4 ELSE low_trust END,
                 low_custom_name = CASE WHEN profile_low = ?2 THEN ?5 ELSE low_custom_name END,
                 high_status = CASE WHEN profile_high = ?2 THEN ?3 ELSE high_status END,
                 high_trust = CASE WHEN profile_high = ?2 THEN ?4 ELSE high_trust END,
                 high_custom_name = CASE WHEN profile_high = ?2 THEN ?5 ELSE high_custom_name END,
                 updated_at = ?6
             WHERE id = ?1 AND (profile_low = ?2 OR profile_high = ?2)";
        let affected = self.conn.execute(
            sql,
            params![
                contact_id,
                side.profile_id,
                side.status.as_str(),
                side.trust_points as i64,
                side.custom_name,
                now as i64,
            ],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!(
                "contact {contact_id} side {}",
                side.profile_id
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Per-contact completed actions
    // -----------------------------------------------------------------------

    pub fn set_action_done(&self, contact_id: i64, action_id: i64) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO contact_actions (contact_id, action_id, done_at)
             VALUES (?1, ?2, ?3)",
            params![contact_id, action_id, now_secs() as i64],
        )?;
        Ok(affected > 0)
    }

    pub fn clear_action_done(
        &self,
        contact_id: i64,
        action_id: i64,
    ) -> Result<bool, StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM contact_actions WHERE contact_id = ?1 AND action_id = ?2",
            params![contact_id, action_id],
        )?;
        Ok(affected > 0)
    }

    pub fn list_done_actions(&self, contact_id: i64) -> Result<Vec<i64>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT action_id FROM contact_actions WHERE contact_id = ?1 ORDER BY action_id",
        )?;
        let rows = stmt.query_map(params![contact_id], |row| row.get::<_, i64>(0))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Status catalog
    // -----------------------------------------------------------------------

    /// All statuses ascending by `min_trust`, each with its ordered actions.
    pub fn list_statuses(&self) -> Result<Vec<Status>, StorageError> {
        load_statuses(&self.conn)
    }

    pub fn get_status(&self, id: i64) -> Result<Option<Status>, StorageError> {
        Ok(self.list_statuses()?.into_iter().find(|s| s.id == id))
    }

    pub fn create_status(&self, raw_name: &str, min_trust: u32) -> Result<Status, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let existing = load_statuses(&tx)?;
        let name = catalog::validate_status(&existing, raw_name, min_trust, None)?;
        tx.execute(
            "INSERT INTO statuses (name, min_trust) VALUES (?1, ?2)",
            params![name, min_trust as i64],
        )
        .map_err(|e| catalog_conflict(e, "status"))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Status {
            id,
            name,
            min_trust,
            actions: Vec::new(),
        })
    }

    pub fn update_status(
        &self,
        id: i64,
        raw_name: &str,
        min_trust: u32,
    ) -> Result<Status, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let existing = load_statuses(&tx)?;
        let current = find_status(&existing, id)?.clone();
        let name = catalog::validate_status(&existing, raw_name, min_trust, Some(id))?;
        tx.execute(
            "UPDATE statuses SET name = ?1, min_trust = ?2 WHERE id = ?3",
            params![name, min_trust as i64, id],
        )
        .map_err(|e| catalog_conflict(e, "status"))?;
        tx.commit()?;
        Ok(Status {
            name,
            min_trust,
            ..current
        })
    }

    /// Delete a status with its actions and their completion records.
    pub fn delete_status(&self, id: i64) -> Result<(), StorageError> {
        let affected = self
            .conn
            .execute("DELETE FROM statuses WHERE id = ?1", params![id])?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("status {id}")));
        }
        Ok(())
    }

    pub fn create_action(&self, status_id: i64, raw_name: &str) -> Result<Action, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let statuses = load_statuses(&tx)?;
        let status = find_status(&statuses, status_id)?;
        let name = catalog::validate_action(&status.actions, raw_name, None)?;
        let position = status
            .actions
            .iter()
            .map(|a| a.position + 1)
            .max()
            .unwrap_or(0);
        tx.execute(
            "INSERT INTO actions (status_id, name, position) VALUES (?1, ?2, ?3)",
            params![status_id, name, position as i64],
        )
        .map_err(|e| catalog_conflict(e, "action"))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(Action {
            id,
            status_id,
            name,
            position,
        })
    }

    pub fn update_action(
        &self,
        status_id: i64,
        action_id: i64,
        raw_name: &str,
    ) -> Result<Action, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let statuses = load_statuses(&tx)?;
        let status = find_status(&statuses, status_id)?;
        let current = status
            .actions
            .iter()
            .find(|a| a.id == action_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("action {action_id}")))?;
        let name = catalog::validate_action(&status.actions, raw_name, Some(action_id))?;
        tx.execute(
            "UPDATE actions SET name = ?1 WHERE id = ?2 AND status_id = ?3",
            params![name, action_id, status_id],
        )
        .map_err(|e| catalog_conflict(e, "action"))?;
        tx.commit()?;
        Ok(Action { name, ..current })
    }

    pub fn delete_action(&self, status_id: i64, action_id: i64) -> Result<(), StorageError> {
        let affected = self.conn.execute(
            "DELETE FROM actions WHERE id = ?1 AND status_id = ?2",
            params![action_id, status_id],
        )?;
        if affected == 0 {
            return Err(StorageError::NotFound(format!("action {action_id}")));
        }
        Ok(())
    }
}

/// Map a constraint violation that slipped past the pre-check to the same
/// validation error the pre-check would have produced.
fn catalog_conflict(e: rusqlite::Error, what: &str) -> StorageError {
    if !is_constraint_violation(&e) {
        return StorageError::Sqlite(e);
    }
    let on_threshold = matches!(
        &e,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("statuses.min_trust")
    );
    if on_threshold {
        StorageError::Invalid(ValidationErrors::single(
            "minTrust",
            format!("another {what} already uses this threshold"),
        ))
    } else {
        StorageError::Invalid(ValidationErrors::single(
            "name",
            format!("{what} conflicts with an existing entry"),
        ))
    }
}

/// Resolve the database path: `{data_dir}/trust-o-meter.db`.
pub fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("trust-o-meter.db")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
