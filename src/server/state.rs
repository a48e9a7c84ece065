//! Shared application state and push event types.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::TokenSigner;
use crate::server::config::{MAX_WS_CONNECTIONS, WS_CHANNEL_CAPACITY};
use crate::server::registry::ConnectionRegistry;
use crate::server::views::ContactView;
use crate::storage::Storage;

/// Events pushed to connected WebSocket clients.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    ContactUpdated { contact: ContactView },
    CatalogUpdated,
    /// The socket fell behind and `count` events were dropped; the client
    /// should refetch.
    EventsMissed { count: u64 },
}

pub struct AppState {
    pub storage: Storage,
    pub signer: TokenSigner,
    /// Identificators granted admin when they register.
    pub admins: Vec<String>,
    pub registry: Arc<ConnectionRegistry>,
}

pub type SharedState = Arc<Mutex<AppState>>;

impl AppState {
    pub fn new(storage: Storage, signer: TokenSigner, admins: Vec<String>) -> Self {
        Self {
            storage,
            signer,
            admins,
            registry: Arc::new(ConnectionRegistry::new(
                MAX_WS_CONNECTIONS,
                WS_CHANNEL_CAPACITY,
            )),
        }
    }

    pub fn is_admin_identificator(&self, identificator: &str) -> bool {
        self.admins.iter().any(|a| a == identificator)
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }
}
