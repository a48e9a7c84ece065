//! Per-profile push channels for connected WebSocket clients.
//!
//! A profile may hold several sockets at once; they share one broadcast
//! channel. Delivery is best effort: events published while a profile has no
//! socket are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{broadcast, RwLock};

use crate::server::state::PushEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    Full { max: usize },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Full { max } => {
                write!(f, "too many WebSocket connections (max {max})")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// A live registration. Pass it back to [`ConnectionRegistry::deregister`]
/// when the socket closes.
pub struct Subscription {
    pub profile_id: i64,
    pub rx: broadcast::Receiver<PushEvent>,
}

pub struct ConnectionRegistry {
    channels: RwLock<HashMap<i64, broadcast::Sender<PushEvent>>>,
    connections: AtomicUsize,
    max_connections: usize,
    channel_capacity: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize, channel_capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            connections: AtomicUsize::new(0),
            max_connections,
            channel_capacity,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn at_capacity(&self) -> bool {
        self.connection_count() >= self.max_connections
    }

    pub async fn register(&self, profile_id: i64) -> Result<Subscription, RegistryError> {
        let previous = self.connections.fetch_add(1, Ordering::Relaxed);
        if previous >= self.max_connections {
            self.connections.fetch_sub(1, Ordering::Relaxed);
            return Err(RegistryError::Full {
                max: self.max_connections,
            });
        }

        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(profile_id)
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
        Ok(Subscription {
            profile_id,
            rx: tx.subscribe(),
        })
    }

    /// Release a registration. The profile's channel is removed once its
    /// last subscriber is gone.
    pub async fn deregister(&self, subscription: Subscription) {
        let profile_id = subscription.profile_id;
        drop(subscription.rx);
        self.connections.fetch_sub(1, Ordering::Relaxed);

        let mut channels = self.channels.write().await;
        if let Some(tx) = channels.get(&profile_id) {
            if tx.receiver_count() == 0 {
                channels.remove(&profile_id);
            }
        }
    }

    #[cfg(test)]
    async fn is_registered(&self, profile_id: i64) -> bool {
        self.channels.read().await.contains_key(&profile_id)
    }

    /// Send `event` to every socket of `profile_id`. Returns how many
    /// receivers it reached.
    pub async fn publish(&self, profile_id: i64, event: PushEvent) -> usize {
        let channels = self.channels.read().await;
        match channels.get(&profile_id) {
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn publish_all(&self, event: PushEvent) -> usize {
        let channels = self.channels.read().await;
        channels
            .values()
            .map(|tx| tx.send(event.clone()).unwrap_or(0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_publish_deregister() {
        let registry = ConnectionRegistry::new(4, 8);
        let mut sub = registry.register(7).await.unwrap();
        assert!(registry.is_registered(7).await);
        assert_eq!(registry.connection_count(), 1);

        assert_eq!(registry.publish(7, PushEvent::CatalogUpdated).await, 1);
        assert_eq!(registry.publish(8, PushEvent::CatalogUpdated).await, 0);
        assert!(matches!(sub.rx.recv().await, Ok(PushEvent::CatalogUpdated)));

        registry.deregister(sub).await;
        assert!(!registry.is_registered(7).await);
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_channel_survives_one_disconnect() {
        let registry = ConnectionRegistry::new(4, 8);
        let first = registry.register(7).await.unwrap();
        let mut second = registry.register(7).await.unwrap();
        registry.deregister(first).await;
        assert!(registry.is_registered(7).await);
        assert_eq!(registry.publish_all(PushEvent::CatalogUpdated).await, 1);
        assert!(second.rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let registry = ConnectionRegistry::new(1, 8);
        let _held = registry.register(1).await.unwrap();
        assert!(registry.at_capacity());
        assert_eq!(
            registry.register(2).await.err(),
            Some(RegistryError::Full { max: 1 })
        );
        assert_eq!(registry.connection_count(), 1);
    }
}
