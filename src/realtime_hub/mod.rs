//! RealtimeHub - WebSocket Connection Registry and Broadcast
//!
//! ## Responsibilities
//!
//! - WebSocket connection management (register on connect, remove on
//!   disconnect)
//! - Per-connection stream subscriptions (`setEnableStreams`)
//! - Category-filtered event broadcasting
//!
//! Broadcast is fire-and-forget per recipient: a closed or erroring
//! connection is skipped and never blocks delivery to the rest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::data_store::{LogEntry, StreamCategory};
use crate::protocol::StreamFlags;

/// Per-connection subscription flags. All false on connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Subscription {
    pub config_changes: bool,
    pub info_changes: bool,
    pub traces: bool,
}

impl Subscription {
    pub const fn covers(&self, category: StreamCategory) -> bool {
        match category {
            StreamCategory::ConfigChanges => self.config_changes,
            StreamCategory::InfoChanges => self.info_changes,
            StreamCategory::Traces => self.traces,
        }
    }
}

impl From<&StreamFlags> for Subscription {
    fn from(flags: &StreamFlags) -> Self {
        Self {
            config_changes: flags.config_changes,
            info_changes: flags.info_changes,
            traces: flags.traces,
        }
    }
}

/// Client connection
struct ClientConnection {
    id: Uuid,
    subscription: Subscription,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new client with a zero-valued subscription.
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let conn = ClientConnection {
            id,
            subscription: Subscription::default(),
            tx,
        };

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, "Client connected");

        (id, rx)
    }

    /// Unregister a client
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Client disconnected");
        }
    }

    /// Replace a connection's subscription flags.
    pub async fn set_subscription(&self, id: &Uuid, subscription: Subscription) {
        let mut connections = self.connections.write().await;
        if let Some(conn) = connections.get_mut(id) {
            conn.subscription = subscription;
            tracing::debug!(connection_id = %id, ?subscription, "Subscription updated");
        }
    }

    /// Current subscription of a connection, if still registered.
    pub async fn subscription(&self, id: &Uuid) -> Option<Subscription> {
        self.connections.read().await.get(id).map(|c| c.subscription)
    }

    /// Queue a frame for one specific connection.
    pub async fn push(&self, id: &Uuid, frame: String) {
        let connections = self.connections.read().await;
        if let Some(conn) = connections.get(id) {
            if let Err(e) = conn.tx.send(frame) {
                tracing::warn!(connection_id = %id, error = %e, "Failed to queue frame");
            }
        }
    }

    /// Broadcast a logged event to every connection whose subscription
    /// covers its category.
    pub async fn broadcast_entry(&self, entry: &LogEntry) {
        let category = entry.event.category();
        let frame = match serde_json::to_value(entry) {
            Ok(body) => json!({ category.wire_key(): body }).to_string(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize log entry");
                return;
            }
        };

        let connections = self.connections.read().await;
        for conn in connections.values() {
            if !conn.subscription.covers(category) {
                continue;
            }
            if let Err(e) = conn.tx.send(frame.clone()) {
                tracing::warn!(connection_id = %conn.id, error = %e, "Failed to send broadcast");
            }
        }
    }

    /// Get connection count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_store::{BarrierAction, LogEvent};

    fn barrier_entry() -> LogEntry {
        LogEntry {
            date_ms: 1,
            event: LogEvent::Barrier {
                action: BarrierAction::Open,
            },
        }
    }

    fn config_entry() -> LogEntry {
        LogEntry {
            date_ms: 2,
            event: LogEvent::Config {
                path: "cameras.camera.anpr.plateReliability".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_register_starts_unsubscribed() {
        let hub = RealtimeHub::new();
        let (id, mut rx) = hub.register().await;
        assert_eq!(hub.connection_count(), 1);
        assert_eq!(hub.subscription(&id).await, Some(Subscription::default()));

        hub.broadcast_entry(&barrier_entry()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_filters_by_category() {
        let hub = RealtimeHub::new();
        let (info_id, mut info_rx) = hub.register().await;
        let (config_id, mut config_rx) = hub.register().await;

        hub.set_subscription(
            &info_id,
            Subscription {
                info_changes: true,
                ..Default::default()
            },
        )
        .await;
        hub.set_subscription(
            &config_id,
            Subscription {
                config_changes: true,
                ..Default::default()
            },
        )
        .await;

        hub.broadcast_entry(&barrier_entry()).await;
        hub.broadcast_entry(&config_entry()).await;

        let info_frame = info_rx.try_recv().unwrap();
        assert!(info_frame.starts_with(r#"{"infoChanged""#));
        assert!(info_rx.try_recv().is_err());

        let config_frame = config_rx.try_recv().unwrap();
        assert!(config_frame.starts_with(r#"{"configChanged""#));
        assert!(config_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_receiver_does_not_block_others() {
        let hub = RealtimeHub::new();
        let sub = Subscription {
            info_changes: true,
            ..Default::default()
        };

        let (dead_id, dead_rx) = hub.register().await;
        let (live_id, mut live_rx) = hub.register().await;
        hub.set_subscription(&dead_id, sub).await;
        hub.set_subscription(&live_id, sub).await;
        drop(dead_rx);

        hub.broadcast_entry(&barrier_entry()).await;
        assert!(live_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unregister_removes_connection() {
        let hub = RealtimeHub::new();
        let (id, _rx) = hub.register().await;
        hub.unregister(&id).await;
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.subscription(&id).await, None);
        // double unregister is harmless
        hub.unregister(&id).await;
        assert_eq!(hub.connection_count(), 0);
    }
}
