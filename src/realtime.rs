use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Sse,
    Ws,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Sse => "sse",
            Transport::Ws => "ws",
        }
    }
}

/// One broadcast event, serialized once and shared across all connections.
#[derive(Debug)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

#[derive(Debug, Clone)]
pub enum HubMessage {
    Frame(Arc<Frame>),
    Close { reason: String },
}

struct Connection {
    transport: Transport,
    #[allow(dead_code)]
    connected_at: DateTime<Utc>,
    tx: UnboundedSender<HubMessage>,
}

/// Owns every live SSE/WebSocket connection. State is in-memory only and
/// rebuilt from zero on restart; clients reconnect and refetch a snapshot
/// over plain request/response.
#[derive(Default)]
pub struct RealtimeHub {
    connections: DashMap<Uuid, Connection>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and hands back its id plus the receiving end
    /// the transport task drains.
    pub fn register(&self, transport: Transport) -> (Uuid, UnboundedReceiver<HubMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(
            id,
            Connection {
                transport,
                connected_at: Utc::now(),
                tx,
            },
        );
        debug!(connection_id = %id, transport = transport.as_str(), "realtime client registered");
        (id, rx)
    }

    pub fn unregister(&self, id: Uuid) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// (sse, ws) connection counts, for the status endpoint.
    pub fn counts_by_transport(&self) -> (usize, usize) {
        let mut sse = 0;
        let mut ws = 0;
        for entry in self.connections.iter() {
            match entry.value().transport {
                Transport::Sse => sse += 1,
                Transport::Ws => ws += 1,
            }
        }
        (sse, ws)
    }

    /// Serializes the payload once and delivers it to every connection.
    /// A failed send means the transport task is gone; that connection is
    /// evicted without affecting delivery to the rest. Returns the number of
    /// connections the frame was handed to. No connections is a no-op.
    pub fn broadcast(&self, event: &str, payload: &Value) -> usize {
        if self.connections.is_empty() {
            return 0;
        }
        let frame = Arc::new(Frame {
            event: event.to_string(),
            data: payload.to_string(),
        });

        let mut delivered = 0;
        let mut dead: Vec<Uuid> = Vec::new();
        for entry in self.connections.iter() {
            if entry
                .value()
                .tx
                .send(HubMessage::Frame(frame.clone()))
                .is_ok()
            {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }
        // Removal happens after iteration; removing a key while holding the
        // shard iterator would deadlock.
        for id in dead {
            if self.connections.remove(&id).is_some() {
                debug!(connection_id = %id, "evicted dead realtime connection");
            }
        }
        delivered
    }

    /// Drains the registry, handing every connection a close message with the
    /// given reason. Returns how many connections were notified.
    pub fn close_all(&self, reason: &str) -> usize {
        let ids: Vec<Uuid> = self.connections.iter().map(|e| *e.key()).collect();
        let mut notified = 0;
        for id in ids {
            if let Some((_, conn)) = self.connections.remove(&id) {
                if conn
                    .tx
                    .send(HubMessage::Close {
                        reason: reason.to_string(),
                    })
                    .is_ok()
                {
                    notified += 1;
                }
            }
        }
        notified
    }
}

/// Periodic heartbeat so intermediary proxies keep idle connections open and
/// clients can detect a silently-dead transport.
pub fn spawn_heartbeat(hub: Arc<RealtimeHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so heartbeats start
        // one full interval after boot.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            hub.broadcast("heartbeat", &json!({ "timestamp": Utc::now().to_rfc3339() }));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_with_no_connections_is_a_noop() {
        let hub = RealtimeHub::new();
        assert_eq!(hub.broadcast("heartbeat", &json!({})), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_connection() {
        let hub = RealtimeHub::new();
        let (_id1, mut rx1) = hub.register(Transport::Sse);
        let (_id2, mut rx2) = hub.register(Transport::Ws);

        let delivered = hub.broadcast("order_updated", &json!({"orderId": 7}));
        assert_eq!(delivered, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                HubMessage::Frame(frame) => {
                    assert_eq!(frame.event, "order_updated");
                    assert_eq!(frame.data, json!({"orderId": 7}).to_string());
                }
                other => panic!("expected frame, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn dead_connection_is_evicted_without_blocking_others() {
        let hub = RealtimeHub::new();
        let (dead_id, rx_dead) = hub.register(Transport::Sse);
        let (_live_id, mut rx_live) = hub.register(Transport::Sse);
        drop(rx_dead);

        let delivered = hub.broadcast("stock_level", &json!({"sku": "WID-1"}));
        assert_eq!(delivered, 1);
        assert!(!hub.contains(dead_id));
        assert_eq!(hub.connection_count(), 1);
        assert!(matches!(
            rx_live.recv().await.unwrap(),
            HubMessage::Frame(_)
        ));
    }

    #[tokio::test]
    async fn unregistered_connection_no_longer_receives() {
        let hub = RealtimeHub::new();
        let (id, mut rx) = hub.register(Transport::Sse);
        assert!(hub.unregister(id));
        assert_eq!(hub.broadcast("tick", &json!({})), 0);
        // Sender side is dropped with the registry entry.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn close_all_notifies_and_empties_the_registry() {
        let hub = RealtimeHub::new();
        let mut receivers = Vec::new();
        for _ in 0..3 {
            receivers.push(hub.register(Transport::Sse).1);
        }
        for _ in 0..2 {
            receivers.push(hub.register(Transport::Ws).1);
        }

        assert_eq!(hub.close_all("server_shutting_down"), 5);
        assert_eq!(hub.connection_count(), 0);
        for rx in receivers.iter_mut() {
            match rx.recv().await.unwrap() {
                HubMessage::Close { reason } => assert_eq!(reason, "server_shutting_down"),
                other => panic!("expected close, got {:?}", other),
            }
        }
    }

    #[test]
    fn counts_by_transport_splits_correctly() {
        let hub = RealtimeHub::new();
        let _a = hub.register(Transport::Sse);
        let _b = hub.register(Transport::Sse);
        let _c = hub.register(Transport::Ws);
        assert_eq!(hub.counts_by_transport(), (2, 1));
    }
}
