//! Notification hub
//!
//! A single task owns the registry of live connections. Handles and pumps
//! talk to it over a command queue, so the registry needs no lock and every
//! registration change is serialized.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::content::{Notification, UserNotification};
use crate::store::{ContentStore, StoreError};

use super::LiveConfig;

/// Commands waiting in the hub queue.
const COMMAND_QUEUE: usize = 64;

// ============================================================================
// Registration
// ============================================================================

/// Hub-side handle for one live connection.
pub struct LiveUser {
    pub id: String,
    notif_tx: mpsc::Sender<Notification>,
    ack_tx: mpsc::Sender<bool>,
}

impl LiveUser {
    /// Build the sending half the hub keeps and the receiving halves the
    /// drain pump consumes.
    pub fn new(
        id: impl Into<String>,
        config: &LiveConfig,
    ) -> (Self, mpsc::Receiver<Notification>, mpsc::Receiver<bool>) {
        let (notif_tx, notif_rx) = mpsc::channel(config.notif_queue_capacity);
        // One slot: a pending ack already answers every queued mark-read.
        let (ack_tx, ack_rx) = mpsc::channel(1);
        let user = Self {
            id: id.into(),
            notif_tx,
            ack_tx,
        };
        (user, notif_rx, ack_rx)
    }
}

/// Registry entry. The connection id tells a stale unregister from a live
/// one when pumps race a replacement connection.
struct RegisteredUser {
    conn_id: u64,
    notif_tx: mpsc::Sender<Notification>,
    ack_tx: mpsc::Sender<bool>,
}

enum HubCommand {
    Register { conn_id: u64, user: LiveUser },
    Unregister { user_id: String, conn_id: u64 },
    MarkAllRead { user_id: String },
    Broadcast { user_id: String, notification: Notification },
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle to the hub task. The task stops once every handle is
/// dropped and the command queue drains.
#[derive(Clone)]
pub struct Hub {
    cmd_tx: mpsc::Sender<HubCommand>,
    conn_seq: Arc<AtomicU64>,
}

impl Hub {
    /// Start the hub task against `store` and return a handle to it.
    pub fn spawn<S: ContentStore + 'static>(store: Arc<S>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        tokio::spawn(run_hub(store, cmd_rx));
        Self {
            cmd_tx,
            conn_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register a connection and return its connection id. A later
    /// registration for the same user replaces the earlier one, closing its
    /// queues.
    pub async fn register(&self, user: LiveUser) -> u64 {
        let conn_id = self.conn_seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.cmd_tx.send(HubCommand::Register { conn_id, user }).await;
        conn_id
    }

    /// Drop the registration for `user_id`, but only while it still belongs
    /// to `conn_id`. Safe to call from both pumps, any number of times.
    pub async fn unregister(&self, user_id: &str, conn_id: u64) {
        let command = HubCommand::Unregister {
            user_id: user_id.to_string(),
            conn_id,
        };
        let _ = self.cmd_tx.send(command).await;
    }

    /// Ask the backend to mark everything read for `user_id`. The outcome
    /// arrives on the connection's ack queue, not here.
    pub async fn mark_all_read(&self, user_id: &str) {
        let command = HubCommand::MarkAllRead {
            user_id: user_id.to_string(),
        };
        let _ = self.cmd_tx.send(command).await;
    }

    /// Queue `notification` for `user_id` if they are connected right now.
    /// Nobody connected is not an error; the notification stays in their
    /// backlog for the next visit.
    pub async fn broadcast(&self, user_id: &str, notification: Notification) {
        let command = HubCommand::Broadcast {
            user_id: user_id.to_string(),
            notification,
        };
        let _ = self.cmd_tx.send(command).await;
    }

    /// Route a backend delivery stream into the hub until it ends or fails.
    pub async fn relay<St>(&self, mut stream: St)
    where
        St: Stream<Item = Result<UserNotification, StoreError>> + Unpin,
    {
        loop {
            match stream.next().await {
                Some(Ok(delivery)) => {
                    self.broadcast(&delivery.user_id, delivery.notification).await;
                }
                Some(Err(err)) => {
                    warn!(error = %err, "notification stream failed");
                    break;
                }
                None => break,
            }
        }
    }
}

// ============================================================================
// Hub task
// ============================================================================

async fn run_hub<S: ContentStore + 'static>(store: Arc<S>, mut cmd_rx: mpsc::Receiver<HubCommand>) {
    let mut registry: HashMap<String, RegisteredUser> = HashMap::new();
    let mut tasks: JoinSet<()> = JoinSet::new();
    info!("notification hub started");

    loop {
        tokio::select! {
            command = cmd_rx.recv() => {
                let Some(command) = command else { break };
                apply(&store, &mut registry, &mut tasks, command);
            }
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(err) = result {
                    warn!(error = %err, "mark-read task panicked");
                }
            }
        }
    }

    // Every handle is gone. Let in-flight mark-read calls finish, then drop
    // the registry so each drain pump sees its queue close and says goodbye.
    while let Some(result) = tasks.join_next().await {
        if let Err(err) = result {
            warn!(error = %err, "mark-read task panicked");
        }
    }
    info!(connections = registry.len(), "notification hub stopped");
}

fn apply<S: ContentStore + 'static>(
    store: &Arc<S>,
    registry: &mut HashMap<String, RegisteredUser>,
    tasks: &mut JoinSet<()>,
    command: HubCommand,
) {
    match command {
        HubCommand::Register { conn_id, user } => {
            let LiveUser { id, notif_tx, ack_tx } = user;
            if registry.remove(&id).is_some() {
                debug!(user_id = %id, "replacing live registration");
            }
            registry.insert(
                id,
                RegisteredUser {
                    conn_id,
                    notif_tx,
                    ack_tx,
                },
            );
        }
        HubCommand::Unregister { user_id, conn_id } => {
            let current = registry
                .get(&user_id)
                .is_some_and(|entry| entry.conn_id == conn_id);
            if current {
                registry.remove(&user_id);
                debug!(user_id = %user_id, conn_id, "connection unregistered");
            }
        }
        HubCommand::MarkAllRead { user_id } => {
            let Some(entry) = registry.get(&user_id) else {
                return;
            };
            let ack_tx = entry.ack_tx.clone();
            let store = Arc::clone(store);
            tasks.spawn(async move {
                let ok = match store.mark_all_read(&user_id).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(user_id = %user_id, error = %err, "mark all read failed");
                        false
                    }
                };
                // A full slot already carries an answer for this connection.
                let _ = ack_tx.try_send(ok);
            });
        }
        HubCommand::Broadcast {
            user_id,
            notification,
        } => deliver(registry, &user_id, notification),
    }
}

/// Hand `notification` to the user's drain pump without blocking the hub.
/// A connection that cannot take it is dead weight and gets dropped.
fn deliver(
    registry: &mut HashMap<String, RegisteredUser>,
    user_id: &str,
    notification: Notification,
) {
    let Some(entry) = registry.get(user_id) else {
        return;
    };
    if let Err(err) = entry.notif_tx.try_send(notification) {
        let reason = match err {
            mpsc::error::TrySendError::Full(_) => "outbound queue full",
            mpsc::error::TrySendError::Closed(_) => "outbound queue closed",
        };
        debug!(user_id = %user_id, reason, "dropping live connection");
        registry.remove(user_id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use chrono::Utc;
    use futures::stream;

    use super::*;
    use crate::store::{ContentStream, RecycleRequest};

    struct NullStore {
        fail_mark_read: bool,
        mark_read_calls: AtomicUsize,
    }

    impl NullStore {
        fn new() -> Self {
            Self {
                fail_mark_read: false,
                mark_read_calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail_mark_read: true,
                mark_read_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ContentStore for NullStore {
        async fn recycle(
            &self,
            _request: RecycleRequest,
        ) -> Result<ContentStream, StoreError> {
            Ok(stream::empty().boxed())
        }

        async fn mark_all_read(&self, _user_id: &str) -> Result<(), StoreError> {
            self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_mark_read {
                Err(StoreError::Transport("backend gone".into()))
            } else {
                Ok(())
            }
        }
    }

    fn notification(id: &str) -> Notification {
        Notification {
            id: id.to_string(),
            subject: "reply".to_string(),
            message: "someone replied to your thread".to_string(),
            permalink: format!("/t/{id}"),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_registered_user() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        let (user, mut notif_rx, _ack_rx) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(user).await;

        hub.broadcast("alice", notification("n1")).await;

        let received = notif_rx.recv().await.expect("notification delivered");
        assert_eq!(received.id, "n1");
    }

    #[tokio::test]
    async fn test_broadcast_to_offline_user_is_silent() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        hub.broadcast("nobody", notification("n1")).await;

        // The hub keeps serving after the no-op.
        let (user, mut notif_rx, _ack_rx) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(user).await;
        hub.broadcast("alice", notification("n2")).await;
        assert_eq!(notif_rx.recv().await.expect("delivered").id, "n2");
    }

    #[tokio::test]
    async fn test_new_registration_replaces_old() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        let (first, mut first_rx, _first_ack) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(first).await;

        let (second, mut second_rx, _second_ack) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(second).await;

        hub.broadcast("alice", notification("n1")).await;
        assert_eq!(second_rx.recv().await.expect("delivered").id, "n1");
        // The replaced entry dropped its sender, so the old queue closed.
        assert!(first_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_stale_unregister_keeps_current_connection() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        let (first, _first_rx, _first_ack) = LiveUser::new("alice", &LiveConfig::default());
        let stale_id = hub.register(first).await;
        let (second, mut second_rx, _second_ack) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(second).await;

        // The replaced connection's pumps fire this as they wind down.
        hub.unregister("alice", stale_id).await;

        hub.broadcast("alice", notification("n1")).await;
        assert_eq!(second_rx.recv().await.expect("still registered").id, "n1");
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        let (user, _notif_rx, _ack_rx) = LiveUser::new("alice", &LiveConfig::default());
        let conn_id = hub.register(user).await;

        hub.unregister("alice", conn_id).await;
        hub.unregister("alice", conn_id).await;

        let (again, mut notif_rx, _ack) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(again).await;
        hub.broadcast("alice", notification("n1")).await;
        assert_eq!(notif_rx.recv().await.expect("delivered").id, "n1");
    }

    #[tokio::test]
    async fn test_mark_all_read_acks_outcome() {
        let store = Arc::new(NullStore::new());
        let hub = Hub::spawn(Arc::clone(&store));
        let (user, _notif_rx, mut ack_rx) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(user).await;

        hub.mark_all_read("alice").await;

        assert_eq!(ack_rx.recv().await, Some(true));
        assert_eq!(store.mark_read_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mark_all_read_failure_acks_false() {
        let hub = Hub::spawn(Arc::new(NullStore::failing()));
        let (user, _notif_rx, mut ack_rx) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(user).await;

        hub.mark_all_read("alice").await;

        assert_eq!(ack_rx.recv().await, Some(false));
    }

    #[tokio::test]
    async fn test_mark_all_read_for_offline_user_is_skipped() {
        let store = Arc::new(NullStore::new());
        let hub = Hub::spawn(Arc::clone(&store));

        hub.mark_all_read("nobody").await;

        // Flush the command queue with a registered round trip.
        let (user, _notif_rx, mut ack_rx) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(user).await;
        hub.mark_all_read("alice").await;
        assert_eq!(ack_rx.recv().await, Some(true));
        assert_eq!(store.mark_read_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backpressured_connection_is_dropped() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        let config = LiveConfig {
            notif_queue_capacity: 1,
            ..LiveConfig::default()
        };
        let (user, mut notif_rx, _ack_rx) = LiveUser::new("alice", &config);
        hub.register(user).await;

        hub.broadcast("alice", notification("n1")).await;
        hub.broadcast("alice", notification("n2")).await;

        assert_eq!(notif_rx.recv().await.expect("first queued").id, "n1");
        // The overflow dropped the registration, so the queue closes right
        // after the buffered item.
        assert!(notif_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_relay_routes_by_user() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        let (alice, mut alice_rx, _ack) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(alice).await;

        let deliveries = stream::iter(vec![
            Ok(UserNotification {
                user_id: "alice".to_string(),
                notification: notification("n1"),
            }),
            Ok(UserNotification {
                user_id: "bob".to_string(),
                notification: notification("n2"),
            }),
            Ok(UserNotification {
                user_id: "alice".to_string(),
                notification: notification("n3"),
            }),
        ]);
        hub.relay(deliveries).await;

        assert_eq!(alice_rx.recv().await.expect("first").id, "n1");
        assert_eq!(alice_rx.recv().await.expect("second").id, "n3");
    }

    #[tokio::test]
    async fn test_relay_stops_on_stream_error() {
        let hub = Hub::spawn(Arc::new(NullStore::new()));
        let (alice, mut alice_rx, _ack) = LiveUser::new("alice", &LiveConfig::default());
        hub.register(alice).await;

        let deliveries = stream::iter(vec![
            Ok(UserNotification {
                user_id: "alice".to_string(),
                notification: notification("n1"),
            }),
            Err(StoreError::Transport("stream reset".into())),
            Ok(UserNotification {
                user_id: "alice".to_string(),
                notification: notification("n2"),
            }),
        ]);
        hub.relay(deliveries).await;

        assert_eq!(alice_rx.recv().await.expect("delivered").id, "n1");
        assert!(notif_queue_is_empty(&mut alice_rx));
    }

    fn notif_queue_is_empty(rx: &mut mpsc::Receiver<Notification>) -> bool {
        matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Empty))
    }
}
