//! Connection pumps
//!
//! Each live connection runs two tasks. The drain pump owns the write half:
//! hub queues in, JSON frames out, keepalive pings on a timer. The read pump
//! owns the read half and turns every short inbound frame into a mark-read
//! request. Either pump exiting unregisters the connection; a registration
//! dropped by the hub closes the notification queue, which the drain pump
//! answers with a close frame.

use std::collections::HashMap;
use std::fmt::Display;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::content::Notification;

use super::{Hub, LiveConfig};

/// Frames the server writes, tagged with `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// One notification, fields inline.
    Notif {
        #[serde(flatten)]
        notification: Notification,
    },
    /// Outcome of a mark-all-read request.
    Ack { ok: bool },
}

/// Split an accepted socket and run both pumps on their own tasks.
///
/// The receivers must come from the [`LiveUser`](super::LiveUser) registered
/// under `user_id`, and `conn_id` from that registration.
pub fn attach<T>(
    hub: Hub,
    user_id: String,
    conn_id: u64,
    ws: WebSocketStream<T>,
    notif_rx: mpsc::Receiver<Notification>,
    ack_rx: mpsc::Receiver<bool>,
    config: LiveConfig,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = ws.split();
    tokio::spawn(drain_pump(
        hub.clone(),
        user_id.clone(),
        conn_id,
        notif_rx,
        ack_rx,
        sink,
        config.clone(),
    ));
    tokio::spawn(read_pump(hub, user_id, conn_id, stream, config));
}

// ============================================================================
// Drain pump (write half)
// ============================================================================

async fn drain_pump<Si>(
    hub: Hub,
    user_id: String,
    conn_id: u64,
    mut notif_rx: mpsc::Receiver<Notification>,
    mut ack_rx: mpsc::Receiver<bool>,
    mut sink: Si,
    config: LiveConfig,
) where
    Si: Sink<WsMessage> + Unpin + Send + 'static,
    Si::Error: Display,
{
    let mut keepalive = interval_at(Instant::now() + config.ping_period, config.ping_period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ack_open = true;

    loop {
        tokio::select! {
            maybe = notif_rx.recv() => {
                let Some(first) = maybe else {
                    // The hub dropped this registration: replaced,
                    // backpressured, or shutting down. Say goodbye.
                    let close = WsMessage::Close(Some(CloseFrame {
                        code: CloseCode::Away,
                        reason: "connection superseded".into(),
                    }));
                    let _ = timeout(config.write_wait, sink.send(close)).await;
                    break;
                };
                let frames = coalesce(first, &mut notif_rx);
                if let Err(reason) = write_frames(&mut sink, &frames, &config).await {
                    warn!(user_id = %user_id, error = %reason, "notification write failed");
                    hub.unregister(&user_id, conn_id).await;
                    break;
                }
            }
            maybe = ack_rx.recv(), if ack_open => {
                let Some(ok) = maybe else {
                    ack_open = false;
                    continue;
                };
                let frame = ServerFrame::Ack { ok };
                if let Err(reason) = write_frames(&mut sink, std::slice::from_ref(&frame), &config).await {
                    warn!(user_id = %user_id, error = %reason, "ack write failed");
                    hub.unregister(&user_id, conn_id).await;
                    break;
                }
            }
            _ = keepalive.tick() => {
                let ping = WsMessage::Ping(Vec::new());
                if let Err(reason) = bounded_send(&mut sink, ping, &config).await {
                    debug!(user_id = %user_id, error = %reason, "keepalive write failed");
                    hub.unregister(&user_id, conn_id).await;
                    break;
                }
            }
        }
    }
    debug!(user_id = %user_id, conn_id, "drain pump stopped");
}

/// Collapse everything already queued into one batch: first-occurrence
/// order, latest payload per notification id.
fn coalesce(first: Notification, pending: &mut mpsc::Receiver<Notification>) -> Vec<ServerFrame> {
    let mut order: Vec<String> = vec![first.id.clone()];
    let mut latest: HashMap<String, Notification> = HashMap::new();
    latest.insert(first.id.clone(), first);
    while let Ok(notification) = pending.try_recv() {
        if !latest.contains_key(&notification.id) {
            order.push(notification.id.clone());
        }
        latest.insert(notification.id.clone(), notification);
    }
    order
        .into_iter()
        .filter_map(|id| latest.remove(&id))
        .map(|notification| ServerFrame::Notif { notification })
        .collect()
}

async fn write_frames<Si>(sink: &mut Si, frames: &[ServerFrame], config: &LiveConfig) -> Result<(), String>
where
    Si: Sink<WsMessage> + Unpin,
    Si::Error: Display,
{
    for frame in frames {
        let json = serde_json::to_string(frame).map_err(|err| err.to_string())?;
        bounded_send(sink, WsMessage::Text(json), config).await?;
    }
    Ok(())
}

/// One socket write, bounded by the write deadline.
async fn bounded_send<Si>(sink: &mut Si, message: WsMessage, config: &LiveConfig) -> Result<(), String>
where
    Si: Sink<WsMessage> + Unpin,
    Si::Error: Display,
{
    match timeout(config.write_wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err(format!("write timed out after {:?}", config.write_wait)),
    }
}

// ============================================================================
// Read pump (read half)
// ============================================================================

async fn read_pump<St>(
    hub: Hub,
    user_id: String,
    conn_id: u64,
    mut stream: St,
    config: LiveConfig,
) where
    St: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        let frame = match timeout(config.read_idle, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => {
                debug!(user_id = %user_id, error = %err, "socket read failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!(user_id = %user_id, "peer idle past deadline");
                break;
            }
        };
        let trigger_len = match frame {
            WsMessage::Text(text) => text.len(),
            WsMessage::Binary(data) => data.len(),
            WsMessage::Close(_) => break,
            // Pongs answer our keepalive and reset the idle deadline by
            // arriving; inbound pings are answered by the protocol layer.
            _ => continue,
        };
        if trigger_len > config.max_inbound_frame {
            debug!(user_id = %user_id, len = trigger_len, "oversized inbound frame");
            break;
        }
        // Every short inbound frame means the same thing.
        hub.mark_all_read(&user_id).await;
    }
    hub.unregister(&user_id, conn_id).await;
    debug!(user_id = %user_id, conn_id, "read pump stopped");
}
