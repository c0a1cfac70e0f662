//! Live notification delivery over WebSocket
//!
//! One hub task owns every active registration; per connection a pump pair
//! moves frames between the socket and the hub.
//!
//! ## Protocol
//!
//! Server to client, JSON text frames tagged with `type`:
//!
//! - `notif` - one notification (subject, message, permalink, timestamp)
//! - `ack` - outcome of a mark-all-read request (`ok: true/false`)
//!
//! Client to server: any text or binary frame up to [`MAX_INBOUND_FRAME`]
//! bytes means "mark all my notifications read". Longer frames end the
//! connection. Ping/pong keepalive runs underneath.
//!
//! ## Lifecycle
//!
//! The upgrade endpoint registers the connection with the hub and spawns the
//! pumps. Either pump exiting unregisters the connection; the hub dropping a
//! registration (replaced, backpressured, shutdown) closes the notification
//! queue, which the drain pump answers with a close frame.

mod endpoint;
mod hub;
mod pump;

pub use endpoint::handle_live_upgrade;
pub use hub::{Hub, LiveUser};
pub use pump::{attach, ServerFrame};

use std::time::Duration;

/// How long a single socket write may take before the connection is
/// considered dead.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// How long the read side waits for any inbound frame (pong included)
/// before giving up on the peer.
pub const READ_IDLE: Duration = Duration::from_secs(60);

/// Keepalive ping interval. Must be shorter than [`READ_IDLE`] so a healthy
/// peer always produces a pong in time.
pub const PING_PERIOD: Duration = Duration::from_secs(54);

/// Inbound frames only ever carry the mark-read trigger, so anything longer
/// than a few bytes is a misbehaving client.
pub const MAX_INBOUND_FRAME: usize = 8;

/// Outbound notification queue length per connection. A connection that
/// falls this far behind is dropped rather than buffered further.
pub const NOTIF_QUEUE_CAPACITY: usize = 256;

/// Tunables for one live connection.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub write_wait: Duration,
    pub read_idle: Duration,
    pub ping_period: Duration,
    pub max_inbound_frame: usize,
    pub notif_queue_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            write_wait: WRITE_WAIT,
            read_idle: READ_IDLE,
            ping_period: PING_PERIOD,
            max_inbound_frame: MAX_INBOUND_FRAME,
            notif_queue_capacity: NOTIF_QUEUE_CAPACITY,
        }
    }
}
