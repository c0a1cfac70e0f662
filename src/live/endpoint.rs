//! WebSocket upgrade endpoint
//!
//! Accepts the upgrade, registers the connection with the hub, and hands the
//! socket to the pumps. Embedders route their live-notification endpoint
//! here after authenticating the request.

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{info, warn};

use super::{pump, Hub, LiveConfig, LiveUser};

type LiveSocket =
    hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;

/// Upgrade `req` into a live notification connection for `user_id`.
///
/// The caller has already authenticated the request, so `user_id` is
/// trusted. Returns the switching-protocols response to send back; the
/// connection itself runs on its own tasks.
pub async fn handle_live_upgrade(
    hub: Hub,
    req: Request<Incoming>,
    user_id: String,
    config: LiveConfig,
) -> Response<Full<Bytes>> {
    if !hyper_tungstenite::is_upgrade_request(&req) {
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(
                r#"{"error": "WebSocket upgrade required"}"#,
            )))
            .unwrap();
    }

    // Clients only ever send the tiny mark-read trigger, so cap inbound
    // messages at the protocol level too.
    let ws_config = WebSocketConfig {
        max_message_size: Some(config.max_inbound_frame),
        ..Default::default()
    };

    let (response, websocket) = match hyper_tungstenite::upgrade(req, Some(ws_config)) {
        Ok((response, websocket)) => (response, websocket),
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "websocket upgrade failed");
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(
                    r#"{"error": "malformed upgrade request"}"#,
                )))
                .unwrap();
        }
    };

    // Finish the handshake and wire the pumps off the request path.
    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => {
                let ws: LiveSocket = ws;
                let (user, notif_rx, ack_rx) = LiveUser::new(user_id.clone(), &config);
                let conn_id = hub.register(user).await;
                info!(user_id = %user_id, conn_id, "live connection opened");
                pump::attach(hub, user_id, conn_id, ws, notif_rx, ack_rx, config);
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "websocket handshake failed");
            }
        }
    });

    // Hand the 101 back with our body type.
    let (parts, _body) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}
