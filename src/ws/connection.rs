//! Live channel read/write loop.
//!
//! Runs as a background task for one socket: writes queued outbound frames,
//! turns inbound `new-message` frames into [`ChatEvent`]s on the bus, and
//! reports the end of the connection exactly once.

use std::sync::Arc;

use chrono::Utc;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

use super::manager::ConnectionState;
use super::messages::{InboundFrame, SocketFrame};
use crate::domain::{ChatEvent, EventBus};

/// Runs the read/write loop for a single live channel.
///
/// - Sends every frame from `outbound` to the server; when every sender is
///   dropped the socket is closed gracefully.
/// - Publishes every `new-message` frame on `bus`.
/// - On exit sets `state` to [`ConnectionState::Disconnected`] and publishes
///   [`ChatEvent::Disconnected`].
pub async fn run_connection<S>(
    socket: S,
    mut outbound: mpsc::Receiver<SocketFrame>,
    state: Arc<watch::Sender<ConnectionState>>,
    bus: EventBus,
) where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>>
        + Sink<WsMessage, Error = tungstenite::Error>
        + Unpin,
{
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (reason, requested) = loop {
        tokio::select! {
            // Frame queued by the client
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break ("closed by client".to_string(), true);
                };
                let json = match frame.to_json() {
                    Ok(json) => json,
                    Err(err) => {
                        tracing::warn!(event_name = frame.event_name(), error = %err, "dropping unserializable frame");
                        continue;
                    }
                };
                if let Err(err) = ws_tx.send(WsMessage::text(json)).await {
                    break (format!("send failed: {err}"), false);
                }
                tracing::trace!(event_name = frame.event_name(), "frame sent");
            }
            // Frame pushed by the server
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => handle_text_frame(text.as_str(), &bus),
                    Some(Ok(WsMessage::Close(close))) => {
                        let reason = close.map_or_else(
                            || "closed by server".to_string(),
                            |c| format!("closed by server: {}", c.reason.as_str()),
                        );
                        break (reason, false);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break (format!("transport error: {err}"), false),
                    None => break ("connection lost".to_string(), false),
                }
            }
        }
    };

    state.send_replace(ConnectionState::Disconnected);
    if requested {
        tracing::info!(%reason, "live channel closed");
    } else {
        tracing::warn!(%reason, "live channel dropped; reconnect is manual");
    }
    bus.publish(ChatEvent::Disconnected {
        reason,
        requested,
        timestamp: Utc::now(),
    });
}

/// Decodes a text frame and publishes message payloads on the bus.
fn handle_text_frame(text: &str, bus: &EventBus) {
    match InboundFrame::parse(text) {
        InboundFrame::Known(SocketFrame::NewMessage(message)) => {
            tracing::debug!(
                conversation_id = %message.conversation_id(),
                "live message received"
            );
            let receivers = bus.publish(ChatEvent::MessageReceived(message));
            if receivers == 0 {
                tracing::debug!("live message had no subscribers");
            }
        }
        InboundFrame::Known(SocketFrame::Register(_)) => {
            tracing::debug!("ignoring register frame echoed by server");
        }
        InboundFrame::Unknown(name) => {
            tracing::debug!(event_name = %name, "ignoring unhandled live event");
        }
        InboundFrame::Malformed(err) => {
            tracing::warn!(error = %err, "malformed live frame");
        }
    }
}
