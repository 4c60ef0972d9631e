use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::HubState;
use crate::notifier::Notifier;

/// GET /ws
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<HubState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_live_socket(socket, state.notifier, state.cancellation_token))
}

/// Forwards every score update to one viewer until the viewer leaves or the
/// server shuts down.
pub async fn handle_live_socket(
    socket: WebSocket,
    notifier: Arc<dyn Notifier>,
    cancellation_token: CancellationToken,
) {
    let mut subscription = notifier.subscribe().await;
    let subscriber_id = subscription.id;
    info!("Live viewer {} connected", subscriber_id);

    let (mut ws_sink, mut ws_stream) = socket.split();

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                debug!("Closing live viewer {} for shutdown", subscriber_id);
                let _ = ws_sink.send(Message::Close(None)).await;
                break;
            }

            update = subscription.recv() => {
                let Some(update) = update else {
                    break;
                };
                let text = match serde_json::to_string(&update) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode {:?}: {}", update, e);
                        continue;
                    }
                };
                if let Err(e) = ws_sink.send(Message::Text(text)).await {
                    debug!("Send to live viewer {} failed: {}", subscriber_id, e);
                    break;
                }
            }

            incoming = ws_stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        debug!("Ignoring message from live viewer {}: {}", subscriber_id, text);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Live viewer {} read error: {}", subscriber_id, e);
                        break;
                    }
                }
            }
        }
    }

    notifier.unsubscribe(subscriber_id).await;
    info!("Live viewer {} disconnected", subscriber_id);
}
