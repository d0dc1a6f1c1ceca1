use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::watch;

use super::{PushState, shutdown_requested};
use crate::hub::Subscription;

pub async fn socket(ws: WebSocketUpgrade, State(state): State<PushState>) -> Response {
    let subscription = state.hub.subscribe();
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| serve_socket(socket, subscription, shutdown))
}

/// Forwards each published batch as one text frame until the client leaves
/// or the relay shuts down. Inbound frames other than close are ignored.
async fn serve_socket(
    socket: WebSocket,
    mut subscription: Subscription,
    shutdown: watch::Receiver<bool>,
) {
    let (mut sender, mut receiver) = socket.split();
    let shutdown = shutdown_requested(shutdown);
    tokio::pin!(shutdown);
    tracing::debug!("push socket opened");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: "shutdown".into(),
                };
                let _ = sender.send(Message::Close(Some(frame))).await;
                break;
            }
            message = subscription.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = sender.send(Message::text(&*message)).await {
                    tracing::debug!(error = %e, "push socket send failed");
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "push socket read failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!("push socket closed");
}
