use axum::{debug_handler, extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade}, response::IntoResponse};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use super::FeedEvent;

#[debug_handler]
pub(crate) async fn timeline_ws(
    State(tx): State<broadcast::Sender<FeedEvent>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| watch(stream, tx.subscribe()))
}

async fn watch(stream: WebSocket, mut rx: broadcast::Receiver<FeedEvent>) {
    let (mut sender, mut receiver) = stream.split();

    let mut push_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "timeline watcher fell behind");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // the page never talks back; this only notices the socket closing
    let mut close_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut push_task => close_task.abort(),
        _ = &mut close_task => push_task.abort(),
    };
}
