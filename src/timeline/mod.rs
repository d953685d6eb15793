mod page;
mod ws;

use axum::{routing::get, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;

/// Pushed to everyone watching the Timeline.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    PostApproved { id: Uuid, html: String },
    LikesChanged { id: Uuid, likes: i64 },
    CommentAdded { id: Uuid, comments: i64 },
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(page::timeline))
        .route("/ws", get(ws::timeline_ws))
}
