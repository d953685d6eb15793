mod queue;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(queue::queue))
        .route("/approve/{kind}/{id}", post(queue::approve))
        .route("/reject/{kind}/{id}", post(queue::reject))
}
