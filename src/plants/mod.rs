mod new;
mod page;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{uid}/plants", post(new::new_plant))
        .route("/{uid}/plants/{plant_id}", get(page::plant))
        .route("/{uid}/plants/{plant_id}/delete", post(page::delete_plant))
}
