use std::sync::Arc;

use axum::{debug_handler, extract::State, response::Html, routing::get, Form, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{config::Config, include_res, res, session, AppResult, AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/contact", get(contact_page).post(send))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactForm {
    fn problem(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() || self.message.trim().is_empty() {
            return Some("name and message are both needed");
        }
        if !self.email.contains('@') {
            return Some("that email doesn't look right");
        }
        None
    }
}

/// Forwards a contact message to the form relay as JSON.
pub async fn relay(relay_url: &str, form: &ContactForm) -> Result<(), reqwest::Error> {
    reqwest::Client::new()
        .post(relay_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(form)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

fn render(viewer: Option<&str>, status: &str) -> Html<String> {
    Html(res::page(
        "Contact",
        viewer,
        &res::fill(include_res!(str, "/pages/contact.html"), &[("status", status)]),
    ))
}

#[debug_handler]
async fn contact_page(session: Session) -> AppResult<Html<String>> {
    let viewer = session::current_user(&session).await?;
    Ok(render(viewer.as_deref(), ""))
}

#[debug_handler(state = AppState)]
async fn send(
    State(config): State<Arc<Config>>,
    session: Session,
    Form(form): Form<ContactForm>,
) -> AppResult<Html<String>> {
    let viewer = session::current_user(&session).await?;

    let outcome = match (form.problem(), &config.form_relay_url) {
        (Some(problem), _) => Err(problem.to_owned()),
        (None, None) => Err("the contact form isn't set up yet".to_owned()),
        (None, Some(relay_url)) => relay(relay_url, &form).await.map_err(|e| {
            tracing::warn!("form relay failed: {e}");
            "we couldn't send that, try again later".to_owned()
        }),
    };

    let status = match outcome {
        Ok(()) => r#"<p class="ok">Thanks! We'll get back to you.</p>"#.to_owned(),
        Err(problem) => format!(r#"<p class="error">Error: {}</p>"#, res::escape(&problem)),
    };
    Ok(render(viewer.as_deref(), &status))
}
