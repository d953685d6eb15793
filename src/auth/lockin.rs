use axum::{debug_handler, extract::{Path, Query, State}, response::{IntoResponse, Redirect}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeVerifier, TokenResponse};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{config::Config, models::User, session::{safe_return_url, CSRF_STATE, PKCE_VERIFIER, RETURN_URL, USER_ID}, AppError, AppResult, AppState, GetField};

use super::{clients::ClientProvider, Clients};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FirebaseRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

/// What the identity toolkit tells us about whoever just signed in.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Identity {
    pub(crate) uid: String,
    pub(crate) display_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) photo_url: Option<String>,
}

impl Identity {
    pub(crate) fn from_json(body: &serde_json::Value) -> AppResult<Identity> {
        Ok(Identity {
            uid: body.get_str_field("localId")?,
            display_name: body.get_opt_str_field("displayName"),
            email: body.get_opt_str_field("email"),
            photo_url: body.get_opt_str_field("photoUrl"),
        })
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Path(provider): Path<ClientProvider>,
    Query(LockinQuery { state, code }): Query<LockinQuery>,
    State(db_pool): State<SqlitePool>,
    State(clients): State<Clients>,
    State(config): State<std::sync::Arc<Config>>,
    session: Session,
) -> AppResult<impl IntoResponse> {
    let state = CsrfToken::new(state.ok_or(AppError::bad_request("OAuth: without state"))?);
    let code = AuthorizationCode::new(code.ok_or(AppError::bad_request("OAuth: without code"))?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(AppError::bad_request("no csrf_state"));
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err(AppError::bad_request("csrf tokens don't match"));
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(AppError::bad_request("no pkce_verifier"));
    };

    let client = clients.get_client(provider)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let token_result = client
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await?;

    let access_token = token_result.access_token().secret();
    let body: serde_json::Value = http_client.post(&clients.firebase_idpurl)
        .json(&FirebaseRequest {
            post_body: format!("access_token={access_token}&providerId={}", provider.id()),
            request_uri: config.public_url.clone(),
            return_idp_credential: true,
            return_secure_token: true,
        })
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let identity = Identity::from_json(&body)?;
    let user = match User::find(&db_pool, &identity.uid).await? {
        Some(user) => user,
        None => User::create(&db_pool, &identity.uid, identity.display_name, identity.email, identity.photo_url).await?,
    };

    session.cycle_id().await?;
    session.insert(USER_ID, user.uid.clone()).await?;
    tracing::info!(uid = %user.uid, username = %user.username, %provider, "welcome");

    let return_url = session.remove::<String>(RETURN_URL).await?;
    let return_url = match return_url {
        Some(return_url) => safe_return_url(Some(return_url)),
        None => format!("/u/{}", user.uid),
    };
    Ok(Redirect::to(&return_url))
}
