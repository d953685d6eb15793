use std::{fmt, path::Path};

use oauth2::{basic::BasicClient, AuthUrl, Client, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use serde::Deserialize;
use serde_json::Value;

use crate::{AppResult, GetField};

type ProviderClient = Client<oauth2::StandardErrorResponse<oauth2::basic::BasicErrorResponseType>, oauth2::StandardTokenResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardTokenIntrospectionResponse<oauth2::EmptyExtraTokenFields, oauth2::basic::BasicTokenType>, oauth2::StandardRevocableToken, oauth2::StandardErrorResponse<oauth2::RevocationErrorResponseType>, oauth2::EndpointSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointNotSet, oauth2::EndpointSet>;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    /// Provider id as the identity toolkit names it.
    pub fn id(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    fn slug(&self) -> &str {
        use ClientProvider::*;
        match self {
            Google => "google",
            Github => "github",
        }
    }

    fn endpoints(&self) -> (&'static str, &'static str) {
        use ClientProvider::*;
        match self {
            Google => ("https://accounts.google.com/o/oauth2/auth", "https://oauth2.googleapis.com/token"),
            Github => ("https://github.com/login/oauth/authorize", "https://github.com/login/oauth/access_token"),
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        use ClientProvider::*;
        match self {
            Google => &["openid", "email", "profile"],
            Github => &["read:user", "user:email"],
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// OAuth clients per provider plus the identity toolkit endpoint that turns
/// provider tokens into our users.
#[derive(Clone)]
pub struct Clients {
    pub(crate) firebase_idpurl: String,
    google_client: Option<ProviderClient>,
    github_client: Option<ProviderClient>,
}

impl Clients {
    pub fn from_file(path: &Path, public_url: &str) -> AppResult<Clients> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("can't read client secrets {}: {e}", path.display()))?;
        Clients::from_json(serde_json::from_str(&json)?, public_url)
    }

    pub fn from_json(json: Value, public_url: &str) -> AppResult<Clients> {
        let firebase_idpurl = format!(
            "https://identitytoolkit.googleapis.com/v1/accounts:signInWithIdp?key={}",
            json.get_obj_field("firebase")?.get_str_field("apikey")?
        );

        let client = |provider: ClientProvider| -> AppResult<Option<ProviderClient>> {
            let Some(json) = json.get(provider.slug()) else {
                return Ok(None);
            };
            let client_id = ClientId::new(json.get_str_field("client_id")?);
            let client_secret = ClientSecret::new(json.get_str_field("client_secret")?);

            let (auth_url, token_url) = provider.endpoints();
            let auth_url = AuthUrl::new(auth_url.to_owned()).map_err(anyhow::Error::from)?;
            let token_url = TokenUrl::new(token_url.to_owned()).map_err(anyhow::Error::from)?;
            let redirect_url = RedirectUrl::new(format!("{public_url}/lockin/{}", provider.slug()))
                .map_err(anyhow::Error::from)?;

            Ok(Some(
                BasicClient::new(client_id)
                .set_client_secret(client_secret)
                .set_auth_uri(auth_url)
                .set_token_uri(token_url)
                .set_redirect_uri(redirect_url)
            ))
        };

        Ok(
            Clients {
                google_client: client(ClientProvider::Google)?,
                github_client: client(ClientProvider::Github)?,
                firebase_idpurl,
            }
        )
    }

    pub fn get_client(&self, provider: ClientProvider) -> AppResult<ProviderClient> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.clone(),
            Github => self.github_client.clone(),
        }.ok_or(format!("OAuth provider {provider} keys not supplied").into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn configured_providers_only() {
        let clients = Clients::from_json(json!({
            "firebase": { "apikey": "k3y" },
            "google": { "client_id": "id", "client_secret": "secret" },
        }), "http://localhost:8080").unwrap();

        assert!(clients.firebase_idpurl.ends_with("?key=k3y"));
        let google = clients.get_client(ClientProvider::Google).unwrap();
        assert_eq!(
            google.redirect_uri().map(|url| url.as_str()),
            Some("http://localhost:8080/lockin/google")
        );
        assert!(clients.get_client(ClientProvider::Github).is_err());
    }

    #[test]
    fn firebase_key_is_required() {
        assert!(Clients::from_json(json!({}), "http://localhost:8080").is_err());
    }
}
