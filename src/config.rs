use std::{fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Where visitors reach us; OAuth redirect urls are built from it.
    pub public_url: String,
    pub upload_dir: PathBuf,
    pub client_secrets: PathBuf,
    pub form_relay_url: Option<String>,
    pub session_minutes: i64,
}

impl Config {
    pub fn load() -> Self {
        Self {
            database_url: try_load("DATABASE_URL", "sqlite://wateredblogged.db?mode=rwc"),
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8080"),
            public_url: try_load::<String>("PUBLIC_URL", "http://localhost:8080")
                .trim_end_matches('/')
                .to_owned(),
            upload_dir: try_load("UPLOAD_DIR", "uploads"),
            client_secrets: try_load("CLIENT_SECRETS", "client_secret.json"),
            form_relay_url: var("FORM_RELAY_URL").ok(),
            session_minutes: try_load("SESSION_MINUTES", "60"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    dotenv::var(key).map_err(|_| {
        warn!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {value:?}: {e}, using default: {default}");
        default
            .parse()
            .unwrap_or_else(|_| panic!("default for {key} must parse"))
    })
}
