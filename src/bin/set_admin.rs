//! Grants the admin flag to the account whose email is in `ADMIN_EMAIL`.

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;
use wateredblogged::{config::Config, db, models::User};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let email = dotenv::var("ADMIN_EMAIL").context("ADMIN_EMAIL must be set")?;
    let config = Config::load();
    let db_pool = db::connect(&config.database_url).await?;

    match User::grant_admin_by_email(&db_pool, email.trim()).await? {
        0 => bail!("no user has signed in with {email} yet"),
        n => tracing::info!("{email} is now an admin ({n} account(s))"),
    }
    Ok(())
}
