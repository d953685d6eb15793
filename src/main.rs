use anyhow::Context;
use tracing_subscriber::EnvFilter;
use wateredblogged::{auth, config::Config, db, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wateredblogged=debug,tower_http=info".into()),
        )
        .init();

    let config = Config::load();

    let db_pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let clients = auth::Clients::from_file(&config.client_secrets, &config.public_url)
        .map_err(|e| anyhow::anyhow!("loading OAuth clients: {e:?}"))?;

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("listening on {} ({})", config.bind_addr, config.public_url);

    let app = router(AppState::new(db_pool, clients, config));
    axum::serve(listener, app).await?;
    Ok(())
}
