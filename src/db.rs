use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, SqlitePool};
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    uid             TEXT PRIMARY KEY,
    username        TEXT NOT NULL,
    email           TEXT,
    profile_picture TEXT NOT NULL DEFAULT '',
    about_me        TEXT NOT NULL DEFAULT '',
    is_admin        INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

CREATE TABLE IF NOT EXISTS plants (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(uid),
    name        TEXT NOT NULL,
    image_url   TEXT NOT NULL DEFAULT '',
    created_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_plants_user ON plants(user_id, created_at);

CREATE TABLE IF NOT EXISTS posts (
    id          TEXT PRIMARY KEY,
    author_id   TEXT NOT NULL REFERENCES users(uid),
    content     TEXT NOT NULL,
    image_url   TEXT NOT NULL DEFAULT '',
    created_at  INTEGER NOT NULL,
    visibility  TEXT NOT NULL,
    approved    INTEGER NOT NULL DEFAULT 0,
    likes       INTEGER NOT NULL DEFAULT 0,
    likes_by    TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_posts_feed ON posts(visibility, approved, created_at, id);
CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, created_at, id);

CREATE TABLE IF NOT EXISTS plant_posts (
    id                  TEXT PRIMARY KEY,
    author_id           TEXT NOT NULL REFERENCES users(uid),
    plant_id            TEXT NOT NULL REFERENCES plants(id),
    plant_name          TEXT NOT NULL,
    plant_profile_pic   TEXT NOT NULL DEFAULT '',
    content             TEXT NOT NULL,
    image_url           TEXT NOT NULL DEFAULT '',
    created_at          INTEGER NOT NULL,
    visibility          TEXT NOT NULL,
    approved            INTEGER NOT NULL DEFAULT 0,
    likes               INTEGER NOT NULL DEFAULT 0,
    likes_by            TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_plant_posts_feed ON plant_posts(visibility, approved, created_at, id);
CREATE INDEX IF NOT EXISTS idx_plant_posts_plant ON plant_posts(plant_id, created_at, id);
CREATE INDEX IF NOT EXISTS idx_plant_posts_author ON plant_posts(author_id, created_at, id);

CREATE TABLE IF NOT EXISTS comments (
    id          TEXT PRIMARY KEY,
    post_kind   TEXT NOT NULL,
    post_id     TEXT NOT NULL,
    user_id     TEXT NOT NULL REFERENCES users(uid),
    content     TEXT NOT NULL,
    created_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_kind, post_id, created_at);
"#;

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options: SqliteConnectOptions = database_url.parse()?;
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options.create_if_missing(true).foreign_keys(true))
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

/// A single-connection pool so every query sees the same in-memory database.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with("sqlite::memory:".parse::<SqliteConnectOptions>()?.foreign_keys(true))
        .await?;

    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db_pool).await?;
    info!("database schema ready");
    Ok(())
}

/// Milliseconds since the epoch; the `created_at` of every document.
pub fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
