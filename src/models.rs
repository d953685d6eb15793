use std::{fmt, str::FromStr};

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::db::now_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        })
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            _ => Err(format!("unknown visibility {s:?}")),
        }
    }
}

/// Which collection a post lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PostKind {
    User,
    Plant,
}

impl PostKind {
    pub fn table(self) -> &'static str {
        match self {
            PostKind::User => "posts",
            PostKind::Plant => "plant_posts",
        }
    }

    fn columns(self) -> &'static str {
        match self {
            PostKind::User => "p.id, p.author_id, p.content, p.image_url, p.created_at, p.visibility, p.approved, p.likes, p.likes_by, \
                u.username AS author_name, u.profile_picture AS author_picture",
            PostKind::Plant => "p.id, p.author_id, p.content, p.image_url, p.created_at, p.visibility, p.approved, p.likes, p.likes_by, \
                p.plant_id, p.plant_name, p.plant_profile_pic, \
                u.username AS author_name, u.profile_picture AS author_picture",
        }
    }

    /// `SELECT … FROM <table> p LEFT JOIN users u`, ready for a WHERE clause.
    pub(crate) fn select(self) -> String {
        format!(
            "SELECT {} FROM {} p LEFT JOIN users u ON u.uid = p.author_id",
            self.columns(),
            self.table()
        )
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PostKind::User => "user",
            PostKind::Plant => "plant",
        })
    }
}

/// Address of a post across both collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostKey {
    pub kind: PostKind,
    pub id: Uuid,
}

impl PostKey {
    pub fn path(&self) -> String {
        format!("/posts/{}/{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub uid: String,
    pub username: String,
    pub email: Option<String>,
    pub profile_picture: String,
    pub about_me: String,
    pub is_admin: bool,
    pub created_at: i64,
}

impl User {
    pub async fn find(db_pool: &SqlitePool, uid: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT uid,username,email,profile_picture,about_me,is_admin,created_at FROM users WHERE uid=?")
            .bind(uid)
            .fetch_optional(db_pool)
            .await
    }

    /// Adds the user unless the uid is already taken, then returns whoever is stored.
    /// Two first sign-ins racing each other both end up with the same row.
    pub async fn create(
        db_pool: &SqlitePool,
        uid: &str,
        username: Option<String>,
        email: Option<String>,
        profile_picture: Option<String>,
    ) -> Result<User, sqlx::Error> {
        let username = username.unwrap_or_else(random_gardener);

        let inserted = sqlx::query(
            "INSERT INTO users (uid,username,email,profile_picture,about_me,is_admin,created_at) VALUES (?,?,?,?,'',0,?) \
             ON CONFLICT(uid) DO NOTHING",
        )
            .bind(uid)
            .bind(&username)
            .bind(&email)
            .bind(profile_picture.as_deref().unwrap_or(""))
            .bind(now_millis())
            .execute(db_pool)
            .await?;
        if inserted.rows_affected() > 0 {
            tracing::info!(uid, %username, "added user");
        }

        Self::find(db_pool, uid).await?.ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn update_about(db_pool: &SqlitePool, uid: &str, username: &str, about_me: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET username=?, about_me=? WHERE uid=?")
            .bind(username)
            .bind(about_me)
            .bind(uid)
            .execute(db_pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_picture(db_pool: &SqlitePool, uid: &str, url: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET profile_picture=? WHERE uid=?")
            .bind(url)
            .bind(uid)
            .execute(db_pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn is_admin(db_pool: &SqlitePool, uid: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(bool,)> = sqlx::query_as("SELECT is_admin FROM users WHERE uid=?")
            .bind(uid)
            .fetch_optional(db_pool)
            .await?;
        Ok(row.is_some_and(|(is_admin,)| is_admin))
    }

    /// Returns how many accounts carry that email.
    pub async fn grant_admin_by_email(db_pool: &SqlitePool, email: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_admin=1 WHERE email=? COLLATE NOCASE")
            .bind(email)
            .execute(db_pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn random_gardener() -> String {
    let adjectives = [
        "Leafy", "Sunny", "Thorny", "Dewy", "Mossy", "Blooming", "Rooted", "Budding",
        "Shady", "Green", "Muddy", "Wild", "Tender", "Hardy", "Sprouting", "Lush",
    ];
    let nouns = [
        "Fern", "Tulip", "Cactus", "Basil", "Oak", "Daisy", "Ivy", "Orchid", "Sage",
        "Clover", "Maple", "Lily", "Thyme", "Willow", "Poppy", "Radish",
    ];

    match (adjectives.choose(&mut rand::rng()), nouns.choose(&mut rand::rng())) {
        (Some(adjective), Some(noun)) => format!("{adjective} {noun}"),
        _ => "Nameless Gardener".to_owned(),
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Plant {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub image_url: String,
    pub created_at: i64,
}

impl Plant {
    pub async fn find(db_pool: &SqlitePool, user_id: &str, plant_id: Uuid) -> Result<Option<Plant>, sqlx::Error> {
        sqlx::query_as("SELECT id,user_id,name,image_url,created_at FROM plants WHERE id=? AND user_id=?")
            .bind(plant_id.to_string())
            .bind(user_id)
            .fetch_optional(db_pool)
            .await
    }

    pub async fn list_for(db_pool: &SqlitePool, user_id: &str) -> Result<Vec<Plant>, sqlx::Error> {
        sqlx::query_as("SELECT id,user_id,name,image_url,created_at FROM plants WHERE user_id=? ORDER BY created_at")
            .bind(user_id)
            .fetch_all(db_pool)
            .await
    }

    pub async fn create(db_pool: &SqlitePool, id: Uuid, user_id: &str, name: &str, image_url: &str) -> Result<Plant, sqlx::Error> {
        let created_at = now_millis();
        sqlx::query("INSERT INTO plants (id,user_id,name,image_url,created_at) VALUES (?,?,?,?,?)")
            .bind(id.to_string())
            .bind(user_id)
            .bind(name)
            .bind(image_url)
            .bind(created_at)
            .execute(db_pool)
            .await?;

        Ok(Plant {
            id: id.to_string(),
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            image_url: image_url.to_owned(),
            created_at,
        })
    }

    /// Removes the plant together with its posts and their comments.
    pub async fn delete(db_pool: &SqlitePool, user_id: &str, plant_id: Uuid) -> Result<bool, sqlx::Error> {
        let plant_id = plant_id.to_string();
        let mut tx = db_pool.begin().await?;

        let owned: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM plants WHERE id=? AND user_id=?")
            .bind(&plant_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM comments WHERE post_kind='plant' AND post_id IN (SELECT id FROM plant_posts WHERE plant_id=?)")
            .bind(&plant_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM plant_posts WHERE plant_id=?")
            .bind(&plant_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM plants WHERE id=? AND user_id=?")
            .bind(&plant_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }
}

/// A document from either post collection. Plant posts carry the `plant_*` fields.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub image_url: String,
    pub created_at: i64,
    pub visibility: Visibility,
    pub approved: bool,
    pub likes: i64,
    #[sqlx(json)]
    pub likes_by: Vec<String>,

    #[sqlx(default)]
    pub plant_id: Option<String>,
    #[sqlx(default)]
    pub plant_name: Option<String>,
    #[sqlx(default)]
    pub plant_profile_pic: Option<String>,

    #[sqlx(default)]
    pub author_name: Option<String>,
    #[sqlx(default)]
    pub author_picture: Option<String>,
}

impl Post {
    pub fn kind(&self) -> PostKind {
        if self.plant_id.is_some() {
            PostKind::Plant
        } else {
            PostKind::User
        }
    }

    pub fn key(&self) -> Option<PostKey> {
        Some(PostKey {
            kind: self.kind(),
            id: Uuid::parse_str(&self.id).ok()?,
        })
    }

    /// Eligible for the public Timeline.
    pub fn is_listed(&self) -> bool {
        self.visibility == Visibility::Public && self.approved
    }

    /// Who may open this post: anyone when listed, otherwise its author and admins.
    pub fn viewable_by(&self, viewer: Option<&str>, viewer_is_admin: bool) -> bool {
        self.is_listed() || viewer_is_admin || viewer == Some(self.author_id.as_str())
    }

    pub fn liked_by(&self, uid: &str) -> bool {
        self.likes_by.iter().any(|liker| liker == uid)
    }

    pub async fn find(db_pool: impl SqliteExecutor<'_>, key: PostKey) -> Result<Option<Post>, sqlx::Error> {
        sqlx::query_as(&format!("{} WHERE p.id=?", key.kind.select()))
            .bind(key.id.to_string())
            .fetch_optional(db_pool)
            .await
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: String,
    pub post_kind: PostKind,
    pub post_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: i64,
    #[sqlx(default)]
    pub username: Option<String>,
}

impl Comment {
    pub async fn list_for(db_pool: &SqlitePool, key: PostKey) -> Result<Vec<Comment>, sqlx::Error> {
        sqlx::query_as(
            "SELECT c.id,c.post_kind,c.post_id,c.user_id,c.content,c.created_at,u.username \
             FROM comments c LEFT JOIN users u ON u.uid = c.user_id \
             WHERE c.post_kind=? AND c.post_id=? ORDER BY c.created_at, c.id",
        )
        .bind(key.kind)
        .bind(key.id.to_string())
        .fetch_all(db_pool)
        .await
    }
}
