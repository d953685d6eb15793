use sqlx::{types::Json, SqlitePool};

use crate::models::PostKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggled {
    pub liked: bool,
    pub likes: i64,
}

/// Flips `uid` in the liker set. Returns whether it is now a like.
pub fn toggle(likes_by: &mut Vec<String>, uid: &str) -> bool {
    match likes_by.iter().position(|liker| liker == uid) {
        Some(index) => {
            likes_by.remove(index);
            false
        }
        None => {
            likes_by.push(uid.to_owned());
            true
        }
    }
}

/// Like or unlike a post for `uid`. `None` when the post doesn't exist.
///
/// `likes` is rewritten from the liker set in the same transaction, so the
/// pair can't drift apart under concurrent likers.
pub async fn toggle_like(db_pool: &SqlitePool, key: PostKey, uid: &str) -> Result<Option<Toggled>, sqlx::Error> {
    let table = key.kind.table();
    let id = key.id.to_string();
    let mut tx = db_pool.begin().await?;

    // takes the write lock before reading
    let claimed = sqlx::query(&format!("UPDATE {table} SET likes=likes WHERE id=?"))
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    if claimed.rows_affected() == 0 {
        return Ok(None);
    }

    let (Json(mut likes_by),): (Json<Vec<String>>,) = sqlx::query_as(&format!("SELECT likes_by FROM {table} WHERE id=?"))
        .bind(&id)
        .fetch_one(&mut *tx)
        .await?;

    let liked = toggle(&mut likes_by, uid);
    let likes = likes_by.len() as i64;

    sqlx::query(&format!("UPDATE {table} SET likes=?, likes_by=? WHERE id=?"))
        .bind(likes)
        .bind(Json(&likes_by))
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::debug!(post = %key.id, uid, liked, likes, "toggled like");

    Ok(Some(Toggled { liked, likes }))
}
