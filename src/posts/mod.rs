mod comment;
mod delete;
mod like;
mod new;
mod page;

use axum::{http::{header, HeaderMap}, response::Redirect, routing::{get, post}, Router};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::now_millis,
    include_res,
    models::{Plant, Post, PostKey, PostKind, Visibility},
    res, session, AppResult, AppState, Markdown,
};

pub use comment::{add_comment, comment_count, validate_comment};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(new::new_post))
        .route("/{kind}/{id}", get(page::post_page))
        .route("/{kind}/{id}/like", post(like::like))
        .route("/{kind}/{id}/comments", post(comment::comment))
        .route("/{kind}/{id}/delete", post(delete::delete_post))
}

pub struct NewPost<'a> {
    pub author_id: &'a str,
    pub content: &'a str,
    pub image_url: &'a str,
    pub visibility: Visibility,
    /// Set for plant posts; the plant must belong to the author.
    pub plant: Option<&'a Plant>,
}

/// Writes a new post. It starts out unapproved.
pub async fn create(db_pool: &SqlitePool, new: NewPost<'_>) -> Result<Post, sqlx::Error> {
    let id = Uuid::now_v7().to_string();
    let created_at = now_millis();

    match new.plant {
        None => {
            sqlx::query("INSERT INTO posts (id,author_id,content,image_url,created_at,visibility,approved,likes,likes_by) VALUES (?,?,?,?,?,?,0,0,'[]')")
                .bind(&id)
                .bind(new.author_id)
                .bind(new.content)
                .bind(new.image_url)
                .bind(created_at)
                .bind(new.visibility)
                .execute(db_pool)
                .await?;
        }
        Some(plant) => {
            sqlx::query("INSERT INTO plant_posts (id,author_id,plant_id,plant_name,plant_profile_pic,content,image_url,created_at,visibility,approved,likes,likes_by) VALUES (?,?,?,?,?,?,?,?,?,0,0,'[]')")
                .bind(&id)
                .bind(new.author_id)
                .bind(&plant.id)
                .bind(&plant.name)
                .bind(&plant.image_url)
                .bind(new.content)
                .bind(new.image_url)
                .bind(created_at)
                .bind(new.visibility)
                .execute(db_pool)
                .await?;
        }
    }

    tracing::info!(%id, author = new.author_id, visibility = %new.visibility, plant = new.plant.is_some(), "new post");

    Ok(Post {
        id,
        author_id: new.author_id.to_owned(),
        content: new.content.to_owned(),
        image_url: new.image_url.to_owned(),
        created_at,
        visibility: new.visibility,
        approved: false,
        likes: 0,
        likes_by: Vec::new(),
        plant_id: new.plant.map(|plant| plant.id.clone()),
        plant_name: new.plant.map(|plant| plant.name.clone()),
        plant_profile_pic: new.plant.map(|plant| plant.image_url.clone()),
        author_name: None,
        author_picture: None,
    })
}

/// Marks a post approved. False if it was missing or already approved.
pub async fn approve(db_pool: &SqlitePool, key: PostKey) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!("UPDATE {} SET approved=1 WHERE id=? AND approved=0", key.kind.table()))
        .bind(key.id.to_string())
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Removes a post and its comments.
pub async fn delete(db_pool: &SqlitePool, key: PostKey) -> Result<bool, sqlx::Error> {
    let id = key.id.to_string();
    let mut tx = db_pool.begin().await?;

    sqlx::query("DELETE FROM comments WHERE post_kind=? AND post_id=?")
        .bind(key.kind)
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query(&format!("DELETE FROM {} WHERE id=?", key.kind.table()))
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(result.rows_affected() == 1)
}

/// Public posts waiting for moderation from both collections, oldest first.
pub async fn pending(db_pool: &SqlitePool) -> Result<Vec<Post>, sqlx::Error> {
    let mut pending = Vec::new();
    for kind in [PostKind::User, PostKind::Plant] {
        let posts: Vec<Post> = sqlx::query_as(&format!(
            "{} WHERE p.visibility='public' AND p.approved=0 ORDER BY p.created_at, p.id",
            kind.select()
        ))
        .fetch_all(db_pool)
        .await?;
        pending.extend(posts);
    }

    pending.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
    Ok(pending)
}

/// One post as it appears in any feed.
pub async fn render_card(db_pool: &SqlitePool, post: &Post, viewer: Option<&str>) -> AppResult<String> {
    let Some(key) = post.key() else {
        return Err(format!("post with malformed id {}", post.id).into());
    };
    let comments = comment_count(db_pool, key).await?;

    let author_name = post.author_name.as_deref().unwrap_or("someone");
    let author_picture = res::picture(post.author_picture.as_deref().unwrap_or_default(), author_name, "avatar");

    let plant = match (&post.plant_id, &post.plant_name) {
        (Some(plant_id), Some(plant_name)) => format!(
            r#" · <a href="/u/{}/plants/{}">{}{}</a>"#,
            res::escape(&post.author_id),
            res::escape(plant_id),
            res::picture(post.plant_profile_pic.as_deref().unwrap_or_default(), plant_name, "avatar"),
            res::escape(plant_name),
        ),
        _ => String::new(),
    };

    let mut badges = String::new();
    if post.visibility == Visibility::Private {
        badges.push_str(r#"<span class="badge">private</span>"#);
    } else if !post.approved {
        badges.push_str(r#"<span class="badge">pending review</span>"#);
    }

    let like_label = match viewer {
        Some(uid) if post.liked_by(uid) => "Unlike",
        _ => "Like",
    };

    Ok(res::fill(include_res!(str, "/pages/post_card.html"), &[
        ("id", &key.id.to_string()),
        ("path", &key.path()),
        ("author_id", &res::escape(&post.author_id)),
        ("author_name", &res::escape(author_name)),
        ("author_picture", &author_picture),
        ("plant", &plant),
        ("created_at", &res::timestamp(post.created_at)),
        ("badges", &badges),
        ("content", &Markdown(post.content.as_str()).to_html()),
        ("image", &res::picture(&post.image_url, "", "post-image")),
        ("like_label", like_label),
        ("likes", &post.likes.to_string()),
        ("comments", &comments.to_string()),
    ]))
}

pub async fn render_cards(db_pool: &SqlitePool, posts: &[Post], viewer: Option<&str>) -> AppResult<String> {
    if posts.is_empty() {
        return Ok(r#"<p class="empty">Nothing has sprouted here yet.</p>"#.to_owned());
    }

    let mut cards = String::new();
    for post in posts {
        cards += &render_card(db_pool, post, viewer).await?;
    }
    Ok(cards)
}

/// "Older posts" link for a feed page.
pub fn more_link(base: &str, next: Option<crate::feed::Cursor>) -> String {
    match next {
        Some(cursor) => format!(r#"<a class="more" href="{}?cursor={cursor}">Older posts</a>"#, res::escape(base)),
        None => String::new(),
    }
}

/// The composer, with the author's plants to pick from.
pub fn new_post_form(plants: &[Plant]) -> String {
    let plant_options: String = plants
        .iter()
        .map(|plant| format!(
            r#"        <option value="{}">{}</option>"#,
            res::escape(&plant.id),
            res::escape(&plant.name)
        ))
        .collect::<Vec<_>>()
        .join("\n");

    res::fill(include_res!(str, "/pages/new_post.html"), &[("plant_options", &plant_options)])
}

/// Sends the visitor back where they came from when that was one of our pages.
pub(crate) fn back(headers: &HeaderMap, public_url: &str, fallback: &str) -> Redirect {
    let target = headers
        .get(header::REFERER)
        .and_then(|referer| referer.to_str().ok())
        .and_then(|referer| referer.strip_prefix(public_url))
        .filter(|path| session::is_local_path(path))
        .unwrap_or(fallback);
    Redirect::to(target)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::{db, models::User};

    #[tokio::test]
    async fn approving_empties_the_queue() {
        let db_pool = db::connect_in_memory().await.unwrap();
        User::create(&db_pool, "rose", None, None, None).await.unwrap();
        let plant = Plant::create(&db_pool, Uuid::now_v7(), "rose", "Fern", "").await.unwrap();

        let user_post = create(&db_pool, NewPost {
            author_id: "rose",
            content: "hello",
            image_url: "",
            visibility: Visibility::Public,
            plant: None,
        }).await.unwrap();
        let plant_post = create(&db_pool, NewPost {
            author_id: "rose",
            content: "new frond",
            image_url: "",
            visibility: Visibility::Public,
            plant: Some(&plant),
        }).await.unwrap();
        create(&db_pool, NewPost {
            author_id: "rose",
            content: "just for me",
            image_url: "",
            visibility: Visibility::Private,
            plant: None,
        }).await.unwrap();

        let queue = pending(&db_pool).await.unwrap();
        let ids: Vec<&str> = queue.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![user_post.id.as_str(), plant_post.id.as_str()]);

        let key = plant_post.key().unwrap();
        assert!(approve(&db_pool, key).await.unwrap());
        assert!(!approve(&db_pool, key).await.unwrap());

        let queue = pending(&db_pool).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, user_post.id);

        let approved = Post::find(&db_pool, key).await.unwrap().unwrap();
        assert!(approved.approved);
        assert_eq!(approved.plant_name.as_deref(), Some("Fern"));
    }

    #[tokio::test]
    async fn delete_takes_comments_along() {
        let db_pool = db::connect_in_memory().await.unwrap();
        User::create(&db_pool, "rose", None, None, None).await.unwrap();
        let post = create(&db_pool, NewPost {
            author_id: "rose",
            content: "hello",
            image_url: "",
            visibility: Visibility::Public,
            plant: None,
        }).await.unwrap();
        let key = post.key().unwrap();
        add_comment(&db_pool, key, "rose", "first!").await.unwrap();

        assert!(delete(&db_pool, key).await.unwrap());
        assert!(Post::find(&db_pool, key).await.unwrap().is_none());
        assert_eq!(comment_count(&db_pool, key).await.unwrap(), 0);
        assert!(!delete(&db_pool, key).await.unwrap());
    }

    #[tokio::test]
    async fn cards_escape_names_and_mark_pending() {
        let db_pool = db::connect_in_memory().await.unwrap();
        User::create(&db_pool, "rose", Some("<Rose>".to_owned()), None, None).await.unwrap();
        let post = create(&db_pool, NewPost {
            author_id: "rose",
            content: "*hi*",
            image_url: "",
            visibility: Visibility::Public,
            plant: None,
        }).await.unwrap();
        let post = Post::find(&db_pool, post.key().unwrap()).await.unwrap().unwrap();

        let card = render_card(&db_pool, &post, None).await.unwrap();
        assert!(card.contains("&lt;Rose&gt;"));
        assert!(card.contains("<em>hi</em>"));
        assert!(card.contains("pending review"));
    }

    #[test]
    fn back_only_follows_our_own_pages() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("http://localhost:8080/timeline?cursor=1.x"));
        let location = |redirect: Redirect| redirect_location(redirect);

        assert_eq!(location(back(&headers, "http://localhost:8080", "/posts/user/1")), "/timeline?cursor=1.x");

        headers.insert(header::REFERER, HeaderValue::from_static("https://elsewhere.example/"));
        assert_eq!(location(back(&headers, "http://localhost:8080", "/fallback")), "/fallback");
        assert_eq!(location(back(&HeaderMap::new(), "http://localhost:8080", "/fallback")), "/fallback");

        headers.insert(header::REFERER, HeaderValue::from_static("http://localhost:8080/\\evil.example"));
        assert_eq!(location(back(&headers, "http://localhost:8080", "/fallback")), "/fallback");
        headers.insert(header::REFERER, HeaderValue::from_static("http://localhost:8080//evil.example"));
        assert_eq!(location(back(&headers, "http://localhost:8080", "/fallback")), "/fallback");
    }

    fn redirect_location(redirect: Redirect) -> String {
        use axum::response::IntoResponse;
        let response = redirect.into_response();
        response.headers()[header::LOCATION].to_str().unwrap().to_owned()
    }
}
