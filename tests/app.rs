use std::{collections::HashMap, path::Path};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use tower_sessions::{
    session::{Id, Record},
    MemoryStore, SessionStore,
};
use uuid::Uuid;
use wateredblogged::{
    auth::Clients,
    config::Config,
    db,
    models::{Comment, Plant, Post, User, Visibility},
    posts::{self, NewPost},
    router_with_sessions, session,
    timeline::FeedEvent,
    AppState,
};

struct TestApp {
    app: Router,
    state: AppState,
    sessions: MemoryStore,
    _uploads: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let config = Config {
        database_url: "sqlite::memory:".to_owned(),
        bind_addr: "127.0.0.1:0".to_owned(),
        public_url: "http://localhost:8080".to_owned(),
        upload_dir: uploads.path().to_owned(),
        client_secrets: "client_secret.json".into(),
        form_relay_url: None,
        session_minutes: 60,
    };
    let clients = Clients::from_json(json!({ "firebase": { "apikey": "test" } }), &config.public_url).unwrap();
    let db_pool = db::connect_in_memory().await.unwrap();

    let state = AppState::new(db_pool, clients, config);
    let sessions = MemoryStore::default();
    TestApp { app: router_with_sessions(state.clone(), sessions.clone()), state, sessions, _uploads: uploads }
}

/// Stores a session signed in as `uid` and returns the cookie that carries it.
async fn sign_in(sessions: &MemoryStore, uid: &str) -> String {
    let record = Record {
        id: Id::default(),
        data: HashMap::from([(session::USER_ID.to_owned(), json!(uid))]),
        expiry_date: time::OffsetDateTime::now_utc() + time::Duration::hours(1),
    };
    sessions.save(&record).await.unwrap();
    format!("id={}", record.id)
}

struct Sent {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

async fn send(app: &Router, request: Request<Body>) -> Sent {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|location| location.to_str().unwrap().to_owned());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    Sent { status, location, body: String::from_utf8_lossy(&body).into_owned() }
}

fn get_as(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn form_as(uri: &str, cookie: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie)
        .body(Body::from(form.to_owned()))
        .unwrap()
}

const BOUNDARY: &str = "garden-bed";
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

fn multipart_as(uri: &str, cookie: &str, fields: &[(&str, &str)], image: Option<&[u8]>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some(image) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"leaf.png\"\r\n\
                 Content-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(header::COOKIE, cookie)
        .body(Body::from(body))
        .unwrap()
}

fn stored_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .map(|entry| entry.unwrap().path())
        .map(|path| if path.is_dir() { stored_files(&path) } else { 1 })
        .sum()
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn post_form(app: &Router, uri: &str, form: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn root_redirects_to_timeline() {
    let TestApp { app, .. } = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/timeline");
}

#[tokio::test]
async fn timeline_lists_only_approved_public_posts() {
    let TestApp { app, state, .. } = test_app().await;
    let db_pool = &state.db_pool;
    User::create(db_pool, "rose", Some("Rose".to_owned()), None, None).await.unwrap();

    let listed = posts::create(db_pool, NewPost {
        author_id: "rose",
        content: "the tomatoes are in",
        image_url: "",
        visibility: Visibility::Public,
        plant: None,
    }).await.unwrap();
    posts::approve(db_pool, listed.key().unwrap()).await.unwrap();

    posts::create(db_pool, NewPost {
        author_id: "rose",
        content: "still waiting on review",
        image_url: "",
        visibility: Visibility::Public,
        plant: None,
    }).await.unwrap();

    let (status, body) = get(&app, "/timeline").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("the tomatoes are in"));
    assert!(!body.contains("still waiting on review"));
    assert!(body.contains(r#"href="/login""#));
}

#[tokio::test]
async fn bad_cursor_is_a_bad_request() {
    let TestApp { app, .. } = test_app().await;
    let (status, _) = get(&app, "/timeline?cursor=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unapproved_posts_are_hidden_from_visitors() {
    let TestApp { app, state, .. } = test_app().await;
    let db_pool = &state.db_pool;
    User::create(db_pool, "rose", None, None, None).await.unwrap();
    let post = posts::create(db_pool, NewPost {
        author_id: "rose",
        content: "secret garden",
        image_url: "",
        visibility: Visibility::Private,
        plant: None,
    }).await.unwrap();

    let path = post.key().unwrap().path();
    let (status, _) = get(&app, &path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&app, &format!("/posts/user/{}", Uuid::now_v7())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profiles_show_plants_and_wall() {
    let TestApp { app, state, .. } = test_app().await;
    let db_pool = &state.db_pool;
    User::create(db_pool, "rose", Some("Rose".to_owned()), None, None).await.unwrap();
    wateredblogged::models::Plant::create(db_pool, Uuid::now_v7(), "rose", "Fiddle Leaf Fig", "").await.unwrap();

    let (status, body) = get(&app, "/u/rose").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Fiddle Leaf Fig"));
    // visitors get no edit forms
    assert!(!body.contains(r#"action="/u/rose/about""#));

    let (status, _) = get(&app, "/u/nobody").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_need_a_signed_in_user() {
    let TestApp { app, .. } = test_app().await;
    let id = Uuid::now_v7();

    let (status, _) = post_form(&app, &format!("/posts/user/{id}/comments"), "content=hello").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_form(&app, &format!("/posts/user/{id}/like"), "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_form(&app, "/u/rose/about", "username=Rose").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&app, "/admin").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_form(&app, &format!("/admin/approve/user/{id}"), "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn contact_without_relay_reports_inline() {
    let TestApp { app, .. } = test_app().await;

    let (status, body) = post_form(&app, "/contact", "name=Rose&email=rose%40example.com&message=hi").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Error: the contact form isn"));

    let (status, body) = post_form(&app, "/contact", "name=&email=rose%40example.com&message=hi").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Error: name and message are both needed"));
}

#[tokio::test]
async fn login_page_lists_providers() {
    let TestApp { app, .. } = test_app().await;
    let (status, body) = get(&app, "/login?return_url=/u/rose").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("/login/google?return_url=/u/rose"));

    // provider without keys
    let (status, _) = get(&app, "/login/github").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn blank_comments_are_refused() {
    let TestApp { app, state, sessions, .. } = test_app().await;
    let db_pool = &state.db_pool;
    User::create(db_pool, "rose", None, None, None).await.unwrap();
    User::create(db_pool, "ivy", None, None, None).await.unwrap();
    let post = posts::create(db_pool, NewPost {
        author_id: "rose",
        content: "squash flowers",
        image_url: "",
        visibility: Visibility::Public,
        plant: None,
    }).await.unwrap();
    let key = post.key().unwrap();
    posts::approve(db_pool, key).await.unwrap();

    let ivy = sign_in(&sessions, "ivy").await;
    let comments = format!("{}/comments", key.path());

    let sent = send(&app, form_as(&comments, &ivy, "content=%20%20%0A")).await;
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
    assert!(Comment::list_for(db_pool, key).await.unwrap().is_empty());

    let sent = send(&app, form_as(&comments, &ivy, "content=so+bright")).await;
    assert_eq!(sent.status, StatusCode::SEE_OTHER);
    assert_eq!(sent.location.as_deref(), Some(key.path().as_str()));

    let listed = Comment::list_for(db_pool, key).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "so bright");
    assert_eq!(listed[0].user_id, "ivy");
}

#[tokio::test]
async fn new_posts_wait_for_review_and_only_name_own_plants() {
    let TestApp { app, state, sessions, .. } = test_app().await;
    let db_pool = &state.db_pool;
    User::create(db_pool, "rose", None, None, None).await.unwrap();
    User::create(db_pool, "ivy", None, None, None).await.unwrap();
    let basil = Plant::create(db_pool, Uuid::now_v7(), "rose", "Basil", "").await.unwrap();
    let ivys_fern = Plant::create(db_pool, Uuid::now_v7(), "ivy", "Fern", "").await.unwrap();

    let rose = sign_in(&sessions, "rose").await;

    let sent = send(&app, multipart_as("/posts", &rose, &[("content", "tomatoes are in"), ("visibility", "public")], None)).await;
    assert_eq!(sent.status, StatusCode::SEE_OTHER);
    assert!(sent.location.unwrap().starts_with("/posts/user/"));

    let queue = posts::pending(db_pool).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert!(!queue[0].approved);
    assert_eq!(queue[0].author_id, "rose");
    assert_eq!(queue[0].content, "tomatoes are in");

    let sent = send(&app, multipart_as("/posts", &rose, &[("content", "not mine"), ("plant_id", ivys_fern.id.as_str())], None)).await;
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
    assert_eq!(posts::pending(db_pool).await.unwrap().len(), 1);

    let sent = send(&app, multipart_as("/posts", &rose, &[("content", "new leaves"), ("plant_id", basil.id.as_str())], None)).await;
    assert_eq!(sent.status, StatusCode::SEE_OTHER);
    assert!(sent.location.unwrap().starts_with("/posts/plant/"));

    let queue = posts::pending(db_pool).await.unwrap();
    assert_eq!(queue.len(), 2);
    let plant_post = queue.iter().find(|post| post.plant_name.is_some()).unwrap();
    assert_eq!(plant_post.plant_name.as_deref(), Some("Basil"));
    assert_eq!(plant_post.content, "new leaves");
    assert!(!plant_post.approved);

    let sent = send(&app, multipart_as("/posts", &rose, &[("content", "   ")], None)).await;
    assert_eq!(sent.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approving_clears_the_queue_and_tells_watchers() {
    let TestApp { app, state, sessions, .. } = test_app().await;
    let db_pool = &state.db_pool;
    User::create(db_pool, "rose", None, Some("rose@example.com".to_owned()), None).await.unwrap();
    User::create(db_pool, "ivy", None, None, None).await.unwrap();
    assert_eq!(User::grant_admin_by_email(db_pool, "Rose@Example.com").await.unwrap(), 1);

    let post = posts::create(db_pool, NewPost {
        author_id: "ivy",
        content: "first strawberry",
        image_url: "",
        visibility: Visibility::Public,
        plant: None,
    }).await.unwrap();
    let key = post.key().unwrap();

    let ivy = sign_in(&sessions, "ivy").await;
    let sent = send(&app, get_as("/admin", &ivy)).await;
    assert_eq!(sent.status, StatusCode::FORBIDDEN);
    let sent = send(&app, form_as(&format!("/admin/approve/user/{}", key.id), &ivy, "")).await;
    assert_eq!(sent.status, StatusCode::FORBIDDEN);

    let rose = sign_in(&sessions, "rose").await;
    let sent = send(&app, get_as("/admin", &rose)).await;
    assert_eq!(sent.status, StatusCode::OK);
    assert!(sent.body.contains("first strawberry"));

    let mut events = state.tx.subscribe();
    let sent = send(&app, form_as(&format!("/admin/approve/user/{}", key.id), &rose, "")).await;
    assert_eq!(sent.status, StatusCode::SEE_OTHER);
    assert_eq!(sent.location.as_deref(), Some("/admin"));

    assert!(posts::pending(db_pool).await.unwrap().is_empty());
    assert!(Post::find(db_pool, key).await.unwrap().unwrap().approved);

    match events.try_recv().unwrap() {
        FeedEvent::PostApproved { id, html } => {
            assert_eq!(id, key.id);
            assert!(html.contains("first strawberry"));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let sent = send(&app, get_as("/admin", &rose)).await;
    assert!(sent.body.contains("All caught up."));
}

#[tokio::test]
async fn only_owners_change_their_garden() {
    let TestApp { app, state, sessions, .. } = test_app().await;
    let db_pool = &state.db_pool;
    User::create(db_pool, "rose", Some("Rose".to_owned()), None, None).await.unwrap();
    User::create(db_pool, "ivy", None, None, None).await.unwrap();
    let plant_id = Uuid::now_v7();
    Plant::create(db_pool, plant_id, "rose", "Monstera", "").await.unwrap();

    let ivy = sign_in(&sessions, "ivy").await;

    let sent = send(&app, form_as("/u/rose/about", &ivy, "username=Ivy+was+here")).await;
    assert_eq!(sent.status, StatusCode::FORBIDDEN);
    assert_eq!(User::find(db_pool, "rose").await.unwrap().unwrap().username, "Rose");

    let delete = format!("/u/rose/plants/{plant_id}/delete");
    let sent = send(&app, form_as(&delete, &ivy, "")).await;
    assert_eq!(sent.status, StatusCode::FORBIDDEN);
    assert!(Plant::find(db_pool, "rose", plant_id).await.unwrap().is_some());

    let sent = send(&app, multipart_as("/u/rose/plants", &ivy, &[("name", "Weed")], None)).await;
    assert_eq!(sent.status, StatusCode::FORBIDDEN);

    let sent = send(&app, multipart_as("/u/rose/picture", &ivy, &[], Some(PNG))).await;
    assert_eq!(sent.status, StatusCode::FORBIDDEN);

    let rose = sign_in(&sessions, "rose").await;
    let sent = send(&app, form_as(&delete, &rose, "")).await;
    assert_eq!(sent.status, StatusCode::SEE_OTHER);
    assert_eq!(sent.location.as_deref(), Some("/u/rose"));
    assert!(Plant::find(db_pool, "rose", plant_id).await.unwrap().is_none());
}

#[tokio::test]
async fn uploads_are_dropped_when_the_document_write_fails() {
    let TestApp { app, state, sessions, .. } = test_app().await;
    let uploads = state.storage.root().to_owned();

    // signed in, but no user row behind the session
    let ghost = sign_in(&sessions, "ghost").await;

    let sent = send(&app, multipart_as("/posts", &ghost, &[("content", "boo")], Some(PNG))).await;
    assert_eq!(sent.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(stored_files(&uploads), 0);

    let sent = send(&app, multipart_as("/u/ghost/plants", &ghost, &[("name", "Nightshade")], Some(PNG))).await;
    assert_eq!(sent.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(stored_files(&uploads), 0);

    let sent = send(&app, multipart_as("/u/ghost/picture", &ghost, &[], Some(PNG))).await;
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
    assert_eq!(stored_files(&uploads), 0);

    User::create(&state.db_pool, "rose", None, None, None).await.unwrap();
    let rose = sign_in(&sessions, "rose").await;
    let sent = send(&app, multipart_as("/posts", &rose, &[("content", "sunflowers")], Some(PNG))).await;
    assert_eq!(sent.status, StatusCode::SEE_OTHER);
    assert_eq!(stored_files(&uploads), 1);
}
