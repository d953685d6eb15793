//! Pagination over the two post collections.
//!
//! Walls and the Timeline read `posts` and `plant_posts` side by side with one
//! shared cursor, then merge the two result sets newest first. The cursor is
//! the `(created_at, id)` of the last post handed out, so a later page only
//! ever sees strictly older posts.

use std::{collections::HashSet, fmt, str::FromStr};

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{Post, PostKind};

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: i64,
    pub id: Uuid,
}

impl Cursor {
    pub fn of(post: &Post) -> Option<Cursor> {
        Some(Cursor {
            created_at: post.created_at,
            id: Uuid::parse_str(&post.id).ok()?,
        })
    }

    /// True when `post` sorts strictly after this cursor, i.e. is older.
    pub fn is_before(&self, post: &Post) -> bool {
        (post.created_at, post.id.as_str()) < (self.created_at, self.id.to_string().as_str())
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.created_at, self.id)
    }
}

impl FromStr for Cursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (created_at, id) = s.split_once('.').ok_or(format!("bad cursor {s:?}"))?;
        Ok(Cursor {
            created_at: created_at.parse().map_err(|_| format!("bad cursor {s:?}"))?,
            id: Uuid::parse_str(id).map_err(|_| format!("bad cursor {s:?}"))?,
        })
    }
}

/// Which posts a feed shows.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Public, approved posts from everyone.
    Timeline,
    /// A user's posts and their plants' posts.
    User { uid: &'a str, include_unlisted: bool },
    /// One plant's posts.
    Plant { plant_id: Uuid, include_unlisted: bool },
}

impl Scope<'_> {
    fn kinds(&self) -> &'static [PostKind] {
        match self {
            Scope::Timeline | Scope::User { .. } => &[PostKind::User, PostKind::Plant],
            Scope::Plant { .. } => &[PostKind::Plant],
        }
    }

    fn include_unlisted(&self) -> bool {
        match self {
            Scope::Timeline => false,
            Scope::User { include_unlisted, .. } | Scope::Plant { include_unlisted, .. } => *include_unlisted,
        }
    }
}

#[derive(Debug, Default)]
pub struct Page {
    pub posts: Vec<Post>,
    pub next: Option<Cursor>,
}

pub async fn page(
    db_pool: &SqlitePool,
    scope: Scope<'_>,
    after: Option<Cursor>,
    limit: usize,
) -> Result<Page, sqlx::Error> {
    let mut sources = Vec::with_capacity(2);
    for &kind in scope.kinds() {
        sources.push(fetch(db_pool, kind, scope, after, limit).await?);
    }

    Ok(merge(sources, after, limit))
}

async fn fetch(
    db_pool: &SqlitePool,
    kind: PostKind,
    scope: Scope<'_>,
    after: Option<Cursor>,
    limit: usize,
) -> Result<Vec<Post>, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(kind.select());
    query.push(" WHERE 1=1");

    match scope {
        Scope::Timeline => {}
        Scope::User { uid, .. } => {
            query.push(" AND p.author_id=").push_bind(uid);
        }
        Scope::Plant { plant_id, .. } => {
            query.push(" AND p.plant_id=").push_bind(plant_id.to_string());
        }
    }

    if !scope.include_unlisted() {
        query.push(" AND p.visibility='public' AND p.approved=1");
    }

    if let Some(cursor) = after {
        query
            .push(" AND (p.created_at < ")
            .push_bind(cursor.created_at)
            .push(" OR (p.created_at = ")
            .push_bind(cursor.created_at)
            .push(" AND p.id < ")
            .push_bind(cursor.id.to_string())
            .push("))");
    }

    query
        .push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
        .push_bind(limit as i64 + 1);

    query.build_query_as::<Post>().fetch_all(db_pool).await
}

/// Merges per-collection results into one page.
///
/// Each source is expected to hold up to `limit + 1` posts older than `after`;
/// anything at or before the cursor is dropped, duplicates keep their first
/// occurrence.
pub fn merge(sources: Vec<Vec<Post>>, after: Option<Cursor>, limit: usize) -> Page {
    let mut seen = HashSet::new();
    let mut posts: Vec<Post> = sources
        .into_iter()
        .flatten()
        .filter(|post| after.is_none_or(|cursor| cursor.is_before(post)))
        .filter(|post| seen.insert(post.id.clone()))
        .collect();

    posts.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));

    let has_more = posts.len() > limit;
    posts.truncate(limit);

    let next = if has_more {
        posts.last().and_then(Cursor::of)
    } else {
        None
    };

    Page { posts, next }
}
