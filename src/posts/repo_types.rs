use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Like {
    #[sqlx(rename = "user_id")]
    pub user: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    #[sqlx(rename = "user_id")]
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A post with its likes and comments, both newest first.
/// `name`/`avatar` are copied from the author when the post is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: String,
    pub likes: Vec<Like>,
    pub comments: Vec<Comment>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub user: Uuid,
    pub text: String,
    pub name: String,
    pub avatar: String,
}

/// Result of an atomic like/unlike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeChange {
    /// The like list after the change.
    Updated(Vec<Like>),
    /// Already liked (for like) or not liked (for unlike).
    Unchanged,
    PostMissing,
}
