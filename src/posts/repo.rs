use async_trait::async_trait;
use uuid::Uuid;

use crate::posts::repo_types::{Comment, LikeChange, NewComment, NewPost, Post};

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn create_post(&self, new: NewPost) -> anyhow::Result<Post>;

    /// All posts, newest first.
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>>;

    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<Post>>;

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Push a like for `user_id` unless one is already there.
    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeChange>;

    /// Remove `user_id`'s like if present.
    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeChange>;

    /// Prepend a comment; `None` if the post is gone.
    async fn add_comment(&self, post_id: Uuid, new: NewComment) -> anyhow::Result<Option<Vec<Comment>>>;

    /// Remove the comment whose id equals `comment_id`; `None` if the post
    /// is gone.
    async fn remove_comment(&self, post_id: Uuid, comment_id: Uuid) -> anyhow::Result<Option<Vec<Comment>>>;
}
