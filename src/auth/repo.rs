use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Credential store.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Find a user by (normalized) email.
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Insert a user. The uniqueness check on email is part of the insert,
    /// so two racing registrations cannot both succeed.
    async fn create_user(&self, new: NewUser) -> Result<User, CreateUserError>;

    /// Delete a user together with their profile, posts, likes and
    /// comments. Returns `false` if there was no such user.
    async fn delete_user(&self, id: Uuid) -> anyhow::Result<bool>;
}
