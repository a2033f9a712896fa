use async_trait::async_trait;
use uuid::Uuid;

use crate::profiles::repo_types::{Education, Experience, Profile, ProfileFields};

/// Profiles are keyed by their owner: every user has at most one.
///
/// Sub-list mutations are single store operations, so two concurrent
/// requests on the same profile cannot lose each other's update.
/// Mutations return the updated profile, or `None` if the user has none.
#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn upsert_profile(&self, user_id: Uuid, fields: ProfileFields) -> anyhow::Result<Profile>;

    async fn find_profile_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>>;

    async fn list_profiles(&self) -> anyhow::Result<Vec<Profile>>;

    /// Prepend an entry.
    async fn push_experience(&self, user_id: Uuid, entry: Experience) -> anyhow::Result<Option<Profile>>;

    /// Remove the entry whose id equals `entry_id`; unknown ids leave the
    /// profile unchanged.
    async fn remove_experience(&self, user_id: Uuid, entry_id: Uuid) -> anyhow::Result<Option<Profile>>;

    async fn push_education(&self, user_id: Uuid, entry: Education) -> anyhow::Result<Option<Profile>>;

    async fn remove_education(&self, user_id: Uuid, entry_id: Uuid) -> anyhow::Result<Option<Profile>>;
}
