use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::{CreateUserError, UserRepo},
        repo_types::{NewUser, User},
    },
    posts::{
        repo::PostRepo,
        repo_types::{Comment, Like, LikeChange, NewComment, NewPost, Post},
    },
    profiles::{
        repo::ProfileRepo,
        repo_types::{Education, Experience, Profile, ProfileFields, ProfileOwner},
    },
};

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>, // keyed by owner id
    posts: Vec<Post>,                 // newest first
}

/// In-process store. Every operation takes the lock once, so each
/// check-then-mutate step is atomic with respect to other requests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_fields(profile: &mut Profile, fields: ProfileFields) {
    profile.company = fields.company;
    profile.website = fields.website;
    profile.location = fields.location;
    profile.status = fields.status;
    profile.skills = fields.skills;
    profile.bio = fields.bio;
    profile.githubusername = fields.githubusername;
    profile.social = fields.social;
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let data = self.inner.read().await;
        Ok(data.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, CreateUserError> {
        let mut data = self.inner.write().await;
        if data.users.values().any(|u| u.email == new.email) {
            return Err(CreateUserError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            avatar: new.avatar,
            created_at: OffsetDateTime::now_utc(),
        };
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut data = self.inner.write().await;
        if data.users.remove(&id).is_none() {
            return Ok(false);
        }
        data.profiles.remove(&id);
        data.posts.retain(|p| p.user != id);
        for post in data.posts.iter_mut() {
            post.likes.retain(|l| l.user != id);
            post.comments.retain(|c| c.user != id);
        }
        Ok(true)
    }
}

#[async_trait]
impl ProfileRepo for MemoryStore {
    async fn upsert_profile(&self, user_id: Uuid, fields: ProfileFields) -> anyhow::Result<Profile> {
        let mut data = self.inner.write().await;
        let owner = data
            .users
            .get(&user_id)
            .map(|u| ProfileOwner {
                id: u.id,
                name: u.name.clone(),
                avatar: u.avatar.clone(),
            })
            .context("profile owner does not exist")?;

        let profile = data.profiles.entry(user_id).or_insert_with(|| Profile {
            id: Uuid::new_v4(),
            user: owner,
            company: None,
            website: None,
            location: None,
            status: String::new(),
            skills: Vec::new(),
            bio: None,
            githubusername: None,
            social: Default::default(),
            experience: Vec::new(),
            education: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        });
        apply_fields(profile, fields);
        Ok(profile.clone())
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        Ok(self.inner.read().await.profiles.get(&user_id).cloned())
    }

    async fn list_profiles(&self) -> anyhow::Result<Vec<Profile>> {
        let data = self.inner.read().await;
        let mut profiles: Vec<Profile> = data.profiles.values().cloned().collect();
        profiles.sort_by_key(|p| (p.created_at, p.id));
        Ok(profiles)
    }

    async fn push_experience(&self, user_id: Uuid, entry: Experience) -> anyhow::Result<Option<Profile>> {
        let mut data = self.inner.write().await;
        Ok(data.profiles.get_mut(&user_id).map(|p| {
            p.experience.insert(0, entry);
            p.clone()
        }))
    }

    async fn remove_experience(&self, user_id: Uuid, entry_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let mut data = self.inner.write().await;
        Ok(data.profiles.get_mut(&user_id).map(|p| {
            p.experience.retain(|e| e.id != entry_id);
            p.clone()
        }))
    }

    async fn push_education(&self, user_id: Uuid, entry: Education) -> anyhow::Result<Option<Profile>> {
        let mut data = self.inner.write().await;
        Ok(data.profiles.get_mut(&user_id).map(|p| {
            p.education.insert(0, entry);
            p.clone()
        }))
    }

    async fn remove_education(&self, user_id: Uuid, entry_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let mut data = self.inner.write().await;
        Ok(data.profiles.get_mut(&user_id).map(|p| {
            p.education.retain(|e| e.id != entry_id);
            p.clone()
        }))
    }
}

#[async_trait]
impl PostRepo for MemoryStore {
    async fn create_post(&self, new: NewPost) -> anyhow::Result<Post> {
        let post = Post {
            id: Uuid::new_v4(),
            user: new.user,
            text: new.text,
            name: new.name,
            avatar: new.avatar,
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.inner.write().await.posts.insert(0, post.clone());
        Ok(post)
    }

    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        Ok(self.inner.read().await.posts.clone())
    }

    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let data = self.inner.read().await;
        Ok(data.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut data = self.inner.write().await;
        let before = data.posts.len();
        data.posts.retain(|p| p.id != id);
        Ok(data.posts.len() != before)
    }

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeChange> {
        let mut data = self.inner.write().await;
        let Some(post) = data.posts.iter_mut().find(|p| p.id == post_id) else {
            return Ok(LikeChange::PostMissing);
        };
        if post.likes.iter().any(|l| l.user == user_id) {
            return Ok(LikeChange::Unchanged);
        }
        post.likes.insert(0, Like { user: user_id });
        Ok(LikeChange::Updated(post.likes.clone()))
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeChange> {
        let mut data = self.inner.write().await;
        let Some(post) = data.posts.iter_mut().find(|p| p.id == post_id) else {
            return Ok(LikeChange::PostMissing);
        };
        let Some(pos) = post.likes.iter().position(|l| l.user == user_id) else {
            return Ok(LikeChange::Unchanged);
        };
        post.likes.remove(pos);
        Ok(LikeChange::Updated(post.likes.clone()))
    }

    async fn add_comment(&self, post_id: Uuid, new: NewComment) -> anyhow::Result<Option<Vec<Comment>>> {
        let mut data = self.inner.write().await;
        Ok(data.posts.iter_mut().find(|p| p.id == post_id).map(|post| {
            post.comments.insert(
                0,
                Comment {
                    id: Uuid::new_v4(),
                    user: new.user,
                    text: new.text,
                    name: new.name,
                    avatar: new.avatar,
                    created_at: OffsetDateTime::now_utc(),
                },
            );
            post.comments.clone()
        }))
    }

    async fn remove_comment(&self, post_id: Uuid, comment_id: Uuid) -> anyhow::Result<Option<Vec<Comment>>> {
        let mut data = self.inner.write().await;
        Ok(data.posts.iter_mut().find(|p| p.id == post_id).map(|post| {
            post.comments.retain(|c| c.id != comment_id);
            post.comments.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::date;

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                name: email.split('@').next().unwrap().to_string(),
                email: email.into(),
                password_hash: "hash".into(),
                avatar: "avatar".into(),
            })
            .await
            .unwrap()
    }

    async fn post(store: &MemoryStore, author: &User, text: &str) -> Post {
        store
            .create_post(NewPost {
                user: author.id,
                text: text.into(),
                name: author.name.clone(),
                avatar: author.avatar.clone(),
            })
            .await
            .unwrap()
    }

    fn fields(status: &str) -> ProfileFields {
        ProfileFields {
            status: status.into(),
            skills: vec!["rust".into()],
            ..Default::default()
        }
    }

    fn experience(title: &str) -> Experience {
        Experience {
            id: Uuid::new_v4(),
            title: title.into(),
            company: "Acme".into(),
            location: None,
            from: date!(2020 - 01 - 01),
            to: None,
            current: true,
            description: None,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryStore::new();
        user(&store, "a@x.com").await;
        let err = store
            .create_user(NewUser {
                name: "other".into(),
                email: "a@x.com".into(),
                password_hash: "h".into(),
                avatar: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CreateUserError::DuplicateEmail));
        assert_eq!(store.inner.read().await.users.len(), 1);
    }

    #[tokio::test]
    async fn likes_stay_unique_under_concurrency() {
        let store = Arc::new(MemoryStore::new());
        let author = user(&store, "a@x.com").await;
        let p = post(&store, &author, "hi").await;

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let (post_id, user_id) = (p.id, author.id);
            tasks.push(tokio::spawn(async move { store.add_like(post_id, user_id).await.unwrap() }));
        }
        let mut updated = 0;
        for t in tasks {
            if let LikeChange::Updated(_) = t.await.unwrap() {
                updated += 1;
            }
        }
        assert_eq!(updated, 1);
        assert_eq!(store.find_post(p.id).await.unwrap().unwrap().likes.len(), 1);
    }

    #[tokio::test]
    async fn like_unlike_sequence() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let b = user(&store, "b@x.com").await;
        let p = post(&store, &a, "hi").await;

        assert_eq!(store.remove_like(p.id, a.id).await.unwrap(), LikeChange::Unchanged);
        store.add_like(p.id, a.id).await.unwrap();
        let LikeChange::Updated(likes) = store.add_like(p.id, b.id).await.unwrap() else {
            panic!("second user should be able to like");
        };
        // newest first
        assert_eq!(likes, vec![Like { user: b.id }, Like { user: a.id }]);

        let LikeChange::Updated(likes) = store.remove_like(p.id, b.id).await.unwrap() else {
            panic!("unlike should apply");
        };
        assert_eq!(likes, vec![Like { user: a.id }]);
        assert_eq!(
            store.add_like(Uuid::new_v4(), a.id).await.unwrap(),
            LikeChange::PostMissing
        );
    }

    #[tokio::test]
    async fn posts_are_newest_first() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let first = post(&store, &a, "first").await;
        let second = post(&store, &a, "second").await;
        let ids: Vec<_> = store.list_posts().await.unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn remove_comment_matches_exact_id() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let p = post(&store, &a, "hi").await;
        let new = |text: &str| NewComment {
            user: a.id,
            text: text.into(),
            name: a.name.clone(),
            avatar: a.avatar.clone(),
        };
        store.add_comment(p.id, new("one")).await.unwrap();
        let comments = store.add_comment(p.id, new("two")).await.unwrap().unwrap();
        let target = comments.iter().find(|c| c.text == "one").unwrap().id;

        let left = store.remove_comment(p.id, target).await.unwrap().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].text, "two");

        // unknown id leaves the list alone
        let left = store.remove_comment(p.id, Uuid::new_v4()).await.unwrap().unwrap();
        assert_eq!(left.len(), 1);
        assert!(store.add_comment(Uuid::new_v4(), new("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_keeps_sub_lists() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let created = store.upsert_profile(a.id, fields("Junior")).await.unwrap();
        store.push_experience(a.id, experience("Dev")).await.unwrap();
        let updated = store.upsert_profile(a.id, fields("Senior")).await.unwrap();
        assert_eq!(created.id, updated.id);
        assert_eq!(updated.status, "Senior");
        assert_eq!(updated.experience.len(), 1);
        assert_eq!(updated.user.name, "a");
    }

    #[tokio::test]
    async fn upsert_requires_existing_owner() {
        let store = MemoryStore::new();
        assert!(store.upsert_profile(Uuid::new_v4(), fields("x")).await.is_err());
    }

    #[tokio::test]
    async fn experience_push_and_remove() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        assert!(store.push_experience(a.id, experience("Dev")).await.unwrap().is_none());

        store.upsert_profile(a.id, fields("Dev")).await.unwrap();
        let older = experience("Old");
        store.push_experience(a.id, older.clone()).await.unwrap();
        let profile = store.push_experience(a.id, experience("New")).await.unwrap().unwrap();
        assert_eq!(profile.experience[0].title, "New");

        let profile = store.remove_experience(a.id, Uuid::new_v4()).await.unwrap().unwrap();
        assert_eq!(profile.experience.len(), 2);
        let profile = store.remove_experience(a.id, older.id).await.unwrap().unwrap();
        assert_eq!(profile.experience.len(), 1);
        assert_eq!(profile.experience[0].title, "New");
    }

    #[tokio::test]
    async fn delete_user_cascades() {
        let store = MemoryStore::new();
        let a = user(&store, "a@x.com").await;
        let b = user(&store, "b@x.com").await;
        store.upsert_profile(a.id, fields("Dev")).await.unwrap();
        let own = post(&store, &a, "mine").await;
        let other = post(&store, &b, "theirs").await;
        store.add_like(other.id, a.id).await.unwrap();
        store
            .add_comment(
                other.id,
                NewComment {
                    user: a.id,
                    text: "nice".into(),
                    name: a.name.clone(),
                    avatar: a.avatar.clone(),
                },
            )
            .await
            .unwrap();

        assert!(store.delete_user(a.id).await.unwrap());
        assert!(!store.delete_user(a.id).await.unwrap());

        assert!(store.find_user_by_id(a.id).await.unwrap().is_none());
        assert!(store.find_profile_by_user(a.id).await.unwrap().is_none());
        assert!(store.find_post(own.id).await.unwrap().is_none());
        let other = store.find_post(other.id).await.unwrap().unwrap();
        assert!(other.likes.is_empty());
        assert!(other.comments.is_empty());
    }
}
