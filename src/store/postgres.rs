use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use time::OffsetDateTime;
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
        repo_types::{Education, Experience, Profile, ProfileFields, ProfileOwner, Social},
    },
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }
        Ok(Self { db })
    }
}

fn group<T>(rows: impl IntoIterator<Item = (Uuid, T)>) -> HashMap<Uuid, Vec<T>> {
    let mut out: HashMap<Uuid, Vec<T>> = HashMap::new();
    for (key, value) in rows {
        out.entry(key).or_default().push(value);
    }
    out
}

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar, created_at";

#[async_trait]
impl UserRepo for PgStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, CreateUserError> {
        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, avatar)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.avatar)
        .fetch_one(&self.db)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(CreateUserError::DuplicateEmail),
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn delete_user(&self, id: Uuid) -> anyhow::Result<bool> {
        // profile, posts, likes and comments go with the user via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}

#[derive(FromRow)]
struct ProfileRow {
    id: Uuid,
    user_id: Uuid,
    owner_name: String,
    owner_avatar: String,
    company: Option<String>,
    website: Option<String>,
    location: Option<String>,
    status: String,
    skills: Vec<String>,
    bio: Option<String>,
    githubusername: Option<String>,
    social: Json<Social>,
    created_at: OffsetDateTime,
}

#[derive(FromRow)]
struct ExperienceRow {
    profile_id: Uuid,
    #[sqlx(flatten)]
    entry: Experience,
}

#[derive(FromRow)]
struct EducationRow {
    profile_id: Uuid,
    #[sqlx(flatten)]
    entry: Education,
}

const PROFILE_SELECT: &str = r#"
    SELECT p.id, p.user_id, u.name AS owner_name, u.avatar AS owner_avatar,
           p.company, p.website, p.location, p.status, p.skills, p.bio,
           p.githubusername, p.social, p.created_at
    FROM profiles p
    JOIN users u ON u.id = p.user_id
"#;

impl PgStore {
    async fn hydrate_profiles(&self, rows: Vec<ProfileRow>) -> anyhow::Result<Vec<Profile>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let experiences = sqlx::query_as::<_, ExperienceRow>(
            r#"
            SELECT profile_id, id, title, company, location, from_date, to_date, is_current, description
            FROM experiences
            WHERE profile_id = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.db)
        .await
        .context("load experiences")?;

        let educations = sqlx::query_as::<_, EducationRow>(
            r#"
            SELECT profile_id, id, school, degree, fieldofstudy, from_date, to_date, is_current, description
            FROM educations
            WHERE profile_id = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.db)
        .await
        .context("load educations")?;

        let mut experiences = group(experiences.into_iter().map(|r| (r.profile_id, r.entry)));
        let mut educations = group(educations.into_iter().map(|r| (r.profile_id, r.entry)));

        Ok(rows
            .into_iter()
            .map(|r| Profile {
                experience: experiences.remove(&r.id).unwrap_or_default(),
                education: educations.remove(&r.id).unwrap_or_default(),
                id: r.id,
                user: ProfileOwner {
                    id: r.user_id,
                    name: r.owner_name,
                    avatar: r.owner_avatar,
                },
                company: r.company,
                website: r.website,
                location: r.location,
                status: r.status,
                skills: r.skills,
                bio: r.bio,
                githubusername: r.githubusername,
                social: r.social.0,
                created_at: r.created_at,
            })
            .collect())
    }
}

#[async_trait]
impl ProfileRepo for PgStore {
    async fn upsert_profile(&self, user_id: Uuid, fields: ProfileFields) -> anyhow::Result<Profile> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, user_id, company, website, location, status, skills, bio, githubusername, social)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                company = EXCLUDED.company,
                website = EXCLUDED.website,
                location = EXCLUDED.location,
                status = EXCLUDED.status,
                skills = EXCLUDED.skills,
                bio = EXCLUDED.bio,
                githubusername = EXCLUDED.githubusername,
                social = EXCLUDED.social
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(fields.company)
        .bind(fields.website)
        .bind(fields.location)
        .bind(fields.status)
        .bind(fields.skills)
        .bind(fields.bio)
        .bind(fields.githubusername)
        .bind(Json(fields.social))
        .execute(&self.db)
        .await
        .context("upsert profile")?;

        self.find_profile_by_user(user_id)
            .await?
            .context("profile missing after upsert")
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!("{PROFILE_SELECT} WHERE p.user_id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("find profile")?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.hydrate_profiles(vec![row]).await?.pop())
    }

    async fn list_profiles(&self) -> anyhow::Result<Vec<Profile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!("{PROFILE_SELECT} ORDER BY p.created_at"))
            .fetch_all(&self.db)
            .await
            .context("list profiles")?;
        self.hydrate_profiles(rows).await
    }

    async fn push_experience(&self, user_id: Uuid, entry: Experience) -> anyhow::Result<Option<Profile>> {
        let res = sqlx::query(
            r#"
            INSERT INTO experiences (id, profile_id, title, company, location, from_date, to_date, is_current, description)
            SELECT $2, p.id, $3, $4, $5, $6, $7, $8, $9
            FROM profiles p
            WHERE p.user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(entry.id)
        .bind(entry.title)
        .bind(entry.company)
        .bind(entry.location)
        .bind(entry.from)
        .bind(entry.to)
        .bind(entry.current)
        .bind(entry.description)
        .execute(&self.db)
        .await
        .context("insert experience")?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_profile_by_user(user_id).await
    }

    async fn remove_experience(&self, user_id: Uuid, entry_id: Uuid) -> anyhow::Result<Option<Profile>> {
        sqlx::query(
            r#"
            DELETE FROM experiences e
            USING profiles p
            WHERE e.profile_id = p.id AND p.user_id = $1 AND e.id = $2
            "#,
        )
        .bind(user_id)
        .bind(entry_id)
        .execute(&self.db)
        .await
        .context("delete experience")?;
        self.find_profile_by_user(user_id).await
    }

    async fn push_education(&self, user_id: Uuid, entry: Education) -> anyhow::Result<Option<Profile>> {
        let res = sqlx::query(
            r#"
            INSERT INTO educations (id, profile_id, school, degree, fieldofstudy, from_date, to_date, is_current, description)
            SELECT $2, p.id, $3, $4, $5, $6, $7, $8, $9
            FROM profiles p
            WHERE p.user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(entry.id)
        .bind(entry.school)
        .bind(entry.degree)
        .bind(entry.fieldofstudy)
        .bind(entry.from)
        .bind(entry.to)
        .bind(entry.current)
        .bind(entry.description)
        .execute(&self.db)
        .await
        .context("insert education")?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_profile_by_user(user_id).await
    }

    async fn remove_education(&self, user_id: Uuid, entry_id: Uuid) -> anyhow::Result<Option<Profile>> {
        sqlx::query(
            r#"
            DELETE FROM educations e
            USING profiles p
            WHERE e.profile_id = p.id AND p.user_id = $1 AND e.id = $2
            "#,
        )
        .bind(user_id)
        .bind(entry_id)
        .execute(&self.db)
        .await
        .context("delete education")?;
        self.find_profile_by_user(user_id).await
    }
}

#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    user_id: Uuid,
    text: String,
    name: String,
    avatar: String,
    created_at: OffsetDateTime,
}

#[derive(FromRow)]
struct LikeRow {
    post_id: Uuid,
    #[sqlx(flatten)]
    like: Like,
}

#[derive(FromRow)]
struct CommentRow {
    post_id: Uuid,
    #[sqlx(flatten)]
    comment: Comment,
}

impl PgStore {
    async fn likes_of(&self, post_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, Vec<Like>>> {
        let rows = sqlx::query_as::<_, LikeRow>(
            r#"
            SELECT post_id, user_id
            FROM post_likes
            WHERE post_id = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.db)
        .await
        .context("load likes")?;
        Ok(group(rows.into_iter().map(|r| (r.post_id, r.like))))
    }

    async fn comments_of(&self, post_ids: &[Uuid]) -> anyhow::Result<HashMap<Uuid, Vec<Comment>>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT post_id, id, user_id, text, name, avatar, created_at
            FROM comments
            WHERE post_id = ANY($1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.db)
        .await
        .context("load comments")?;
        Ok(group(rows.into_iter().map(|r| (r.post_id, r.comment))))
    }

    async fn hydrate_posts(&self, rows: Vec<PostRow>) -> anyhow::Result<Vec<Post>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut likes = self.likes_of(&ids).await?;
        let mut comments = self.comments_of(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| Post {
                likes: likes.remove(&r.id).unwrap_or_default(),
                comments: comments.remove(&r.id).unwrap_or_default(),
                id: r.id,
                user: r.user_id,
                text: r.text,
                name: r.name,
                avatar: r.avatar,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn post_exists(&self, id: Uuid) -> anyhow::Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await
            .context("check post")?;
        Ok(exists)
    }

    async fn current_likes(&self, post_id: Uuid) -> anyhow::Result<Vec<Like>> {
        Ok(self.likes_of(&[post_id]).await?.remove(&post_id).unwrap_or_default())
    }

    async fn current_comments(&self, post_id: Uuid) -> anyhow::Result<Vec<Comment>> {
        Ok(self.comments_of(&[post_id]).await?.remove(&post_id).unwrap_or_default())
    }
}

#[async_trait]
impl PostRepo for PgStore {
    async fn create_post(&self, new: NewPost) -> anyhow::Result<Post> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (id, user_id, text, name, avatar)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, text, name, avatar, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user)
        .bind(new.text)
        .bind(new.name)
        .bind(new.avatar)
        .fetch_one(&self.db)
        .await
        .context("insert post")?;

        Ok(Post {
            id: row.id,
            user: row.user_id,
            text: row.text,
            name: row.name,
            avatar: row.avatar,
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: row.created_at,
        })
    }

    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, text, name, avatar, created_at
            FROM posts
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list posts")?;
        self.hydrate_posts(rows).await
    }

    async fn find_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            "SELECT id, user_id, text, name, avatar, created_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find post")?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.hydrate_posts(vec![row]).await?.pop())
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete post")?;
        Ok(res.rows_affected() > 0)
    }

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeChange> {
        // the (post_id, user_id) primary key makes this a no-op for a repeat like
        let res = sqlx::query(
            r#"
            INSERT INTO post_likes (post_id, user_id)
            SELECT id, $2 FROM posts WHERE id = $1
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.db)
        .await
        .context("insert like")?;

        if res.rows_affected() > 0 {
            return Ok(LikeChange::Updated(self.current_likes(post_id).await?));
        }
        if self.post_exists(post_id).await? {
            Ok(LikeChange::Unchanged)
        } else {
            Ok(LikeChange::PostMissing)
        }
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> anyhow::Result<LikeChange> {
        let res = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete like")?;

        if res.rows_affected() > 0 {
            return Ok(LikeChange::Updated(self.current_likes(post_id).await?));
        }
        if self.post_exists(post_id).await? {
            Ok(LikeChange::Unchanged)
        } else {
            Ok(LikeChange::PostMissing)
        }
    }

    async fn add_comment(&self, post_id: Uuid, new: NewComment) -> anyhow::Result<Option<Vec<Comment>>> {
        let res = sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, user_id, text, name, avatar)
            SELECT $1, id, $3, $4, $5, $6 FROM posts WHERE id = $2
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(post_id)
        .bind(new.user)
        .bind(new.text)
        .bind(new.name)
        .bind(new.avatar)
        .execute(&self.db)
        .await
        .context("insert comment")?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(self.current_comments(post_id).await?))
    }

    async fn remove_comment(&self, post_id: Uuid, comment_id: Uuid) -> anyhow::Result<Option<Vec<Comment>>> {
        sqlx::query("DELETE FROM comments WHERE post_id = $1 AND id = $2")
            .bind(post_id)
            .bind(comment_id)
            .execute(&self.db)
            .await
            .context("delete comment")?;

        if !self.post_exists(post_id).await? {
            return Ok(None);
        }
        Ok(Some(self.current_comments(post_id).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_keeps_row_order_per_key() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let grouped = group(vec![(a, 1), (b, 2), (a, 3)]);
        assert_eq!(grouped[&a], vec![1, 3]);
        assert_eq!(grouped[&b], vec![2]);
    }

    async fn store() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL for postgres tests");
        PgStore::connect(&url, 5).await.expect("connect")
    }

    async fn user(store: &PgStore) -> User {
        store
            .create_user(NewUser {
                name: "pg".into(),
                email: format!("{}@pg.test", Uuid::new_v4()),
                password_hash: "hash".into(),
                avatar: "avatar".into(),
            })
            .await
            .unwrap()
    }

    async fn post(store: &PgStore, author: &User) -> Post {
        store
            .create_post(NewPost {
                user: author.id,
                text: "hi".into(),
                name: author.name.clone(),
                avatar: author.avatar.clone(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn concurrent_likes_hit_the_primary_key_once() {
        let store = store().await;
        let author = user(&store).await;
        let p = post(&store, &author).await;

        let mut tasks = Vec::new();
        for _ in 0..8 {
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
        assert_eq!(store.remove_like(p.id, author.id).await.unwrap(), LikeChange::Updated(vec![]));
        assert_eq!(store.add_like(Uuid::new_v4(), author.id).await.unwrap(), LikeChange::PostMissing);
        store.delete_user(author.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn sub_entries_need_a_profile_and_are_removed_by_id() {
        use time::macros::date;

        let store = store().await;
        let owner = user(&store).await;
        let entry = Experience {
            id: Uuid::new_v4(),
            title: "Dev".into(),
            company: "Acme".into(),
            location: None,
            from: date!(2020 - 01 - 01),
            to: None,
            current: true,
            description: None,
        };
        assert!(store.push_experience(owner.id, entry.clone()).await.unwrap().is_none());

        store
            .upsert_profile(
                owner.id,
                ProfileFields {
                    status: "Dev".into(),
                    skills: vec!["rust".into()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let profile = store.push_experience(owner.id, entry.clone()).await.unwrap().unwrap();
        assert_eq!(profile.experience, vec![entry.clone()]);

        let profile = store.remove_experience(owner.id, Uuid::new_v4()).await.unwrap().unwrap();
        assert_eq!(profile.experience.len(), 1);
        let profile = store.remove_experience(owner.id, entry.id).await.unwrap().unwrap();
        assert!(profile.experience.is_empty());
        store.delete_user(owner.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn deleting_a_user_cascades_through_foreign_keys() {
        let store = store().await;
        let a = user(&store).await;
        let b = user(&store).await;
        let own = post(&store, &a).await;
        let other = post(&store, &b).await;
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
        assert!(store.find_post(own.id).await.unwrap().is_none());
        let other = store.find_post(other.id).await.unwrap().unwrap();
        assert!(other.likes.is_empty());
        assert!(other.comments.is_empty());
        store.delete_user(b.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn duplicate_email_maps_to_its_own_error() {
        let store = store().await;
        let existing = user(&store).await;
        let err = store
            .create_user(NewUser {
                name: "again".into(),
                email: existing.email.clone(),
                password_hash: "h".into(),
                avatar: "a".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CreateUserError::DuplicateEmail));
        store.delete_user(existing.id).await.unwrap();
    }
}
