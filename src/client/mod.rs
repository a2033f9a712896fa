//! Typed HTTP client for the API.
//!
//! The token lives in an explicit [`Session`]; `register` and `login` fill
//! it, authenticated calls send it as `x-auth-token`, and any 401 response
//! clears it.

mod session;

pub use session::Session;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::{dto::TokenResponse, extractors::TOKEN_HEADER, repo_types::User},
    posts::repo_types::{Comment, Like, Post},
    profiles::repo_types::Profile,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned {status}: {body}")]
    Api { status: u16, body: Value },
    #[error("not authenticated")]
    NotAuthenticated,
}

impl ClientError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_session(base_url, Session::new())
    }

    pub fn with_session(base_url: impl Into<String>, session: Session) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn public(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.session.token().ok_or(ClientError::NotAuthenticated)?;
        Ok(self.public(method, path).header(TOKEN_HEADER, token))
    }

    async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ClientError> {
        let res = req.send().await?;
        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("token rejected; clearing session");
            self.session.clear();
        }
        if !status.is_success() {
            let text = res.text().await?;
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.json::<T>().await?)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<(), ClientError> {
        let req = self
            .public(Method::POST, "/users")
            .json(&json!({ "name": name, "email": email, "password": password }));
        let TokenResponse { token } = self.execute(req).await?;
        self.session.set_token(token);
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), ClientError> {
        let req = self
            .public(Method::POST, "/auth")
            .json(&json!({ "email": email, "password": password }));
        let TokenResponse { token } = self.execute(req).await?;
        self.session.set_token(token);
        Ok(())
    }

    pub fn logout(&self) {
        self.session.clear();
    }

    pub async fn current_user(&self) -> Result<User, ClientError> {
        self.execute(self.authed(Method::GET, "/auth")?).await
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>, ClientError> {
        self.execute(self.authed(Method::GET, "/posts")?).await
    }

    pub async fn create_post(&self, text: &str) -> Result<Post, ClientError> {
        let req = self.authed(Method::POST, "/posts")?.json(&json!({ "text": text }));
        self.execute(req).await
    }

    pub async fn like_post(&self, post_id: Uuid) -> Result<Vec<Like>, ClientError> {
        self.execute(self.authed(Method::PUT, &format!("/posts/like/{post_id}"))?)
            .await
    }

    pub async fn unlike_post(&self, post_id: Uuid) -> Result<Vec<Like>, ClientError> {
        self.execute(self.authed(Method::PUT, &format!("/posts/unlike/{post_id}"))?)
            .await
    }

    pub async fn add_comment(&self, post_id: Uuid, text: &str) -> Result<Vec<Comment>, ClientError> {
        let req = self
            .authed(Method::POST, &format!("/posts/comment/{post_id}"))?
            .json(&json!({ "text": text }));
        self.execute(req).await
    }

    pub async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> Result<Vec<Comment>, ClientError> {
        let path = format!("/posts/comment/{post_id}/{comment_id}");
        self.execute(self.authed(Method::DELETE, &path)?).await
    }

    pub async fn my_profile(&self) -> Result<Profile, ClientError> {
        self.execute(self.authed(Method::GET, "/profile/me")?).await
    }

    /// Deletes the account and everything it owns, then forgets the token.
    pub async fn delete_account(&self) -> Result<(), ClientError> {
        let _: Value = self.execute(self.authed(Method::DELETE, "/profile")?).await?;
        self.session.clear();
        Ok(())
    }
}
