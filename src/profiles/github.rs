use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::GithubConfig;

const REPO_COUNT: &str = "5";

/// Source of a user's public repositories.
#[async_trait]
pub trait RepoDirectory: Send + Sync {
    /// The user's most recently created repositories, as returned upstream.
    /// `None` when the user is unknown there.
    async fn latest_repos(&self, username: &str) -> anyhow::Result<Option<serde_json::Value>>;
}

pub(crate) fn is_valid_username(name: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,38}$").unwrap();
    }
    USERNAME_RE.is_match(name)
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(cfg: &GithubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(10))
            .build()
            .context("build github http client")?;
        Ok(Self {
            http,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
        })
    }
}

#[async_trait]
impl RepoDirectory for GithubClient {
    async fn latest_repos(&self, username: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let url = format!("{}/users/{}/repos", self.api_url, username);
        let mut req = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .query(&[("per_page", REPO_COUNT), ("sort", "created"), ("direction", "desc")]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let res = req.send().await.context("github repos request")?;
        let status = res.status();
        if !status.is_success() {
            warn!(%status, username, "github lookup failed");
            return Ok(None);
        }
        let repos = res
            .json::<serde_json::Value>()
            .await
            .context("decode github repos")?;
        debug!(username, "github repos fetched");
        Ok(Some(repos))
    }
}
