use crate::config::{AppConfig, StoreBackend};
use crate::profiles::github::{GithubClient, RepoDirectory};
use crate::store::{MemoryStore, PgStore, Store};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub github: Arc<dyn RepoDirectory>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL is not set")?;
                Arc::new(PgStore::connect(url, config.db_max_connections).await?) as Arc<dyn Store>
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new()) as Arc<dyn Store>
            }
        };

        let github = Arc::new(GithubClient::new(&config.github)?) as Arc<dyn RepoDirectory>;

        Ok(Self {
            store,
            config,
            github,
        })
    }

    pub fn from_parts(
        store: Arc<dyn Store>,
        config: Arc<AppConfig>,
        github: Arc<dyn RepoDirectory>,
    ) -> Self {
        Self {
            store,
            config,
            github,
        }
    }

    /// In-memory store, fixed JWT settings and a canned GitHub directory
    /// that only knows `octocat`.
    pub fn fake() -> Self {
        use async_trait::async_trait;
        use serde_json::json;

        struct FakeGithub;
        #[async_trait]
        impl RepoDirectory for FakeGithub {
            async fn latest_repos(&self, username: &str) -> anyhow::Result<Option<serde_json::Value>> {
                if username != "octocat" {
                    return Ok(None);
                }
                Ok(Some(json!([
                    { "name": "hello-world", "html_url": "https://github.com/octocat/hello-world" },
                    { "name": "spoon-knife", "html_url": "https://github.com/octocat/spoon-knife" }
                ])))
            }
        }

        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
                ttl_seconds: 300,
            },
            github: crate::config::GithubConfig {
                api_url: "https://fake.local".into(),
                token: None,
                user_agent: "test".into(),
            },
        });

        Self::from_parts(
            Arc::new(MemoryStore::new()),
            config,
            Arc::new(FakeGithub),
        )
    }
}
