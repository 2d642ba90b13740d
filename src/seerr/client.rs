use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;

use super::config::AppConfig;
use super::error::GatewayError;
use super::session::SessionRegistry;
use super::upstream::{Credentials, UpstreamClient, UpstreamResult};

/// Transport-neutral gateway core shared by every adapter.
///
/// The session registry lives here rather than in a global so each gateway instance (and each
/// test) owns its own login deduplication.
#[derive(Clone)]
pub struct SeerrClient {
    pub cfg: Arc<AppConfig>,
    pub upstream: UpstreamClient,
    pub sessions: SessionRegistry,
}

impl SeerrClient {
    pub fn new(cfg: AppConfig) -> Result<Self, GatewayError> {
        let upstream = UpstreamClient::new(&cfg.upstream)?;
        Ok(Self {
            cfg: Arc::new(cfg),
            upstream,
            sessions: SessionRegistry::new(),
        })
    }

    pub async fn forward(
        &self,
        creds: &Credentials,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> UpstreamResult {
        self.upstream
            .forward(&self.sessions, creds, method, path, body)
            .await
    }

    pub async fn get(&self, creds: &Credentials, path: &str) -> UpstreamResult {
        self.forward(creds, Method::GET, path, None).await
    }
}
