//! Dashboard lists and the combined `/discover` payload.

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::JoinError;

use super::client::SeerrClient;
use super::error::{GatewayError, Result};
use super::media::{hydrate_items, hydrate_requests, normalize_items, MediaKind};
use super::upstream::Credentials;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload {
    pub recent: Option<Value>,
    pub trending: Option<Value>,
    pub popular_movies: Option<Value>,
    pub popular_tv: Option<Value>,
    pub recent_requests: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Recent,
    Trending,
    PopularMovies,
    PopularTv,
    RecentRequests,
}

impl Branch {
    pub const ALL: [Branch; 5] = [
        Branch::Recent,
        Branch::Trending,
        Branch::PopularMovies,
        Branch::PopularTv,
        Branch::RecentRequests,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Branch::Recent => "recent",
            Branch::Trending => "trending",
            Branch::PopularMovies => "popularMovies",
            Branch::PopularTv => "popularTv",
            Branch::RecentRequests => "recentRequests",
        }
    }

    pub async fn run(self, client: &SeerrClient, creds: &Credentials) -> Result<Value> {
        match self {
            Branch::Recent => recently_added(client, creds).await,
            Branch::Trending => trending(client, creds).await,
            Branch::PopularMovies => popular_movies(client, creds).await,
            Branch::PopularTv => popular_tv(client, creds).await,
            Branch::RecentRequests => recent_requests(client, creds).await,
        }
    }
}

impl DashboardPayload {
    fn slot_mut(&mut self, branch: Branch) -> &mut Option<Value> {
        match branch {
            Branch::Recent => &mut self.recent,
            Branch::Trending => &mut self.trending,
            Branch::PopularMovies => &mut self.popular_movies,
            Branch::PopularTv => &mut self.popular_tv,
            Branch::RecentRequests => &mut self.recent_requests,
        }
    }
}

/// Replaces `results` on the upstream page object, keeping paging fields.
fn with_results(page: Option<Value>, results: Vec<Value>) -> Value {
    match page {
        Some(Value::Object(mut map)) => {
            map.insert("results".to_string(), Value::Array(results));
            Value::Object(map)
        }
        _ => json!({ "results": results }),
    }
}

fn results_of(page: &Option<Value>) -> &Value {
    page.as_ref()
        .and_then(|p| p.get("results"))
        .unwrap_or(&Value::Null)
}

async fn normalized_list(
    client: &SeerrClient,
    creds: &Credentials,
    path: &str,
    default_kind: MediaKind,
) -> Result<Value> {
    let page = client.get(creds, path).await.into_data()?;
    let results = normalize_items(results_of(&page), default_kind);
    Ok(with_results(page, results))
}

pub async fn recently_added(client: &SeerrClient, creds: &Credentials) -> Result<Value> {
    let path = format!(
        "/api/v1/media?filter=allavailable&take={}&skip=0&sort=mediaAdded",
        client.cfg.discover.recently_added_take
    );
    let page = client.get(creds, &path).await.into_data()?;
    let results = hydrate_items(client, creds, results_of(&page), MediaKind::Movie).await;
    Ok(with_results(page, results))
}

pub async fn trending(client: &SeerrClient, creds: &Credentials) -> Result<Value> {
    normalized_list(client, creds, "/api/v1/discover/trending", MediaKind::Movie).await
}

pub async fn popular_movies(client: &SeerrClient, creds: &Credentials) -> Result<Value> {
    normalized_list(client, creds, "/api/v1/discover/movies", MediaKind::Movie).await
}

pub async fn popular_tv(client: &SeerrClient, creds: &Credentials) -> Result<Value> {
    normalized_list(client, creds, "/api/v1/discover/tv", MediaKind::Tv).await
}

pub async fn recent_requests(client: &SeerrClient, creds: &Credentials) -> Result<Value> {
    let path = format!(
        "/api/v1/request?take={}&skip=0&sort=added&filter=all",
        client.cfg.discover.recent_requests_take
    );
    let page = client.get(creds, &path).await.into_data()?;
    let results = hydrate_requests(client, creds, results_of(&page)).await;
    Ok(with_results(page, results))
}

fn settle(branch: Branch, joined: std::result::Result<Result<Value>, JoinError>) -> Option<Value> {
    match joined {
        Ok(Ok(v)) => Some(v),
        Ok(Err(e)) => {
            log::warn!("discover branch {} failed: {e}", branch.name());
            None
        }
        Err(e) => {
            log::error!("discover branch {} aborted: {e}", branch.name());
            None
        }
    }
}

/// Runs every dashboard branch concurrently. A failed branch leaves its slot `null`.
pub async fn discover(client: &SeerrClient, creds: &Credentials) -> Result<Value> {
    if creds.base_url().is_none() {
        return Err(GatewayError::NotConfigured);
    }
    let handles = Branch::ALL.map(|branch| {
        let client = client.clone();
        let creds = creds.clone();
        (
            branch,
            tokio::spawn(async move { branch.run(&client, &creds).await }),
        )
    });

    let settled = join_all(
        handles
            .into_iter()
            .map(|(branch, handle)| async move { (branch, settle(branch, handle.await)) }),
    )
    .await;

    let mut payload = DashboardPayload::default();
    for (branch, value) in settled {
        *payload.slot_mut(branch) = value;
    }
    Ok(serde_json::to_value(payload)?)
}
