use serde::{Deserialize, Serialize};

use crate::constants::{GATEWAY_DEFAULT_HOST, GATEWAY_DEFAULT_PORT, GATEWAY_USER_AGENT};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: GATEWAY_DEFAULT_HOST.to_string(),
            port: GATEWAY_DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Total budget for one upstream call, login handshakes included.
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: GATEWAY_USER_AGENT.to_string(),
        }
    }
}

/// Page sizes for the dashboard lists that are fetched with an explicit `take`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverConfig {
    pub recently_added_take: u32,
    pub recent_requests_take: u32,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            recently_added_take: 20,
            recent_requests_take: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub discover: DiscoverConfig,
}

impl AppConfig {
    pub fn default_config() -> Self {
        Self::default()
    }
}
