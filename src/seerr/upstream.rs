use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use super::config::UpstreamConfig;
use super::error::{GatewayError, NOT_CONFIGURED_MESSAGE};
use super::session::{LoginCredentials, LoginKind, SessionKey, SessionRegistry};
use crate::constants::{
    HEADER_SEERR_API_KEY, HEADER_SEERR_AUTH_TYPE, HEADER_SEERR_PASSWORD, HEADER_SEERR_SESSION,
    HEADER_SEERR_URL, HEADER_SEERR_USERNAME, UPSTREAM_API_KEY_HEADER,
};

/// Cookie obtained by a login while serving one inbound request.
///
/// Clones share the slot, so every follow-up call of that request (detail lookups, sibling
/// dashboard branches) sends the fresh cookie instead of the caller's stale one.
#[derive(Debug, Clone, Default)]
pub struct RenewedSession(Arc<Mutex<Option<String>>>);

impl RenewedSession {
    pub fn get(&self) -> Option<String> {
        self.0.lock().clone()
    }

    fn set(&self, cookie: &str) {
        *self.0.lock() = Some(cookie.to_string());
    }
}

/// Everything a caller hands the gateway to reach the upstream service on its behalf.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub session_cookie: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_type: Option<String>,
    pub renewed: RenewedSession,
}

fn non_empty(v: Option<&String>) -> Option<&str> {
    v.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl Credentials {
    /// Builds credentials from any header-like lookup (HTTP headers, JSON-RPC arguments).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_url: lookup(HEADER_SEERR_URL),
            api_key: lookup(HEADER_SEERR_API_KEY),
            session_cookie: lookup(HEADER_SEERR_SESSION),
            username: lookup(HEADER_SEERR_USERNAME),
            password: lookup(HEADER_SEERR_PASSWORD),
            auth_type: lookup(HEADER_SEERR_AUTH_TYPE),
            renewed: RenewedSession::default(),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        non_empty(self.base_url.as_ref())
    }

    pub fn api_key(&self) -> Option<&str> {
        non_empty(self.api_key.as_ref())
    }

    pub fn session_cookie(&self) -> Option<&str> {
        non_empty(self.session_cookie.as_ref())
    }

    pub fn auth_type(&self) -> Option<&str> {
        non_empty(self.auth_type.as_ref())
    }

    /// Username/password pair that enables auto-login. Passwords are not trimmed.
    pub fn login(&self) -> Option<LoginCredentials> {
        let username = non_empty(self.username.as_ref())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some(LoginCredentials {
            username: username.to_string(),
            password: password.to_string(),
            kind: LoginKind::from_auth_type(self.auth_type().unwrap_or_default()),
        })
    }

    pub fn session_key(&self) -> Option<SessionKey> {
        let base_url = self.base_url()?;
        let login = self.login()?;
        Some(SessionKey::new(&login, base_url))
    }
}

/// Outcome of one forwarded call. Never an error: failures are described by the fields.
#[derive(Debug, Clone, Default)]
pub struct UpstreamResult {
    pub success: bool,
    /// `None` when no response was received (configuration or transport failure).
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub message: Option<String>,
    pub headers: Option<HeaderMap>,
    /// Session cookie obtained by an auto-login while serving this call.
    pub session_cookie: Option<String>,
}

impl UpstreamResult {
    pub fn not_configured() -> Self {
        Self {
            message: Some(NOT_CONFIGURED_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    fn network_error(message: String) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }

    fn no_content(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            success: true,
            status: Some(status.as_u16()),
            headers: Some(headers),
            ..Self::default()
        }
    }

    fn ok(status: StatusCode, data: Value, headers: HeaderMap) -> Self {
        Self {
            success: true,
            status: Some(status.as_u16()),
            data: Some(data),
            headers: Some(headers),
            ..Self::default()
        }
    }

    fn failure(status: StatusCode, message: String, headers: HeaderMap) -> Self {
        Self {
            success: false,
            status: Some(status.as_u16()),
            message: Some(message),
            headers: Some(headers),
            ..Self::default()
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(StatusCode::UNAUTHORIZED.as_u16())
    }

    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(fallback)
    }

    /// Status to report when this result is a failure. A 2xx with an unreadable body is a bad gateway.
    pub fn failure_status(&self) -> Option<u16> {
        self.status.map(|s| if (200..300).contains(&s) { 502 } else { s })
    }

    /// Payload of a successful call (`None` for no-content), or the failure as an error.
    pub fn into_data(self) -> Result<Option<Value>, GatewayError> {
        if self.success {
            return Ok(self.data);
        }
        Err(GatewayError::Upstream {
            status: self.failure_status(),
            message: self
                .message
                .unwrap_or_else(|| "upstream request failed".to_string()),
        })
    }
}

pub(crate) fn build_upstream_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let rel = path.trim_start_matches('/');
    if base.contains("://") {
        format!("{base}/{rel}")
    } else {
        format!("https://{base}/{rel}")
    }
}

fn status_line_message(status: StatusCode) -> String {
    format!(
        "request failed: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    )
    .trim_end()
    .to_string()
}

fn error_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|k| body.get(*k))
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn format_reqwest_error_for_logs(e: &reqwest::Error) -> String {
    use std::error::Error;
    let mut msg = e.to_string();
    let mut src = e.source();
    while let Some(s) = src {
        let next = s.to_string();
        if !msg.contains(&next) {
            msg.push_str(": ");
            msg.push_str(&next);
        }
        src = s.source();
    }
    msg
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(cfg: &UpstreamConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            // Avoid hanging forever on broken upstream TCP handshakes.
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            request_timeout: Duration::from_secs(cfg.request_timeout_seconds.max(1)),
        })
    }

    /// One outbound call, no session handling. The response is always classified, never raised.
    pub async fn send(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
        api_key: Option<&str>,
        cookie: Option<&str>,
    ) -> UpstreamResult {
        let url = build_upstream_url(base_url, path);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(k) = api_key {
            if let Ok(hv) = HeaderValue::from_str(k) {
                headers.insert(HeaderName::from_static(UPSTREAM_API_KEY_HEADER), hv);
            }
        }
        if let Some(c) = cookie {
            if let Ok(hv) = HeaderValue::from_str(c) {
                headers.insert(COOKIE, hv);
            }
        }

        let mut req = self
            .client
            .request(method.clone(), url)
            .headers(headers)
            .timeout(self.request_timeout);
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                let msg = format_reqwest_error_for_logs(&e);
                log::warn!("upstream {method} {path} failed: {msg}");
                return UpstreamResult::network_error(msg);
            }
        };

        let status = resp.status();
        let headers = resp.headers().clone();
        if status == StatusCode::NO_CONTENT {
            return UpstreamResult::no_content(status, headers);
        }
        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                let msg = format_reqwest_error_for_logs(&e);
                log::warn!("upstream {method} {path} body read failed: {msg}");
                return UpstreamResult::network_error(msg);
            }
        };

        if status.is_success() {
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return UpstreamResult::no_content(status, headers);
            }
            return match serde_json::from_slice::<Value>(&bytes) {
                Ok(v) => UpstreamResult::ok(status, v, headers),
                Err(e) => {
                    log::warn!("upstream {method} {path} returned unreadable json: {e}");
                    UpstreamResult::failure(status, status_line_message(status), headers)
                }
            };
        }

        let message = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or_else(|| status_line_message(status));
        log::debug!("upstream {method} {path} returned {status}: {message}");
        UpstreamResult::failure(status, message, headers)
    }

    /// Forwards a call for a caller. On a 401 with login credentials present, waits for a
    /// (possibly shared) login and retries exactly once with the fresh cookie.
    ///
    /// Cookie precedence: one renewed earlier in the same request, then the caller's own,
    /// then the last one cached for the same credentials.
    pub async fn forward(
        &self,
        sessions: &SessionRegistry,
        creds: &Credentials,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> UpstreamResult {
        let Some(base_url) = creds.base_url() else {
            return UpstreamResult::not_configured();
        };
        let key = creds.session_key();
        let cookie = creds
            .renewed
            .get()
            .or_else(|| creds.session_cookie().map(str::to_string))
            .or_else(|| key.as_ref().and_then(|k| sessions.cached_cookie(k)));

        let first = self
            .send(
                base_url,
                method.clone(),
                path,
                body,
                creds.api_key(),
                cookie.as_deref(),
            )
            .await;
        if !first.is_unauthorized() {
            return first;
        }
        let (Some(key), Some(login)) = (key, creds.login()) else {
            return first;
        };

        log::info!(
            "upstream {path} returned 401; resolving session for {}",
            key.identity
        );
        let Some(fresh) = sessions.resolve(self, key, login).await else {
            return first;
        };
        creds.renewed.set(&fresh);

        let mut retried = self
            .send(base_url, method, path, body, creds.api_key(), Some(&fresh))
            .await;
        if retried.is_unauthorized() {
            log::warn!("upstream {path} still unauthorized after login; giving up");
        }
        retried.session_cookie = Some(fresh);
        retried
    }
}
