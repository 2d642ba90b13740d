//! Upstream session cookies and login deduplication.
//!
//! A login for one [`SessionKey`] is registered, started and shared inside a single critical
//! section, so callers that hit a 401 at the same moment all wait on the same attempt. The
//! pending entry is cleared as soon as that attempt settles, whatever its outcome.

use std::collections::HashMap;
use std::sync::Arc;

use cookie::Cookie;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::Method;
use serde_json::{json, Value};

use super::upstream::{UpstreamClient, UpstreamResult};

/// Upstream login flavour. Local accounts log in with an email, federated ones with a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginKind {
    Local,
    Jellyfin,
}

impl LoginKind {
    pub fn from_auth_type(auth_type: &str) -> Self {
        match auth_type.trim().to_ascii_lowercase().as_str() {
            "local" | "local-user" => LoginKind::Local,
            _ => LoginKind::Jellyfin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoginKind::Local => "local",
            LoginKind::Jellyfin => "jellyfin",
        }
    }

    pub fn endpoint(self) -> &'static str {
        match self {
            LoginKind::Local => "/api/v1/auth/local",
            LoginKind::Jellyfin => "/api/v1/auth/jellyfin",
        }
    }

    fn body(self, username: &str, password: &str) -> Value {
        match self {
            LoginKind::Local => json!({ "email": username, "password": password }),
            LoginKind::Jellyfin => json!({ "username": username, "password": password }),
        }
    }
}

#[derive(Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
    pub kind: LoginKind,
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// One logical upstream session: who is logging in, with which secret, and where.
///
/// The password digest keeps a cached cookie out of reach of callers that only know the
/// username.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub identity: String,
    pub base_url: String,
    credential: String,
}

fn credential_digest(login: &LoginCredentials) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(login.kind.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(login.username.as_bytes());
    hasher.update([0]);
    hasher.update(login.password.as_bytes());
    hex::encode(hasher.finalize())
}

impl SessionKey {
    pub fn new(login: &LoginCredentials, base_url: &str) -> Self {
        Self {
            identity: format!("{}:{}", login.kind.as_str(), login.username),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            credential: credential_digest(login),
        }
    }
}

type PendingLogin = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Default)]
pub struct SessionState {
    /// Most recent cookie obtained for this key.
    pub cookie: Option<String>,
    pending: Option<PendingLogin>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<SessionKey, SessionState>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_cookie(&self, key: &SessionKey) -> Option<String> {
        self.inner.lock().get(key).and_then(|s| s.cookie.clone())
    }

    /// Number of logins currently in flight.
    pub fn pending_len(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|s| s.pending.is_some())
            .count()
    }

    pub fn remember(&self, key: SessionKey, cookie: String) {
        self.inner.lock().entry(key).or_default().cookie = Some(cookie);
    }

    /// Returns the login attempt for `key`, joining one already in flight or starting a new one.
    ///
    /// Registration happens before this returns, so it must be called before the caller's first
    /// suspension point after observing the 401.
    pub fn resolve(
        &self,
        client: &UpstreamClient,
        key: SessionKey,
        login: LoginCredentials,
    ) -> PendingLogin {
        let mut map = self.inner.lock();
        let state = map.entry(key.clone()).or_default();
        if let Some(pending) = state.pending.as_ref() {
            log::debug!("joining in-flight login for {}", key.identity);
            return pending.clone();
        }

        log::info!("starting upstream login for {}", key.identity);
        let registry = self.clone();
        let client = client.clone();
        // Runs detached so the entry is cleared even if every waiter is dropped.
        let task = tokio::spawn(async move {
            let cookie = login_for_cookie(&client, &key.base_url, &login).await;
            registry.settle(&key, cookie.clone());
            cookie
        });
        let pending = async move { task.await.ok().flatten() }.boxed().shared();
        state.pending = Some(pending.clone());
        pending
    }

    fn settle(&self, key: &SessionKey, cookie: Option<String>) {
        let mut map = self.inner.lock();
        let Some(state) = map.get_mut(key) else {
            return;
        };
        state.pending = None;
        if cookie.is_some() {
            state.cookie = cookie;
        }
        if state.cookie.is_none() {
            map.remove(key);
        }
    }
}

/// Posts the login for `login.kind`. The raw result is returned for callers that relay it.
pub async fn perform_login(
    client: &UpstreamClient,
    base_url: &str,
    login: &LoginCredentials,
) -> UpstreamResult {
    let body = login.kind.body(&login.username, &login.password);
    client
        .send(
            base_url,
            Method::POST,
            login.kind.endpoint(),
            Some(&body),
            None,
            None,
        )
        .await
}

async fn login_for_cookie(
    client: &UpstreamClient,
    base_url: &str,
    login: &LoginCredentials,
) -> Option<String> {
    let res = perform_login(client, base_url, login).await;
    if !res.success {
        log::warn!(
            "upstream {} login for {} failed: {}",
            login.kind.as_str(),
            login.username,
            res.message_or("unknown error")
        );
        return None;
    }
    let cookie = res.headers.as_ref().and_then(session_cookie_from_headers);
    if cookie.is_none() {
        log::warn!("upstream login succeeded without a session cookie");
    }
    cookie
}

/// Collapses `Set-Cookie` headers into a value usable as a request `Cookie` header.
pub fn session_cookie_from_headers(headers: &HeaderMap) -> Option<String> {
    let pairs: Vec<String> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| match Cookie::parse(raw) {
            Ok(c) => Some(format!("{}={}", c.name(), c.value())),
            Err(e) => {
                log::debug!("ignoring unparseable set-cookie: {e}");
                None
            }
        })
        .collect();
    if pairs.is_empty() {
        return None;
    }
    Some(pairs.join("; "))
}

/// Raw `Set-Cookie` values, for relaying to the original caller.
pub fn set_cookie_values(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}
