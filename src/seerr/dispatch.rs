//! Maps `(verb, path)` to gateway operations. This is the only place that knows the gateway's
//! own route table; adapters translate their transport into a [`GatewayRequest`] and back.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::{json, Value};

use super::client::SeerrClient;
use super::discover;
use super::error::{GatewayError, NOT_CONFIGURED_MESSAGE};
use super::media::{detail_path, normalize_items, MediaKind};
use super::session::{
    perform_login, session_cookie_from_headers, set_cookie_values, LoginCredentials, LoginKind,
    SessionKey,
};
use super::upstream::{Credentials, UpstreamResult};
use crate::constants::GATEWAY_MOUNT_PREFIX;

pub const NOT_FOUND_MESSAGE: &str = "Not Found";

#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub credentials: Credentials,
    pub body: Option<Value>,
}

impl GatewayRequest {
    pub fn new(method: Method, path: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            credentials,
            body: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Value,
    /// Cookie the caller should present as its session on later calls.
    pub session_cookie: Option<String>,
    /// Upstream `Set-Cookie` values relayed verbatim (login routes only).
    pub set_cookie: Vec<String>,
}

impl GatewayResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            session_cookie: None,
            set_cookie: Vec::new(),
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    pub fn message(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "message": message }))
    }

    pub fn not_found() -> Self {
        Self::message(404, NOT_FOUND_MESSAGE)
    }

    fn from_error(e: &GatewayError) -> Self {
        Self::message(e.status(), &e.to_string())
    }

    fn from_list(result: Result<Value, GatewayError>) -> Self {
        match result {
            Ok(v) => Self::ok(v),
            Err(e) => Self::from_error(&e),
        }
    }

    /// Plain forward: upstream payload on success, upstream status and message on failure.
    /// A success without payload becomes `200 {"success": true}`, never a bodiless 204.
    fn forwarded(res: UpstreamResult) -> Self {
        if res.success {
            return match res.data {
                Some(data) => Self::json(res.status.unwrap_or(200), data),
                None => Self::ok(json!({ "success": true })),
            };
        }
        Self::message(
            res.failure_status().unwrap_or(502),
            res.message_or("upstream request failed"),
        )
    }

    fn acknowledged(res: UpstreamResult) -> Self {
        if res.success {
            return Self::ok(json!({ "success": true }));
        }
        Self::forwarded(res)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Radarr,
    Sonarr,
}

impl Service {
    fn as_str(self) -> &'static str {
        match self {
            Service::Radarr => "radarr",
            Service::Sonarr => "sonarr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Approve,
    Decline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    RecentlyAdded,
    Trending,
    PopularMovies,
    PopularTv,
    RecentRequests,
    Discover,
    Search,
    AuthMe,
    Details { kind: &'a str, id: &'a str },
    Settings { service: Service, profiles_of: Option<&'a str> },
    CreateRequest,
    UpdateRequest { id: &'a str, action: RequestAction },
    DeleteRequest { id: &'a str },
    Login,
}

fn service(name: &str) -> Option<Service> {
    match name {
        "radarr" => Some(Service::Radarr),
        "sonarr" => Some(Service::Sonarr),
        _ => None,
    }
}

pub fn match_route<'a>(method: &Method, path: &'a str) -> Option<Route<'a>> {
    let path = path.strip_prefix(GATEWAY_MOUNT_PREFIX).unwrap_or(path);
    let segments: Vec<&'a str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let route = match (method.as_str(), segments.as_slice()) {
        ("GET", &["recently-added"]) => Route::RecentlyAdded,
        ("GET", &["trending"]) => Route::Trending,
        ("GET", &["popular-movies"]) => Route::PopularMovies,
        ("GET", &["popular-tv"]) => Route::PopularTv,
        ("GET", &["recent-requests"]) => Route::RecentRequests,
        ("GET", &["discover"]) => Route::Discover,
        ("GET", &["search"]) => Route::Search,
        ("GET", &["auth", "me"]) => Route::AuthMe,
        ("GET", &["details", kind, id]) => Route::Details { kind, id },
        ("GET", &["settings", name]) => Route::Settings {
            service: service(name)?,
            profiles_of: None,
        },
        ("GET", &["settings", name, id, "profiles"]) => Route::Settings {
            service: service(name)?,
            profiles_of: Some(id),
        },
        ("POST", &["request"]) => Route::CreateRequest,
        ("POST", &["request", id, "approve"]) => Route::UpdateRequest {
            id,
            action: RequestAction::Approve,
        },
        ("POST", &["request", id, "decline"]) => Route::UpdateRequest {
            id,
            action: RequestAction::Decline,
        },
        ("DELETE", &["request", id]) => Route::DeleteRequest { id },
        ("POST", &["test-connection"]) | ("POST", &["login"]) => Route::Login,
        _ => return None,
    };
    Some(route)
}

fn query_value<'a>(query: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    query.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Handles one inbound request. Never fails: every outcome is a response.
pub async fn dispatch(client: &SeerrClient, request: GatewayRequest) -> GatewayResponse {
    let Some(route) = match_route(&request.method, &request.path) else {
        return GatewayResponse::not_found();
    };
    let creds = &request.credentials;

    let mut response = match route {
        Route::Login => return login(client, &request).await,
        Route::Search if query_value(&request.query, "query").is_none() => {
            return GatewayResponse::ok(json!([]));
        }
        _ if creds.base_url().is_none() => {
            return GatewayResponse::message(400, NOT_CONFIGURED_MESSAGE);
        }
        Route::RecentlyAdded => {
            GatewayResponse::from_list(discover::recently_added(client, creds).await)
        }
        Route::Trending => GatewayResponse::from_list(discover::trending(client, creds).await),
        Route::PopularMovies => {
            GatewayResponse::from_list(discover::popular_movies(client, creds).await)
        }
        Route::PopularTv => GatewayResponse::from_list(discover::popular_tv(client, creds).await),
        Route::RecentRequests => {
            GatewayResponse::from_list(discover::recent_requests(client, creds).await)
        }
        Route::Discover => GatewayResponse::from_list(discover::discover(client, creds).await),
        Route::Search => search(client, creds, &request.query).await,
        Route::AuthMe => {
            let res = client.get(creds, "/api/v1/auth/me").await;
            if res.success {
                GatewayResponse::forwarded(res)
            } else {
                GatewayResponse::message(401, res.message_or("Unauthorized"))
            }
        }
        Route::Details { kind, id } => match MediaKind::parse(kind) {
            Some(kind) => {
                let path = detail_path(kind, id);
                let res = client.get(creds, &path).await;
                if res.success {
                    GatewayResponse::forwarded(res)
                } else {
                    GatewayResponse::message(404, res.message_or(NOT_FOUND_MESSAGE))
                }
            }
            None => GatewayResponse::not_found(),
        },
        Route::Settings {
            service,
            profiles_of,
        } => {
            let path = match profiles_of {
                Some(id) => format!(
                    "/api/v1/settings/{}/{}/profiles",
                    service.as_str(),
                    urlencoding::encode(id)
                ),
                None => format!("/api/v1/settings/{}", service.as_str()),
            };
            GatewayResponse::forwarded(client.get(creds, &path).await)
        }
        Route::CreateRequest => match request.body.as_ref() {
            Some(body @ Value::Object(_)) => GatewayResponse::forwarded(
                client
                    .forward(creds, Method::POST, "/api/v1/request", Some(body))
                    .await,
            ),
            _ => GatewayResponse::message(400, "Request body must be a JSON object"),
        },
        Route::UpdateRequest { id, action } => {
            let verb = match action {
                RequestAction::Approve => "approve",
                RequestAction::Decline => "decline",
            };
            let path = format!("/api/v1/request/{}/{verb}", urlencoding::encode(id));
            GatewayResponse::acknowledged(client.forward(creds, Method::POST, &path, None).await)
        }
        Route::DeleteRequest { id } => {
            let path = format!("/api/v1/request/{}", urlencoding::encode(id));
            GatewayResponse::acknowledged(client.forward(creds, Method::DELETE, &path, None).await)
        }
    };

    // Only a login performed for this request hands a cookie back.
    response.session_cookie = creds.renewed.get();
    response
}

async fn search(
    client: &SeerrClient,
    creds: &Credentials,
    query: &HashMap<String, String>,
) -> GatewayResponse {
    let Some(term) = query_value(query, "query") else {
        return GatewayResponse::ok(json!([]));
    };
    let page = query_value(query, "page")
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(1);
    let path = format!(
        "/api/v1/search?query={}&page={page}",
        urlencoding::encode(term)
    );
    match client.get(creds, &path).await.into_data() {
        Ok(data) => {
            let results = data
                .as_ref()
                .and_then(|d| d.get("results"))
                .unwrap_or(&Value::Null);
            GatewayResponse::ok(Value::Array(normalize_items(results, MediaKind::Movie)))
        }
        Err(e) => GatewayResponse::from_error(&e),
    }
}

/// `POST /test-connection` and `POST /login`: checks credentials against the upstream and, for
/// user logins, hands the new session cookie back to the caller.
async fn login(client: &SeerrClient, request: &GatewayRequest) -> GatewayResponse {
    let creds = &request.credentials;
    let body = request.body.as_ref().unwrap_or(&Value::Null);
    let field = |k: &str| {
        body.get(k)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    let Some(base_url) = field("url").or_else(|| creds.base_url()) else {
        return GatewayResponse::message(400, NOT_CONFIGURED_MESSAGE);
    };
    let auth_type = field("authType")
        .or_else(|| creds.auth_type())
        .unwrap_or("api-key");

    let (kind, username) = match auth_type {
        "api-key" => {
            let api_key = field("apiKey").or_else(|| creds.api_key());
            let res = client
                .upstream
                .send(base_url, Method::GET, "/api/v1/auth/me", None, api_key, None)
                .await;
            return login_response(client, None, res);
        }
        "local-user" => (
            LoginKind::Local,
            field("email")
                .or_else(|| field("username"))
                .or(creds.username.as_deref()),
        ),
        "jellyfin-user" => (
            LoginKind::Jellyfin,
            field("username").or(creds.username.as_deref()),
        ),
        _ => return GatewayResponse::message(400, "Unsupported auth type"),
    };

    let username = username.map(str::trim).filter(|u| !u.is_empty());
    let password = body
        .get("password")
        .and_then(|v| v.as_str())
        .or(creds.password.as_deref())
        .filter(|p| !p.is_empty());
    let (Some(username), Some(password)) = (username, password) else {
        return GatewayResponse::message(400, "Username and password are required");
    };
    let login = LoginCredentials {
        username: username.to_string(),
        password: password.to_string(),
        kind,
    };

    let res = perform_login(&client.upstream, base_url, &login).await;
    let key = SessionKey::new(&login, base_url);
    login_response(client, Some(key), res)
}

fn login_response(
    client: &SeerrClient,
    key: Option<SessionKey>,
    res: UpstreamResult,
) -> GatewayResponse {
    if !res.success {
        let status = res.failure_status().unwrap_or(500);
        log::info!("connection test failed with {status}");
        return GatewayResponse::message(status, res.message_or("Connection failed"));
    }

    let headers = res.headers.as_ref();
    let session_cookie = headers.and_then(session_cookie_from_headers);
    let set_cookie = headers.map(set_cookie_values).unwrap_or_default();
    if let (Some(key), Some(cookie)) = (key, session_cookie.as_ref()) {
        client.sessions.remember(key, cookie.clone());
    }

    GatewayResponse {
        status: 200,
        body: json!({ "success": true, "user": res.data.unwrap_or(Value::Null) }),
        session_cookie,
        set_cookie,
    }
}
