use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{Json, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};

use super::client::SeerrClient;
use super::dispatch::{dispatch, GatewayRequest, GatewayResponse};
use super::upstream::Credentials;
use crate::constants::{HEADER_REQUEST_ID, HEADER_SEERR_SESSION};

pub fn build_router(client: SeerrClient) -> Router {
    Router::new()
        .route("/health", get(health))
        .fallback(handle)
        .with_state(client)
}

pub async fn serve_in_background(client: SeerrClient) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", client.cfg.listen.host, client.cfg.listen.port).parse()?;

    let app = build_router(client);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("seerr gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutdown requested");
}

async fn health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Query parameters as a flat map. A query the form decoder rejects counts as empty, so the
/// request still reaches the dispatcher and gets a JSON answer.
fn query_map(uri: &Uri) -> HashMap<String, String> {
    match Query::<HashMap<String, String>>::try_from_uri(uri) {
        Ok(Query(q)) => q,
        Err(e) => {
            log::debug!("ignoring unreadable query on {}: {e}", uri.path());
            HashMap::new()
        }
    }
}

fn request_id(headers: &HeaderMap) -> String {
    header_text(headers, HEADER_REQUEST_ID)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

async fn handle(
    State(client): State<SeerrClient>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = request_id(&headers);
    let path = uri.path().to_string();

    let body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(v) => Some(v),
            Err(e) => {
                log::debug!("{request_id} {method} {path}: invalid json body: {e}");
                let resp = GatewayResponse::message(400, "Invalid JSON body");
                return into_http_response(resp, &request_id);
            }
        }
    };

    let started = Instant::now();
    let request = GatewayRequest {
        method: method.clone(),
        path: path.clone(),
        query: query_map(&uri),
        credentials: Credentials::from_lookup(|name| header_text(&headers, name)),
        body,
    };
    let resp = dispatch(&client, request).await;
    log::info!(
        "{request_id} {method} {path} -> {} in {}ms",
        resp.status,
        started.elapsed().as_millis()
    );
    into_http_response(resp, &request_id)
}

fn into_http_response(resp: GatewayResponse, request_id: &str) -> Response {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = (status, Json(resp.body)).into_response();
    let headers = out.headers_mut();
    for cookie in &resp.set_cookie {
        if let Ok(hv) = HeaderValue::from_str(cookie) {
            headers.append(header::SET_COOKIE, hv);
        }
    }
    if let Some(cookie) = resp.session_cookie.as_deref() {
        if let Ok(hv) = HeaderValue::from_str(cookie) {
            headers.insert(HeaderName::from_static(HEADER_SEERR_SESSION), hv);
        }
    }
    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.insert(HeaderName::from_static(HEADER_REQUEST_ID), hv);
    }
    out
}
