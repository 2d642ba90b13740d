use futures_util::future::join_all;
use serde_json::{Map, Value};

use super::client::SeerrClient;
use super::upstream::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "movie" => Some(MediaKind::Movie),
            "tv" => Some(MediaKind::Tv),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

fn usable_id(v: &Value) -> bool {
    match v {
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        _ => false,
    }
}

fn id_segment(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Stable external id of a list entry: `tmdbId`, else `id`.
fn stable_id(map: &Map<String, Value>) -> Option<Value> {
    ["tmdbId", "id"]
        .iter()
        .filter_map(|k| map.get(*k))
        .find(|v| usable_id(v))
        .cloned()
}

fn kind_of(map: &Map<String, Value>) -> Option<MediaKind> {
    map.get("mediaType")
        .and_then(|v| v.as_str())
        .and_then(MediaKind::parse)
}

pub fn normalize_item(item: Value, default_kind: MediaKind) -> Value {
    let Value::Object(mut map) = item else {
        return item;
    };
    if let Some(id) = stable_id(&map) {
        map.insert("tmdbId".to_string(), id);
    }
    let has_kind = map
        .get("mediaType")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty());
    if !has_kind {
        map.insert(
            "mediaType".to_string(),
            Value::String(default_kind.as_str().to_string()),
        );
    }
    Value::Object(map)
}

/// Anything that is not an array normalizes to an empty list.
pub fn normalize_items(raw: &Value, default_kind: MediaKind) -> Vec<Value> {
    match raw {
        Value::Array(items) => items
            .iter()
            .cloned()
            .map(|item| normalize_item(item, default_kind))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn detail_path(kind: MediaKind, id: &str) -> String {
    format!("/api/v1/{}/{}", kind.as_str(), urlencoding::encode(id))
}

pub async fn fetch_detail(
    client: &SeerrClient,
    creds: &Credentials,
    kind: MediaKind,
    id: &str,
) -> Option<Value> {
    let res = client.get(creds, &detail_path(kind, id)).await;
    match res.data {
        Some(detail @ Value::Object(_)) if res.success => Some(detail),
        _ => {
            log::debug!(
                "detail fetch for {}/{id} skipped: {}",
                kind.as_str(),
                res.message.as_deref().unwrap_or("no detail record")
            );
            None
        }
    }
}

fn merge_detail(original: Map<String, Value>, detail: Value) -> Value {
    let id = original.get("tmdbId").cloned();
    let kind = original.get("mediaType").cloned();
    let mut merged = original;
    if let Value::Object(fields) = detail {
        merged.extend(fields);
    }
    // The detail record's own `id` must not shadow the stable identifier.
    if let Some(id) = id {
        merged.insert("tmdbId".to_string(), id);
    }
    if let Some(kind) = kind {
        merged.insert("mediaType".to_string(), kind);
    }
    Value::Object(merged)
}

async fn hydrate_one(client: &SeerrClient, creds: &Credentials, item: Value) -> Value {
    let Value::Object(map) = item else {
        return item;
    };
    let Some(id) = map.get("tmdbId").filter(|v| usable_id(v)).map(id_segment) else {
        return Value::Object(map);
    };
    let kind = kind_of(&map).unwrap_or(MediaKind::Movie);
    match fetch_detail(client, creds, kind, &id).await {
        Some(detail) => merge_detail(map, detail),
        None => Value::Object(map),
    }
}

/// Normalizes `raw` and enriches every entry with its detail record.
///
/// Output has the same length and order as the input; failed lookups keep the original entry.
pub async fn hydrate_items(
    client: &SeerrClient,
    creds: &Credentials,
    raw: &Value,
    default_kind: MediaKind,
) -> Vec<Value> {
    let items = normalize_items(raw, default_kind);
    join_all(
        items
            .into_iter()
            .map(|item| hydrate_one(client, creds, item)),
    )
    .await
}

async fn hydrate_request(client: &SeerrClient, creds: &Credentials, request: Value) -> Value {
    let Value::Object(mut map) = request else {
        return request;
    };
    let Some(media) = map.get("media").and_then(|m| m.as_object()) else {
        return Value::Object(map);
    };
    // `media.id` is the upstream's internal row id, only `tmdbId` addresses a detail record.
    let Some(id) = media.get("tmdbId").filter(|v| usable_id(v)).map(id_segment) else {
        return Value::Object(map);
    };
    let tag = map
        .get("type")
        .and_then(|v| v.as_str())
        .or_else(|| media.get("mediaType").and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(MediaKind::Movie.as_str())
        .to_string();
    let kind = MediaKind::parse(&tag).unwrap_or(MediaKind::Movie);

    if let Some(Value::Object(mut detail)) = fetch_detail(client, creds, kind, &id).await {
        detail.insert("mediaType".to_string(), Value::String(tag));
        map.insert("mediaMetadata".to_string(), Value::Object(detail));
    }
    Value::Object(map)
}

/// Attaches `mediaMetadata` to each request whose media reference resolves; others pass through.
pub async fn hydrate_requests(client: &SeerrClient, creds: &Credentials, raw: &Value) -> Vec<Value> {
    let Value::Array(requests) = raw else {
        return Vec::new();
    };
    join_all(
        requests
            .iter()
            .cloned()
            .map(|request| hydrate_request(client, creds, request)),
    )
    .await
}
