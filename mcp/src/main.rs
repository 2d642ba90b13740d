use std::collections::HashMap;
use std::io::Write;

use anyhow::{anyhow, Context};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seerr_gateway::app_state::{build_state, config_path_from_env, AppState};
use seerr_gateway::seerr::discover::discover;
use seerr_gateway::{dispatch, Credentials, GatewayRequest};

// JSON-RPC 2.0 over stdio with LSP-style framing. stdout carries protocol frames only,
// so logs go to stderr.

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    jsonrpc: String,
    id: Option<serde_json::Value>,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct RpcOk<'a> {
    jsonrpc: &'a str,
    id: serde_json::Value,
    result: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct RpcErr<'a> {
    jsonrpc: &'a str,
    id: serde_json::Value,
    error: RpcErrObj,
}

#[derive(Debug, Serialize)]
struct RpcErrObj {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

fn write_framed(stdout: &mut std::io::StdoutLock<'_>, v: &serde_json::Value) -> anyhow::Result<()> {
    let body = serde_json::to_vec(v)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    stdout.write_all(header.as_bytes())?;
    stdout.write_all(&body)?;
    stdout.flush()?;
    Ok(())
}

async fn read_framed(stdin: &mut tokio::io::Stdin) -> anyhow::Result<Option<Vec<u8>>> {
    let mut header_bytes = Vec::<u8>::new();
    let mut buf = [0u8; 1];
    loop {
        let n = stdin.read(&mut buf).await?;
        if n == 0 {
            if header_bytes.is_empty() {
                return Ok(None);
            }
            return Err(anyhow!("unexpected EOF while reading headers"));
        }
        header_bytes.push(buf[0]);
        if header_bytes.ends_with(b"\r\n\r\n") {
            break;
        }
        if header_bytes.len() > 32 * 1024 {
            return Err(anyhow!("header too large"));
        }
    }

    let len = content_length(&String::from_utf8_lossy(&header_bytes))?;
    let mut body = vec![0u8; len];
    stdin.read_exact(&mut body).await?;
    Ok(Some(body))
}

fn content_length(header: &str) -> anyhow::Result<usize> {
    for line in header.split("\r\n") {
        let Some((k, v)) = line.trim().split_once(':') else {
            continue;
        };
        if k.eq_ignore_ascii_case("content-length") {
            return Ok(v.trim().parse::<usize>()?);
        }
    }
    Err(anyhow!("missing Content-Length"))
}

async fn http_get_json(url: &str) -> anyhow::Result<serde_json::Value> {
    let client = reqwest::Client::builder()
        .user_agent("seerr-gateway-mcp/0.1")
        .build()?;
    let j = client.get(url).send().await?.json::<serde_json::Value>().await?;
    Ok(j)
}

fn tool_list() -> serde_json::Value {
    json!({
      "tools": [
        {
          "name": "seerr.request",
          "description": "Run one gateway route in-process. `headers` carries the x-seerr-* credentials.",
          "inputSchema": {
            "type": "object",
            "required": ["method", "path"],
            "properties": {
              "method": { "type": "string" },
              "path": { "type": "string" },
              "query": { "type": "object", "additionalProperties": { "type": "string" } },
              "headers": { "type": "object", "additionalProperties": { "type": "string" } },
              "body": {}
            }
          }
        },
        {
          "name": "seerr.discover",
          "description": "Fetch the combined dashboard payload. Failed sections are null.",
          "inputSchema": {
            "type": "object",
            "properties": {
              "headers": { "type": "object", "additionalProperties": { "type": "string" } }
            }
          }
        },
        {
          "name": "seerr.health",
          "description": "Fetch /health from a running gateway (defaults to http://127.0.0.1:4010).",
          "inputSchema": {
            "type": "object",
            "properties": { "baseUrl": { "type": "string" } }
          }
        },
        {
          "name": "seerr.config.get",
          "description": "Read the gateway config file (SEERR_GATEWAY_CONFIG or ./user-data/config.toml).",
          "inputSchema": { "type": "object", "properties": {} }
        }
      ]
    })
}

fn string_map(v: Option<&serde_json::Value>) -> HashMap<String, String> {
    let Some(obj) = v.and_then(|v| v.as_object()) else {
        return HashMap::new();
    };
    obj.iter()
        .filter_map(|(k, v)| {
            let s = match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((k.to_ascii_lowercase(), s))
        })
        .collect()
}

fn credentials_from_args(args: &serde_json::Value) -> Credentials {
    let headers = string_map(args.get("headers"));
    Credentials::from_lookup(|name| headers.get(name).cloned())
}

fn gateway_request_from_args(args: &serde_json::Value) -> anyhow::Result<GatewayRequest> {
    let method = args
        .get("method")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("missing method"))?;
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method: {method}"))?;
    let path = args
        .get("path")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("missing path"))?;

    let mut request = GatewayRequest::new(method, path, credentials_from_args(args));
    request.query = string_map(args.get("query"));
    request.body = args.get("body").filter(|b| !b.is_null()).cloned();
    Ok(request)
}

async fn handle_tool_call(
    state: &AppState,
    name: &str,
    args: serde_json::Value,
) -> anyhow::Result<serde_json::Value> {
    match name {
        "seerr.request" => {
            let request = gateway_request_from_args(&args)?;
            let resp = dispatch(&state.seerr, request).await;
            Ok(json!({
              "status": resp.status,
              "body": resp.body,
              "sessionCookie": resp.session_cookie,
            }))
        }
        "seerr.discover" => {
            let creds = credentials_from_args(&args);
            Ok(discover(&state.seerr, &creds).await?)
        }
        "seerr.health" => {
            let base = args
                .get("baseUrl")
                .and_then(|v| v.as_str())
                .unwrap_or("http://127.0.0.1:4010")
                .trim_end_matches('/');
            http_get_json(&format!("{base}/health")).await
        }
        "seerr.config.get" => {
            let txt = std::fs::read_to_string(&state.config_path)
                .with_context(|| format!("read config: {}", state.config_path.display()))?;
            let v: toml::Value = toml::from_str(&txt)?;
            Ok(serde_json::to_value(v)?)
        }
        _ => Err(anyhow!("unknown tool: {name}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seerr_gateway=info,seerr_gateway_mcp=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let state = build_state(config_path_from_env())?;
    log::info!("mcp adapter using config {}", state.config_path.display());

    let mut stdin = tokio::io::stdin();
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();

    loop {
        let Some(body) = read_framed(&mut stdin).await? else {
            break;
        };
        let msg: RpcEnvelope = serde_json::from_slice(&body)
            .map_err(|e| anyhow!("invalid json: {e}"))
            .context("parse request")?;
        if msg.jsonrpc.trim() != "2.0" {
            log::warn!("ignoring message with jsonrpc={}", msg.jsonrpc);
            continue;
        }

        // Notifications carry no id and get no reply.
        let Some(id) = msg.id.clone() else {
            continue;
        };

        let result = match msg.method.as_str() {
            "initialize" => Ok(json!({
              "protocolVersion": "2024-11-05",
              "serverInfo": { "name": "seerr-gateway-mcp", "version": "0.1.0" },
              "capabilities": { "tools": {} }
            })),
            "tools/list" => Ok(tool_list()),
            "tools/call" => match msg.params.get("name").and_then(|v| v.as_str()) {
                Some(tool_name) => {
                    let tool_args = msg.params.get("arguments").cloned().unwrap_or(json!({}));
                    handle_tool_call(&state, tool_name, tool_args).await
                }
                None => Err(anyhow!("missing params.name")),
            },
            "ping" => Ok(json!({ "ok": true })),
            _ => Err(anyhow!("unknown method: {}", msg.method)),
        };

        let out = match result {
            Ok(v) => serde_json::to_value(RpcOk {
                jsonrpc: "2.0",
                id,
                result: v,
            })?,
            Err(e) => {
                log::debug!("request {} failed: {e:#}", msg.method);
                serde_json::to_value(RpcErr {
                    jsonrpc: "2.0",
                    id,
                    error: RpcErrObj {
                        code: -32000,
                        message: e.to_string(),
                        data: None,
                    },
                })?
            }
        };

        write_framed(&mut stdout, &out)?;
    }

    Ok(())
}
