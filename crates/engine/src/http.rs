//! REST client for an Elasticsearch-compatible engine
//!
//! Writes go through the `_bulk` API as NDJSON: an action line followed by
//! the document line for every operation.
//!
//! ## Configuration
//!
//! | Key                  | Description                        | Default                  |
//! |----------------------|------------------------------------|--------------------------|
//! | `url`                | Engine base URL                    | `https://localhost:9200` |
//! | `username`           | Basic auth user                    | none                     |
//! | `password`           | Basic auth password                | none                     |
//! | `ca_cert_path`       | PEM bundle trusted for TLS         | system roots             |
//! | `request_timeout_ms` | Per-request timeout                | `30000`                  |

use crate::client::DocumentEngine;
use crate::error::{EngineError, Result};
use crate::types::{
    BulkAction, BulkItemResult, BulkRequest, BulkResult, CreateIndex, ErrorCause, IndexTemplate,
    RawBulkItem, RawBulkResponse, RawSearchResponse, SearchRequest, SearchResponse,
};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings of [`HttpEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEngineConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_url() -> String {
    "https://localhost:9200".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        HttpEngineConfig {
            url: default_url(),
            username: None,
            password: None,
            ca_cert_path: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Document engine reached over HTTPS
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpEngine {
    /// Build a client from configuration
    pub fn new(config: &HttpEngineConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms));
        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                EngineError::Config(format!("cannot read CA bundle {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| EngineError::Config(format!("invalid CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| EngineError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self::with_client(config, client))
    }

    /// Use an already-built reqwest client
    pub fn with_client(config: &HttpEngineConfig, client: reqwest::Client) -> Self {
        HttpEngine {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        }
    }

    /// Send a request and decode the JSON body, mapping error statuses
    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let body: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        if status.is_success() {
            return Ok(body);
        }
        Err(status_error(status, &body, what))
    }
}

fn status_error(status: StatusCode, body: &Value, what: &str) -> EngineError {
    let cause = body
        .get("error")
        .and_then(|e| serde_json::from_value::<ErrorCause>(e.clone()).ok())
        .unwrap_or_else(|| ErrorCause {
            kind: "unknown".to_string(),
            reason: body.to_string(),
        });
    match (status, cause.kind.as_str()) {
        (_, "resource_already_exists_exception") => EngineError::AlreadyExists(what.to_string()),
        (StatusCode::NOT_FOUND, _) => EngineError::NotFound(format!("{what}: {}", cause.reason)),
        _ => EngineError::Status {
            status: status.as_u16(),
            kind: cause.kind,
            reason: cause.reason,
        },
    }
}

fn decode_bulk(raw: RawBulkResponse) -> Result<BulkResult> {
    let mut items = Vec::with_capacity(raw.items.len());
    for entry in raw.items {
        let (action, body) = entry
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::Decode("empty bulk item".to_string()))?;
        let action = match action.as_str() {
            "index" => BulkAction::Index,
            "update" => BulkAction::Update,
            "delete" => BulkAction::Delete,
            other => return Err(EngineError::Decode(format!("unknown bulk action {other}"))),
        };
        let item: RawBulkItem = serde_json::from_value(body)?;
        items.push(BulkItemResult {
            action,
            index: item.index,
            id: item.id,
            status: item.status,
            error: item.error,
        });
    }
    Ok(BulkResult {
        errors: raw.errors,
        items,
    })
}

#[async_trait]
impl DocumentEngine for HttpEngine {
    async fn bulk(&self, request: BulkRequest) -> Result<BulkResult> {
        let body = request.to_ndjson()?;
        let builder = self
            .request(Method::POST, "_bulk")
            .query(&[("refresh", request.refresh.as_param())])
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        let value = self.send(builder, "bulk").await?;
        let raw: RawBulkResponse = serde_json::from_value(value)?;
        let result = decode_bulk(raw)?;
        if result.errors {
            let failed = result.items.iter().filter(|i| !i.is_success()).count();
            warn!(
                target: "siftlog::engine",
                failed,
                total = result.items.len(),
                "bulk request had item failures"
            );
        }
        Ok(result)
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let builder = match &request.pit {
            // A search under a point in time must not name an index
            Some(_) => self.request(Method::POST, "_search"),
            None => self
                .request(Method::POST, &format!("{}/_search", request.index))
                .query(&[("ignore_unavailable", "true"), ("allow_no_indices", "true")]),
        };
        debug!(target: "siftlog::engine", index = %request.index, size = request.size, "search");
        let value = self.send(builder.json(&request.to_body()), "search").await?;
        let raw: RawSearchResponse = serde_json::from_value(value)?;
        Ok(raw.into())
    }

    async fn open_point_in_time(&self, index: &str, keep_alive: &str) -> Result<String> {
        let builder = self
            .request(Method::POST, &format!("{index}/_pit"))
            .query(&[("keep_alive", keep_alive)]);
        let value = self.send(builder, "open point in time").await?;
        value
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| EngineError::Decode("point in time response has no id".to_string()))
    }

    async fn close_point_in_time(&self, pit_id: &str) -> Result<()> {
        let builder = self
            .request(Method::DELETE, "_pit")
            .json(&json!({"id": pit_id}));
        self.send(builder, "close point in time").await.map(|_| ())
    }

    async fn put_index_template(&self, template: IndexTemplate) -> Result<()> {
        let builder = self
            .request(Method::PUT, &format!("_index_template/{}", template.name))
            .json(&template.to_body());
        self.send(builder, &template.name).await.map(|_| ())
    }

    async fn create_index(&self, request: CreateIndex) -> Result<()> {
        let builder = self
            .request(Method::PUT, &request.name)
            .json(&request.to_body());
        self.send(builder, &request.name).await.map(|_| ())
    }
}
