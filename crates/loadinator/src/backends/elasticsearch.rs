//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! *Previously, on Loadinator...*
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The course search is empty. The index was deleted on purpose, four seconds
//! ago, by us. It is being recreated right now, also by us. In about a minute
//! thirty thousand courses will arrive in batches of five hundred, five batches
//! at a time. This is fine. This is the plan. This is, in fact, the entire job.
//!
//! 🚀 This module holds everything that talks to the cluster:
//! - [`ElasticsearchClient`] — one `reqwest::Client`, timeouts, auth, signing
//! - [`IndexAdmin`] — ping, delete (404 is fine), create, wait until ready
//! - [`ElasticsearchSink`] — the `_bulk` submitter
//! - [`BulkResponse`] — what the cluster says back, item by item
//!
//! 🦆 (mandatory duck, no context provided, none shall be requested)

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::trace;

mod elasticsearch_sink;
mod index_admin;
mod sigv4;

pub(crate) use elasticsearch_sink::ElasticsearchSink;
pub(crate) use index_admin::{IndexAdmin, IndexMapping};
use sigv4::SigV4Signer;

/// 🔧 Everything we need to know about the destination cluster.
///
/// Auth priority: `api_key` beats basic auth beats SigV4 signing. Pick one.
/// Be consistent about it in your config. The cluster will not pick for you.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ElasticsearchSinkConfig {
    /// 📡 Where the cluster lives.
    pub url: String,
    /// 📦 The index we delete, recreate, and fill.
    pub index: String,
    /// 🏷️ `_type` on every create header. Empty string = leave it out (typeless clusters).
    pub doc_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    /// 🔏 Sign every request with AWS SigV4, for the managed-cluster crowd.
    pub signed_requests: bool,
    pub aws_region: Option<String>,
    pub aws_service: String,
    /// 🗺️ Override the built-in index mapping with one from disk.
    pub mapping_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// ⏱️ Per request. A bulk call that takes longer than this is a failed batch.
    pub request_timeout_secs: u64,
    pub readiness_timeout_secs: u64,
    pub readiness_poll_interval_ms: u64,
}

impl Default for ElasticsearchSinkConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "courses".to_string(),
            doc_type: "course".to_string(),
            username: None,
            password: None,
            api_key: None,
            signed_requests: false,
            aws_region: None,
            aws_service: "es".to_string(),
            mapping_file: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            readiness_timeout_secs: 30,
            readiness_poll_interval_ms: 250,
        }
    }
}

impl ElasticsearchSinkConfig {
    /// `None` when `doc_type` is blank.
    pub(crate) fn doc_type(&self) -> Option<String> {
        let trimmed = self.doc_type.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

/// 📬 Status and body of one call. Non-2xx is not an error at this level;
/// the caller decides whether a 404 is a tragedy or a Tuesday.
#[derive(Debug)]
pub(crate) struct ElasticResponse {
    pub status: StatusCode,
    pub body: String,
}

/// 📡 The HTTP muscle. Cheap to clone — `reqwest::Client` is an `Arc` inside.
#[derive(Debug, Clone)]
pub(crate) struct ElasticsearchClient {
    client: reqwest::Client,
    config: ElasticsearchSinkConfig,
    signer: Option<SigV4Signer>,
}

impl ElasticsearchClient {
    pub(crate) async fn new(config: ElasticsearchSinkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a cursed system cert store. Either way: tragic.")?;

        let signer = if config.signed_requests {
            Some(SigV4Signer::from_config(&config).await.context(
                "💀 Signed requests were requested, but we couldn't assemble AWS credentials and a region",
            )?)
        } else {
            None
        };

        Ok(Self {
            client,
            config,
            signer,
        })
    }

    pub(crate) fn config(&self) -> &ElasticsearchSinkConfig {
        &self.config
    }

    /// 🔗 `{url}/{path}`, with the slash hygiene you didn't know you needed.
    pub(crate) fn url_for(&self, path: &str) -> String {
        let base = self.config.url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{path}")
        }
    }

    /// 📡 One call. JSON body optional. Transport failures are `Err`; statuses are not.
    pub(crate) async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<ElasticResponse> {
        let url = self.url_for(path);
        let mut builder = self.client.request(method.clone(), &url);

        if let Some(body) = body {
            builder = builder.header("Content-Type", "application/json").body(body);
        }

        // -- 🔒 api_key is the premium tier, basic auth is general admission
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.header("Authorization", format!("ApiKey {api_key}"));
        } else if let Some(ref username) = self.config.username {
            builder = builder.basic_auth(username, self.config.password.as_ref());
        }

        let mut request = builder
            .build()
            .with_context(|| format!("💀 Couldn't even build a {method} request for '{url}'"))?;

        if let Some(ref signer) = self.signer {
            signer.sign(&mut request, std::time::SystemTime::now()).await?;
        }

        let response = self
            .client
            .execute(request)
            .await
            .with_context(|| format!("💀 {method} '{url}' never came back. Check connectivity, check timeouts, check your feelings."))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("💀 {method} '{url}' answered {status} and then mumbled the body"))?;

        trace!(%method, %url, %status, "📡 cluster answered");
        Ok(ElasticResponse { status, body })
    }
}

/// 📬 The `_bulk` response. `errors` is the headline; `items` is the fine print.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItemResult>>,
}

/// 📄 One line of the fine print. Keyed by action name (`create`) in the response.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(crate) struct BulkItemResult {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl BulkItemResult {
    pub(crate) fn is_created(&self) -> bool {
        self.status == StatusCode::CREATED.as_u16()
    }

    /// 🕵️ The most useful explanation available: `error.reason`, `error.type`, or `result`.
    pub(crate) fn reason(&self) -> String {
        if let Some(ref error) = self.error {
            if let Some(reason) = error.get("reason").and_then(|r| r.as_str()) {
                return reason.to_string();
            }
            if let Some(kind) = error.get("type").and_then(|t| t.as_str()) {
                return kind.to_string();
            }
            if let Some(text) = error.as_str() {
                return text.to_string();
            }
        }
        self.result.clone()
    }
}

impl BulkResponse {
    fn results(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().flat_map(|item| item.values())
    }

    /// ⚠️ Every item that didn't come back 201.
    pub(crate) fn failures(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.results().filter(|result| !result.is_created())
    }

    pub(crate) fn created_count(&self) -> usize {
        self.results().filter(|result| result.is_created()).count()
    }
}
