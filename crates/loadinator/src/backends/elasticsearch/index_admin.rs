//! 🏗️ Index administration — the part of the run where we burn the house down
//! and build a new one before anybody moves in.
//!
//! Order of operations, and it matters:
//! 1. `ping` — is anyone even there?
//! 2. `ensure_index_absent` — DELETE. A 404 is a perfectly good answer.
//! 3. `create_index` — PUT the mapping.
//! 4. `wait_until_ready` — poll cluster health until the index is at least yellow.
//!
//! Any failure here is fatal. Nothing has been written yet, so nothing is lost.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{ElasticsearchClient, ElasticsearchSinkConfig};

const BUILT_IN_MAPPING: &str = include_str!("../../../mappings/courses.json");

/// 🗺️ The schema the index is created with. Configuration, not data.
#[derive(Debug, Clone)]
pub(crate) struct IndexMapping {
    body: String,
    version: Option<String>,
}

impl IndexMapping {
    pub(crate) fn built_in() -> Result<Self> {
        Self::parse(BUILT_IN_MAPPING).context("💀 The built-in course mapping is not valid JSON. Somebody edited it by hand. At night.")
    }

    /// 📂 `mapping_file` if configured, the built-in mapping otherwise.
    pub(crate) async fn load(config: &ElasticsearchSinkConfig) -> Result<Self> {
        match config.mapping_file {
            Some(ref path) => Self::from_file(path).await,
            None => Self::built_in(),
        }
    }

    async fn from_file(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("💀 Couldn't read the mapping file '{}'", path.display()))?;
        Self::parse(&raw).with_context(|| format!("💀 The mapping file '{}' is not a mapping", path.display()))
    }

    pub(crate) fn parse(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            anyhow::bail!("💀 A mapping must be a JSON object, got: {raw}");
        }
        Ok(Self {
            body: raw.trim().to_string(),
            version: version_of(&value),
        })
    }

    pub(crate) fn body(&self) -> &str {
        &self.body
    }

    pub(crate) fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// 🏷️ `_meta.version`, typeless (`mappings._meta`) or typed (`mappings.<type>._meta`).
fn version_of(value: &Value) -> Option<String> {
    let mappings = value.get("mappings")?;
    mappings
        .pointer("/_meta/version")
        .or_else(|| {
            mappings
                .as_object()?
                .values()
                .find_map(|type_mapping| type_mapping.pointer("/_meta/version"))
        })
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct ClusterHealth {
    #[serde(default)]
    status: String,
}

/// 🏗️ The demolition crew and the builders, in one struct.
#[derive(Debug, Clone)]
pub(crate) struct IndexAdmin {
    client: ElasticsearchClient,
}

impl IndexAdmin {
    pub(crate) fn new(client: ElasticsearchClient) -> Self {
        Self { client }
    }

    /// 📡 GET `/`. Anything but 2xx means there is no point continuing.
    pub(crate) async fn ping(&self) -> Result<u16> {
        let response = self
            .client
            .call(Method::GET, "", None)
            .await
            .context("💀 Elasticsearch didn't pick up. Is it running? Is the URL right? Is it even plugged in?")?;

        if !response.status.is_success() {
            anyhow::bail!(
                "💀 Elasticsearch answered the ping with '{}'. Not the greeting we hoped for. Body: '{}'",
                response.status,
                response.body
            );
        }
        debug!(status = %response.status, "📡 cluster is home");
        Ok(response.status.as_u16())
    }

    /// 🗑️ DELETE `/{name}`. A 404 means there was nothing to delete, which is what we wanted anyway.
    pub(crate) async fn ensure_index_absent(&self, name: &str) -> Result<u16> {
        let response = self
            .client
            .call(Method::DELETE, name, None)
            .await
            .with_context(|| format!("💀 Couldn't reach the cluster to delete index '{name}'"))?;

        match response.status {
            StatusCode::NOT_FOUND => {
                info!(index = name, "🗑️ index wasn't there. One less thing to demolish.");
            }
            status if status.is_success() => {
                info!(index = name, "🗑️ deleted the old index");
            }
            status => anyhow::bail!(
                "💀 Deleting index '{name}' came back '{status}'. We can't build on a lot we can't clear. Body: '{}'",
                response.body
            ),
        }
        Ok(response.status.as_u16())
    }

    /// 🏗️ PUT `/{name}` with the mapping.
    pub(crate) async fn create_index(&self, name: &str, mapping: &IndexMapping) -> Result<u16> {
        let response = self
            .client
            .call(Method::PUT, name, Some(mapping.body().to_string()))
            .await
            .with_context(|| format!("💀 Couldn't reach the cluster to create index '{name}'"))?;

        if !response.status.is_success() {
            anyhow::bail!(
                "💀 Creating index '{name}' came back '{}'. The mapping was rejected, or the cluster is having a day. Body: '{}'",
                response.status,
                response.body
            );
        }
        info!(
            index = name,
            mapping_version = mapping.version().unwrap_or("unversioned"),
            "🏗️ created the index"
        );
        Ok(response.status.as_u16())
    }

    /// ⏳ Poll cluster health for `index` until it's yellow or green, or give up after `timeout`.
    ///
    /// Transport hiccups while polling are retried; only the deadline is fatal.
    pub(crate) async fn wait_until_ready(&self, index: &str, timeout: Duration) -> Result<()> {
        let poll_interval = Duration::from_millis(self.client.config().readiness_poll_interval_ms);
        let health_path = format!("_cluster/health/{index}?wait_for_status=yellow&timeout=1s");
        let deadline = Instant::now() + timeout;

        loop {
            match self.client.call(Method::GET, &health_path, None).await {
                Ok(response) if response.status.is_success() => {
                    match serde_json::from_str::<ClusterHealth>(&response.body) {
                        Ok(health) if health.status == "yellow" || health.status == "green" => {
                            info!(index, status = %health.status, "✅ index is ready for writes");
                            return Ok(());
                        }
                        Ok(health) => debug!(index, status = %health.status, "⏳ index not ready yet"),
                        Err(err) => debug!(index, error = %err, body = %response.body, "⏳ cluster health was unreadable, asking again"),
                    }
                }
                Ok(response) => {
                    debug!(index, status = %response.status, "⏳ cluster health says not yet");
                }
                Err(err) => {
                    debug!(index, error = %err, "⏳ cluster health poll failed, trying again");
                }
            }

            if Instant::now() + poll_interval > deadline {
                anyhow::bail!(
                    "💀 Index '{index}' never reached yellow within {timeout:?}. We waited. We refreshed. We stared at the health endpoint like it owed us money."
                );
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
