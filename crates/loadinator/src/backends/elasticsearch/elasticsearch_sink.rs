use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use super::{BulkResponse, ElasticsearchClient};
use crate::backends::Submitter;

/// 📡 The `_bulk` submitter — pure I/O, zero buffering.
///
/// Accepts a fully rendered NDJSON payload and POSTs it to `/{index}/_bulk`.
/// That's it. The worker upstream transformed and assembled it; we just fire
/// it into the elastic void and read what comes back.
///
/// 🔄 No retries. A failed batch is the worker's to log and drop.
#[derive(Debug, Clone)]
pub(crate) struct ElasticsearchSink {
    client: ElasticsearchClient,
    bulk_path: String,
}

impl ElasticsearchSink {
    pub(crate) fn new(client: ElasticsearchClient) -> Self {
        let bulk_path = format!("{}/_bulk", client.config().index);
        Self { client, bulk_path }
    }
}

#[async_trait]
impl Submitter for ElasticsearchSink {
    async fn submit(&self, payload: String) -> Result<BulkResponse> {
        debug!(bytes = payload.len(), "📡 sending bulk payload");

        let response = self
            .client
            .call(Method::POST, &self.bulk_path, Some(payload))
            .await
            .context("💀 The bulk request never made it to Elasticsearch. We launched the payload and the network was not vibing with it.")?;

        if !response.status.is_success() {
            anyhow::bail!(
                "💀 The bulk request arrived, but Elasticsearch looked at our documents and said '{}'. The body of the response read: '{}'",
                response.status,
                response.body
            );
        }

        serde_json::from_str::<BulkResponse>(&response.body).with_context(|| {
            format!(
                "💀 Elasticsearch answered {} but the body isn't a bulk response we recognise: '{}'",
                response.status, response.body
            )
        })
    }
}
