//! 🍃 The system of record: the course collection in MongoDB.
//!
//! One `find({})` over the whole collection, fetched from the server
//! `page_size` documents per round trip, handed out a page at a time. Each
//! document is decoded on its own, so one odd course is logged and skipped
//! instead of taking the run down with it.
//!
//! 🚰 Collection → Cursor<Document> → SourceRecord → Page

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mongodb::bson::{Document, doc};
use mongodb::options::ClientOptions;
use mongodb::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backends::Source;
use crate::common::{Page, SourceRecord};

/// 🍃 Where the courses are stored.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct MongoSourceConfig {
    pub url: String,
    pub database: String,
    pub collection: String,
    /// ⏱️ How long to look for a reachable server before giving up on the run.
    pub server_selection_timeout_secs: u64,
}

impl Default for MongoSourceConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "courses".to_string(),
            collection: "courses".to_string(),
            server_selection_timeout_secs: 10,
        }
    }
}

type DocumentStream = BoxStream<'static, mongodb::error::Result<Document>>;

/// 🍃 A cursor over the course collection, in natural order.
pub(crate) struct MongoSource {
    documents: DocumentStream,
    position: u64,
}

impl std::fmt::Debug for MongoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoSource").field("position", &self.position).finish()
    }
}

impl MongoSource {
    /// 🔌 Connect, ping, and open the cursor. Nothing here touches the search cluster,
    /// so a wrong URL or an empty password fails the run before the index is dropped.
    pub(crate) async fn connect(source_config: &MongoSourceConfig, page_size: usize) -> Result<Self> {
        let mut options = ClientOptions::parse(&source_config.url)
            .await
            .with_context(|| format!("💀 '{}' is not a MongoDB connection string we can use", source_config.url))?;
        options.app_name = Some("loadinator".to_string());
        options.server_selection_timeout = Some(Duration::from_secs(source_config.server_selection_timeout_secs));

        let client = Client::with_options(options).context("💀 The MongoDB client refused to be built")?;
        let database = client.database(&source_config.database);
        database.run_command(doc! { "ping": 1 }).await.with_context(|| {
            format!(
                "💀 MongoDB at '{}' didn't answer the ping. Is it up? Is the URL right? Are the credentials?",
                source_config.url
            )
        })?;

        let batch_size = u32::try_from(page_size).unwrap_or(u32::MAX);
        let cursor = database
            .collection::<Document>(&source_config.collection)
            .find(doc! {})
            .batch_size(batch_size)
            .await
            .with_context(|| {
                format!(
                    "💀 Couldn't open a cursor on '{}.{}'",
                    source_config.database, source_config.collection
                )
            })?;

        info!(
            database = %source_config.database,
            collection = %source_config.collection,
            batch_size,
            "🍃 cursor open on the course collection"
        );
        Ok(Self::from_stream(cursor.boxed()))
    }

    pub(crate) fn from_stream(documents: DocumentStream) -> Self {
        Self { documents, position: 0 }
    }
}

#[async_trait]
impl Source for MongoSource {
    async fn next_page(&mut self, page_size: usize) -> Result<Page> {
        let mut page = Vec::with_capacity(page_size);

        while page.len() < page_size {
            let Some(next) = self.documents.next().await else {
                break;
            };
            self.position += 1;
            let document = next.with_context(|| {
                format!("💀 The MongoDB cursor broke at document {}", self.position)
            })?;

            match mongodb::bson::from_document::<SourceRecord>(document) {
                Ok(record) => page.push(record),
                Err(err) => {
                    warn!(
                        position = self.position,
                        error = %err,
                        "⚠️ skipping a document that doesn't decode as a course"
                    );
                }
            }
        }

        debug!(records = page.len(), position = self.position, "📖 paged records out of MongoDB");
        Ok(page)
    }
}
