//! # Previously, on Loadinator...
//!
//! 🎬 The data was trapped. Someone had to move it. Someone had to write a
//! backend so simple it lives entirely in RAM, gone the moment you blink.
//!
//! `in_mem` provides an in-memory [`Source`] and [`Submitter`] for tests.
//! The [`InMemorySource`] hands out records a page at a time until it runs dry.
//! The [`InMemorySink`] keeps every payload it was given behind an
//! `Arc<Mutex<...>>` so tests can inspect what arrived, tracks how many
//! submissions were in flight at once, and answers with whatever the test
//! scripted — success, a bad status, or pure garbage.
//!
//! ⚠️ This is NOT for production. This is for tests. 🦆

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::backends::{BulkResponse, Source, Submitter};
use crate::common::{Page, SourceRecord};

/// 📦 The world's most optimistic data source. Knows exactly what you told it.
#[derive(Debug, Default)]
pub(crate) struct InMemorySource {
    records: VecDeque<SourceRecord>,
    /// 📏 every page size ever asked for, in order
    pub(crate) pages_served: Vec<usize>,
}

impl InMemorySource {
    pub(crate) fn new(records: Vec<SourceRecord>) -> Self {
        Self {
            records: records.into(),
            pages_served: Vec::new(),
        }
    }
}

#[async_trait]
impl Source for InMemorySource {
    async fn next_page(&mut self, page_size: usize) -> Result<Page> {
        let take = page_size.min(self.records.len());
        let page: Page = self.records.drain(..take).collect();
        self.pages_served.push(page.len());
        Ok(page)
    }
}

/// 🎭 What the fake cluster says back.
#[derive(Debug, Clone)]
pub(crate) enum ScriptedReply {
    /// ✅ Every item created, 201 across the board.
    AllCreated,
    /// ⚠️ `errors: true`, and the first item got a 409.
    FirstItemConflicts,
    /// 💀 The submission itself fails (transport, status, unparseable — all look the same here).
    Fail(&'static str),
}

/// 📦 A sink that never forgets, and counts how crowded the doorway got.
#[derive(Debug, Clone)]
pub(crate) struct InMemorySink {
    pub(crate) received: Arc<tokio::sync::Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    pub(crate) max_in_flight: Arc<AtomicUsize>,
    reply: ScriptedReply,
    dawdle: Duration,
    door: Option<Arc<tokio::sync::Semaphore>>,
}

impl InMemorySink {
    pub(crate) fn new(reply: ScriptedReply) -> Self {
        Self {
            received: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            reply,
            dawdle: Duration::ZERO,
            door: None,
        }
    }

    /// 🚪 Every submission waits for a permit on `door` before it answers.
    /// The test decides when the doors open with `add_permits`.
    pub(crate) fn held_at(mut self, door: Arc<tokio::sync::Semaphore>) -> Self {
        self.door = Some(door);
        self
    }

    /// 💤 Sleep inside every submission so overlapping workers actually overlap.
    pub(crate) fn dawdling(mut self, dawdle: Duration) -> Self {
        self.dawdle = dawdle;
        self
    }

    fn reply_for(&self, payload: &str) -> Result<BulkResponse> {
        let ids: Vec<String> = payload
            .lines()
            .step_by(2)
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter_map(|action| action["create"]["_id"].as_str().map(str::to_string))
            .collect();

        let item = |id: &str, status: u16| {
            let result = if status == 201 { "created" } else { "" };
            serde_json::json!({"create": {"_index": "courses", "_id": id, "status": status, "result": result}})
        };

        let body = match &self.reply {
            ScriptedReply::AllCreated => {
                let items: Vec<serde_json::Value> = ids.iter().map(|id| item(id.as_str(), 201)).collect();
                serde_json::json!({"took": 3, "errors": false, "items": items})
            }
            ScriptedReply::FirstItemConflicts => {
                let items: Vec<serde_json::Value> = ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| item(id.as_str(), if i == 0 { 409 } else { 201 }))
                    .collect();
                serde_json::json!({"took": 3, "errors": true, "items": items})
            }
            ScriptedReply::Fail(why) => anyhow::bail!("💀 scripted failure: {why}"),
        };
        Ok(serde_json::from_value(body)?)
    }
}

#[async_trait]
impl Submitter for InMemorySink {
    async fn submit(&self, payload: String) -> Result<BulkResponse> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(ref door) = self.door {
            let _through = door.acquire().await?;
        }
        if !self.dawdle.is_zero() {
            tokio::time::sleep(self.dawdle).await;
        }
        let reply = self.reply_for(&payload);
        self.received.lock().await.push(payload);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
