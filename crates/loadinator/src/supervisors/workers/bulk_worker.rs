//! 🎬 *[a page of courses arrives. somewhere, a cluster waits.]*
//! *[the clock on the wall reads 2:47am.]*
//! *[nobody asked for this reindex. and yet, here we are.]*
//!
//! 📦 The BulkWorker — one page in, one bulk request out, one permit held the
//! whole time. Transforms every record, ships the lot, reads the receipt,
//! mails the counts, and hands its slot back on the way out.
//!
//! 🦆 (the duck has no comment at this time)

use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::Worker;
use crate::backends::{BulkResponse, Submitter};
use crate::common::Page;
use crate::progress::CounterDelta;
use crate::transforms::{BulkRequest, CourseTransform};

/// ✂️ How much of a failed payload makes it into the error log. The full thing is at debug.
const PAYLOAD_EXCERPT_CHARS: usize = 1024;

/// The first `PAYLOAD_EXCERPT_CHARS` characters of `payload`, cut on a char boundary.
fn payload_excerpt(payload: &str) -> &str {
    payload
        .char_indices()
        .nth(PAYLOAD_EXCERPT_CHARS)
        .map_or(payload, |(cut_at, _)| &payload[..cut_at])
}

/// 🔧 What every bulk request needs to know, shared by all workers in a run.
#[derive(Debug, Clone)]
pub(crate) struct BulkSettings {
    pub index: String,
    pub doc_type: Option<String>,
    pub count_item_failures: bool,
}

/// 📦 One page, one request, one permit.
#[derive(Debug)]
pub(crate) struct BulkWorker {
    page_number: u64,
    page: Page,
    settings: Arc<BulkSettings>,
    submitter: Arc<dyn Submitter>,
    counters: Sender<CounterDelta>,
    permit: OwnedSemaphorePermit,
}

impl BulkWorker {
    pub(crate) fn new(
        page_number: u64,
        page: Page,
        settings: Arc<BulkSettings>,
        submitter: Arc<dyn Submitter>,
        counters: Sender<CounterDelta>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            page_number,
            page,
            settings,
            submitter,
            counters,
            permit,
        }
    }

    async fn process(&self) -> Result<()> {
        let page_len = self.page.len() as u64;
        let mut request = BulkRequest::new(self.settings.index.as_str(), self.settings.doc_type.clone());

        for record in &self.page {
            let Some((document, id)) = CourseTransform::transform(record) else {
                warn!(
                    page = self.page_number,
                    kis_course_id = %record.kis_course_id,
                    "⚠️ skipping a course with no usable identifier"
                );
                continue;
            };
            if let Err(err) = request.push(&id, &document) {
                warn!(page = self.page_number, id = %id, error = %err, "⚠️ skipping a course that wouldn't serialize");
            }
        }

        if request.is_empty() {
            warn!(page = self.page_number, records = page_len, "⚠️ nothing in this page survived the transform");
            return self.mail(CounterDelta::Failed(page_len)).await;
        }

        let documents = request.len();
        let payload = request.into_payload();
        let excerpt = payload_excerpt(&payload).to_string();
        let payload_for_the_autopsy = tracing::enabled!(tracing::Level::DEBUG).then(|| payload.clone());

        match self.submitter.submit(payload).await {
            Err(err) => {
                error!(
                    page = self.page_number,
                    documents,
                    error = format!("{err:#}"),
                    payload = %excerpt,
                    "💀 bulk request failed, dropping the batch"
                );
                if let Some(payload) = payload_for_the_autopsy {
                    debug!(page = self.page_number, %payload, "🔍 the payload that didn't make it");
                }
                self.mail(CounterDelta::Failed(page_len)).await
            }
            Ok(response) => self.settle(page_len, &response).await,
        }
    }

    /// 🧾 Read the receipt, log what bounced, credit the rest.
    async fn settle(&self, page_len: u64, response: &BulkResponse) -> Result<()> {
        debug!(
            page = self.page_number,
            took_ms = response.took,
            errors = response.errors,
            "📬 bulk response"
        );

        if response.errors || self.settings.count_item_failures {
            for failure in response.failures() {
                error!(
                    page = self.page_number,
                    id = %failure.id,
                    status = failure.status,
                    reason = %failure.reason(),
                    "💀 document not created"
                );
            }
        }

        if self.settings.count_item_failures {
            let created = response.created_count() as u64;
            self.mail(CounterDelta::Inserted(created)).await?;
            self.mail(CounterDelta::Failed(page_len.saturating_sub(created))).await
        } else {
            // -- the whole page is credited even when individual items bounced
            self.mail(CounterDelta::Inserted(page_len)).await
        }
    }

    async fn mail(&self, delta: CounterDelta) -> Result<()> {
        if matches!(delta, CounterDelta::Failed(0) | CounterDelta::Inserted(0)) {
            return Ok(());
        }
        self.counters
            .send(delta)
            .await
            .context("💀 The progress reporter hung up before we could report in")
    }
}

impl Worker for BulkWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!(page = self.page_number, records = self.page.len(), "🧵 BulkWorker clocking in");
            let outcome = self.process().await;
            // -- 🚦 the slot opens only once the submission is over, success or not
            drop(self.permit);
            outcome
        })
    }
}
