//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 *[dramatic orchestral music swells]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module — part middle manager, part helicopter parent,
//! part bouncer with a clicker counting heads at the door.
//!
//! The loop: page → (empty? grace, then drain) → take a permit → credit the
//! page as read → hand page and permit to a fresh worker → page again.
//! The permit is the only thing that ever makes the loop wait.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB EVER
//! 🔒 Like Fight Club, but for async tasks. First rule: you don't pub the workers.

mod workers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_channel::Sender;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

use crate::app_config::RuntimeConfig;
use crate::backends::{Source, Submitter};
use crate::progress::{CounterDelta, ProgressReporter, RunCounters};
use workers::{BulkSettings, BulkWorker, Worker};

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
pub(crate) struct Supervisor {
    runtime: RuntimeConfig,
    settings: Arc<BulkSettings>,
}

type InFlight = FuturesUnordered<JoinHandle<Result<()>>>;

/// 🪦 A worker that came home with bad news. The run carries on regardless.
fn report_worker(outcome: std::result::Result<Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(error = format!("{err:#}"), "💀 a worker gave up"),
        Err(join_err) => error!(error = %join_err, "💀 a worker panicked"),
    }
}

impl Supervisor {
    pub(crate) fn new(runtime: RuntimeConfig, index: String, doc_type: Option<String>) -> Self {
        let settings = Arc::new(BulkSettings {
            index,
            doc_type,
            count_item_failures: runtime.count_item_failures,
        });
        Self { runtime, settings }
    }

    /// 🧵 Page through `source` until it runs dry, one worker per page, at most
    /// `concurrency_limit` of them in flight. Returns the final tally once every
    /// worker has finished.
    ///
    /// 💀 Only a source error ends the run early, and even then the workers
    /// already in flight are waited for first.
    pub(crate) async fn run<S>(self, source: &mut S, submitter: Arc<dyn Submitter>) -> Result<RunCounters>
    where
        S: Source + ?Sized,
    {
        let (tx, rx) = async_channel::bounded(self.runtime.counter_channel_capacity);
        let reporter = ProgressReporter::start(rx, Duration::from_millis(self.runtime.progress_interval_ms));

        let mut in_flight = InFlight::new();
        let dispatched = self.dispatch_pages(source, &submitter, &tx, &mut in_flight).await;

        debug!(workers = in_flight.len(), "🏁 draining workers");
        while let Some(outcome) = in_flight.next().await {
            report_worker(outcome);
        }

        // -- 📭 last sender out turns off the lights; the reporter sees the channel close
        drop(tx);
        let counters = reporter
            .await
            .context("💀 The progress reporter died before it could read the final numbers")?;

        dispatched?;
        Ok(counters)
    }

    async fn dispatch_pages<S>(
        &self,
        source: &mut S,
        submitter: &Arc<dyn Submitter>,
        tx: &Sender<CounterDelta>,
        in_flight: &mut InFlight,
    ) -> Result<()>
    where
        S: Source + ?Sized,
    {
        let gate = Arc::new(Semaphore::new(self.runtime.concurrency_limit));
        let mut page_number = 0u64;

        loop {
            let page = source
                .next_page(self.runtime.page_size)
                .await
                .with_context(|| format!("💀 The source choked on page {}", page_number + 1))?;

            if page.is_empty() {
                info!(
                    pages = page_number,
                    grace_ms = self.runtime.exhaustion_grace_ms,
                    "🏁 source is dry, giving stragglers a moment"
                );
                tokio::time::sleep(Duration::from_millis(self.runtime.exhaustion_grace_ms)).await;
                return Ok(());
            }

            // -- 🚦 the one place the loop blocks
            let permit = gate
                .clone()
                .acquire_owned()
                .await
                .context("💀 The concurrency gate closed on us")?;

            // -- 🧹 sweep up whoever finished while we were waiting, so the list stays at most `concurrency_limit` long
            while let Some(outcome) = in_flight.next().now_or_never().flatten() {
                report_worker(outcome);
            }

            page_number += 1;
            tx.send(CounterDelta::Read(page.len() as u64))
                .await
                .context("💀 The progress reporter hung up mid-run")?;

            debug!(page = page_number, records = page.len(), "📦 dispatching page");
            let worker = BulkWorker::new(
                page_number,
                page,
                self.settings.clone(),
                submitter.clone(),
                tx.clone(),
                permit,
            );
            in_flight.push(worker.start());
        }
    }
}
