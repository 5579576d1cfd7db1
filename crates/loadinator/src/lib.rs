//! 🚀 loadinator — drops the course index, builds it again, and pours every
//! course from the export back in, five bulk requests at a time.
//!
//! 🎬 *[narrator voice]* "It was a simple reindex. It was always a simple reindex."
//!
//! The run, start to finish:
//! 1. 🔧 validate the runtime knobs and open the source (MongoDB, or a dump on disk)
//! 2. 📡 ping the cluster (no answer, no run)
//! 3. 🗑️ delete the index (404 is fine), 🏗️ create it with the mapping, ⏳ wait for yellow
//! 4. 🧵 page, transform, bulk, count, until the dump runs dry
//!
//! Anything failing in 1-3 is returned as an error before a single document moves.
//! Anything failing in 4 is logged, counted, and survived. 🦆

pub mod app_config;
mod backends;
mod common;
mod progress;
mod supervisors;
mod transforms;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::elasticsearch::{ElasticsearchClient, IndexMapping};
use crate::backends::{ElasticsearchSink, IndexAdmin, SourceBackend};
use crate::supervisors::Supervisor;

pub use crate::app_config::SourceConfig;
pub use crate::backends::{ElasticsearchSinkConfig, FileSourceConfig, MongoSourceConfig};
pub use crate::progress::RunCounters;

/// 🚀 SEND IT. Pre-flight, then the pipeline, then the totals.
pub async fn run(app_config: AppConfig) -> Result<RunCounters> {
    let AppConfig {
        source_config,
        sink_config,
        runtime,
    } = app_config;

    runtime.validate()?;

    // -- 🚰 open the source before touching the cluster, so a typo'd path or a dead database can't cost us the index
    let mut source = SourceBackend::open(source_config, runtime.page_size).await?;
    let mapping = IndexMapping::load(&sink_config).await?;

    let client = ElasticsearchClient::new(sink_config.clone()).await?;
    let admin = IndexAdmin::new(client.clone());
    let index = sink_config.index.clone();

    admin
        .ping()
        .await
        .context("💀 Pre-flight failed: the cluster is unreachable")?;
    admin
        .ensure_index_absent(&index)
        .await
        .context("💀 Pre-flight failed: couldn't clear the old index")?;
    admin
        .create_index(&index, &mapping)
        .await
        .context("💀 Pre-flight failed: couldn't create the index")?;
    admin
        .wait_until_ready(&index, Duration::from_secs(sink_config.readiness_timeout_secs))
        .await
        .context("💀 Pre-flight failed: the index never became ready")?;

    info!(
        index = %index,
        page_size = runtime.page_size,
        concurrency_limit = runtime.concurrency_limit,
        "🚀 pre-flight done, loading courses"
    );

    let submitter = Arc::new(ElasticsearchSink::new(client));
    let supervisor = Supervisor::new(runtime, index, sink_config.doc_type());
    supervisor.run(&mut source, submitter).await
}
