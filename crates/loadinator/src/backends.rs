//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Sources pour course records, submitters slurp bulk payloads.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 Need the live course collection? Got a backend for that. The course dump
//! off disk? That too. Need to fire NDJSON at a cluster? Got one for that
//! three. Need a fake for tests? Tests bring their own. That's the whole point of the traits below.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;

use crate::app_config::SourceConfig;
use crate::common::Page;

pub(crate) mod elasticsearch;
pub(crate) mod file;
#[cfg(test)]
pub(crate) mod in_mem;
pub(crate) mod mongo;

pub use elasticsearch::ElasticsearchSinkConfig;
pub use file::FileSourceConfig;
pub use mongo::MongoSourceConfig;
pub(crate) use elasticsearch::{BulkResponse, ElasticsearchSink, IndexAdmin};

/// 🚰 A paged cursor over stored course records.
///
/// # Contract 📜
/// - `next_page(n)` returns at most `n` records, in a stable order for the run.
/// - Fewer than `n` means the well is nearly dry. Zero means it is dry.
/// - `&mut self` because cursors have state. And feelings. Mostly state.
#[async_trait]
pub(crate) trait Source: std::fmt::Debug + Send {
    async fn next_page(&mut self, page_size: usize) -> Result<Page>;
}

/// 📡 Ships one rendered bulk payload in one network call. No retries. No regrets.
///
/// `&self`, `Send + Sync`: one submitter is shared by every in-flight worker.
/// Tests swap in fakes that count, stall, or fail on purpose.
///
/// # Contract 📜
/// - `Err` for transport failures, non-2xx statuses and unparseable bodies.
///   The whole batch is lost; the caller logs and moves on.
/// - `Ok(BulkResponse)` when the cluster answered; per-item failures live inside it.
#[async_trait]
pub(crate) trait Submitter: std::fmt::Debug + Send + Sync {
    async fn submit(&self, payload: String) -> Result<BulkResponse>;
}

/// 🎭 The many faces of a Source. The supervisor never needs to know whether
/// the courses are coming off a replica set or out of last Tuesday's export.
#[derive(Debug)]
pub(crate) enum SourceBackend {
    Mongo(mongo::MongoSource),
    File(file::FileSource),
}

impl SourceBackend {
    /// 🔌 Open whichever source the config names. Any failure here is a pre-flight failure.
    pub(crate) async fn open(source_config: SourceConfig, page_size: usize) -> Result<Self> {
        match source_config {
            SourceConfig::Mongo(config) => Ok(Self::Mongo(mongo::MongoSource::connect(&config, page_size).await?)),
            SourceConfig::File(config) => Ok(Self::File(file::FileSource::new(config).await?)),
        }
    }
}

#[async_trait]
impl Source for SourceBackend {
    async fn next_page(&mut self, page_size: usize) -> Result<Page> {
        match self {
            SourceBackend::Mongo(source) => source.next_page(page_size).await,
            SourceBackend::File(source) => source.next_page(page_size).await,
        }
    }
}
