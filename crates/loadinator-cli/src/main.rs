//! 🚀 loadinator — the front door, the bouncer, the maitre d' of the reindex.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 This binary crate is the thin CLI wrapper that parses flags, loads config,
//! sets up logging, and then lets the real code do the heavy lifting.
//! Like a manager. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use loadinator::app_config::{ConfigOverrides, RuntimeOverrides, SinkOverrides, SourceOverrides};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "loadinator.toml";

/// 📦 Delete the course index, recreate it, and bulk-load every course from the export.
#[derive(Debug, Parser)]
#[command(name = "loadinator", version, about)]
struct Cli {
    /// TOML config file. Defaults to ./loadinator.toml when that exists.
    #[arg(long)]
    config: Option<PathBuf>,

    /// MongoDB connection string for the course collection, e.g. mongodb://localhost:27017
    #[arg(long)]
    mongo_url: Option<String>,

    /// MongoDB database holding the courses.
    #[arg(long)]
    mongo_database: Option<String>,

    /// MongoDB collection holding the courses.
    #[arg(long)]
    mongo_collection: Option<String>,

    /// Read a newline-delimited JSON course export instead of MongoDB.
    #[arg(long, conflicts_with_all = ["mongo_url", "mongo_database", "mongo_collection"])]
    source_file: Option<PathBuf>,

    /// Elasticsearch URL, e.g. http://localhost:9200
    #[arg(long)]
    es_dest_url: Option<String>,

    /// Index to drop, recreate, and fill.
    #[arg(long)]
    es_dest_index: Option<String>,

    /// Sign requests with AWS SigV4 (credentials from the standard AWS chain: env, profile, instance role).
    #[arg(long)]
    es_signed_requests: bool,

    /// Records per page, which is also documents per bulk request.
    #[arg(long)]
    page_size: Option<usize>,

    /// Bulk requests allowed in flight at once.
    #[arg(long)]
    concurrency_limit: Option<usize>,

    /// Credit only documents the cluster reported as created; count the rest as failed.
    #[arg(long)]
    count_item_failures: bool,
}

impl Cli {
    /// 🎛️ Flags left off the command line stay `None` so they can't stomp on the config file.
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source_config: SourceOverrides {
                file_name: self.source_file.clone(),
                mongo_url: self.mongo_url.clone(),
                mongo_database: self.mongo_database.clone(),
                mongo_collection: self.mongo_collection.clone(),
            },
            sink_config: SinkOverrides {
                url: self.es_dest_url.clone(),
                index: self.es_dest_index.clone(),
                signed_requests: self.es_signed_requests.then_some(true),
            },
            runtime: RuntimeOverrides {
                page_size: self.page_size,
                concurrency_limit: self.concurrency_limit,
                count_item_failures: self.count_item_failures.then_some(true),
            },
        }
    }

    /// 🔒 An explicit `--config` must exist; the default is only used if it's actually there.
    fn config_file(&self) -> Result<Option<PathBuf>> {
        match self.config {
            Some(ref path) => {
                let exists = path.try_exists().with_context(|| {
                    format!(
                        "💀 Couldn't check whether the config file exists. Maybe it's an issue with \
                         pwd/cwd and relative paths; use an absolute path to be absolutely certain. \
                         Was checking here: '{}'",
                        path.display()
                    )
                })?;
                if !exists {
                    anyhow::bail!("💀 Config file '{}' doesn't exist", path.display());
                }
                Ok(Some(path.clone()))
            }
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                Ok(default.is_file().then(|| default.to_path_buf()))
            }
        }
    }
}

async fn run(cli: Cli) -> Result<loadinator::RunCounters> {
    let config_file = cli.config_file()?;
    let app_config = loadinator::app_config::load_config(config_file.as_deref(), cli.overrides())
        .context("💀 We couldn't load the config. Take a look at the file and the LOADINATOR_* variables; make sure you didn't forget something obvious")?;

    loadinator::run(app_config).await
}

/// 🚀 main() — where it all begins. The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() {
    // 📡 Set up tracing — because println! debugging is a lifestyle choice
    // we're trying to move past, like flip phones and cargo shorts
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(counters) => {
            info!(
                read = counters.read,
                written = counters.inserted,
                failed = counters.failed,
                "✅ load complete"
            );
            println!("{}", counters.summary_table());
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
            let mut the_vibes_are_giving_connection_issues = false;
            let mut the_database_is_ghosting_us = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("Server selection timeout") {
                    the_database_is_ghosting_us = true;
                } else if cause_str.contains("error sending request")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("tcp connect error")
                    || cause_str.contains("dns error")
                {
                    the_vibes_are_giving_connection_issues = true;
                }
            }

            if the_database_is_ghosting_us {
                error!(
                    "🔧 hint: MongoDB never answered. Check --mongo-url, the credentials in it, \
                    and that the replica set is actually up. 🍃"
                );
            } else if the_vibes_are_giving_connection_issues {
                error!(
                    "🔧 hint: looks like Elasticsearch isn't reachable. \
                    Double-check that it's actually running and that --es-dest-url points at it. \
                    If you're using Docker, try `docker ps` to see what's up, \
                    or `docker compose up -d` to resurrect it. ☕"
                );
            }

            // 🗑️ Exit with prejudice. Process exitus maximus.
            std::process::exit(1);
        }
    }
}
