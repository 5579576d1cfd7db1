//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! Layers, lowest to highest precedence:
//! 1. `LOADINATOR_*` environment variables (`__` splits nested keys)
//! 2. the TOML file, if one was given
//! 3. command-line overrides

use std::path::{Path, PathBuf};

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::Dict,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backends::{ElasticsearchSinkConfig, FileSourceConfig, MongoSourceConfig};

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// 🚰 Where the courses come from.
    #[serde(default)]
    pub source_config: SourceConfig,
    /// 📡 Where the courses are going.
    #[serde(default)]
    pub sink_config: ElasticsearchSinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🎭 Which source to read. In TOML: `[source_config.Mongo]` or `[source_config.File]`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub enum SourceConfig {
    /// 🍃 the live course collection (the default)
    #[serde(alias = "mongo")]
    Mongo(MongoSourceConfig),
    /// 📂 a `mongoexport` dump on disk
    #[serde(alias = "file")]
    File(FileSourceConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Mongo(MongoSourceConfig::default())
    }
}

/// 🧵 How hard the pipeline pulls, and how often it talks about it.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 📏 records per page, which is also records per bulk request
    #[serde(alias = "batch_size")]
    pub page_size: usize,
    /// 🚦 bulk requests allowed in flight at once
    #[serde(alias = "max_in_flight")]
    pub concurrency_limit: usize,
    /// 💤 pause after the first empty page before draining
    pub exhaustion_grace_ms: u64,
    pub progress_interval_ms: u64,
    pub counter_channel_capacity: usize,
    /// 🧮 credit only items the cluster reported as created; the rest count as failed
    pub count_item_failures: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            concurrency_limit: 5,
            exhaustion_grace_ms: 5_000,
            progress_interval_ms: 1_000,
            counter_channel_capacity: 64,
            count_item_failures: false,
        }
    }
}

impl RuntimeConfig {
    /// 🚫 Zero pages, zero workers or a zero-slot mailbox all deadlock or panic. Refuse them up front.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("💀 page_size is 0. A page with no records is just a very expensive empty line.");
        }
        if self.concurrency_limit == 0 {
            anyhow::bail!("💀 concurrency_limit is 0. Zero workers means zero work. Zen, but useless.");
        }
        if self.counter_channel_capacity == 0 {
            anyhow::bail!("💀 counter_channel_capacity is 0. The progress mailbox needs at least one slot.");
        }
        Ok(())
    }
}

/// 🎛️ Values from the command line. `None` means "not given, don't touch".
///
/// Applied to the extracted config, after env vars and the file have had their say.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub source_config: SourceOverrides,
    pub sink_config: SinkOverrides,
    pub runtime: RuntimeOverrides,
}

/// 🚰 `file_name` switches to the file source. Any `mongo_*` switches to MongoDB,
/// keeping whatever the file said about the fields that weren't given.
#[derive(Debug, Default, Clone)]
pub struct SourceOverrides {
    pub file_name: Option<PathBuf>,
    pub mongo_url: Option<String>,
    pub mongo_database: Option<String>,
    pub mongo_collection: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct SinkOverrides {
    pub url: Option<String>,
    pub index: Option<String>,
    pub signed_requests: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct RuntimeOverrides {
    pub page_size: Option<usize>,
    pub concurrency_limit: Option<usize>,
    pub count_item_failures: Option<bool>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut AppConfig) {
        self.source_config.apply(&mut config.source_config);
        self.sink_config.apply(&mut config.sink_config);
        self.runtime.apply(&mut config.runtime);
    }
}

impl SourceOverrides {
    fn apply(self, source_config: &mut SourceConfig) {
        if let Some(file_name) = self.file_name {
            *source_config = SourceConfig::File(FileSourceConfig { file_name });
            return;
        }
        if self.mongo_url.is_none() && self.mongo_database.is_none() && self.mongo_collection.is_none() {
            return;
        }

        let mut mongo = match std::mem::take(source_config) {
            SourceConfig::Mongo(mongo) => mongo,
            SourceConfig::File(_) => MongoSourceConfig::default(),
        };
        if let Some(url) = self.mongo_url {
            mongo.url = url;
        }
        if let Some(database) = self.mongo_database {
            mongo.database = database;
        }
        if let Some(collection) = self.mongo_collection {
            mongo.collection = collection;
        }
        *source_config = SourceConfig::Mongo(mongo);
    }
}

impl SinkOverrides {
    fn apply(self, sink_config: &mut ElasticsearchSinkConfig) {
        if let Some(url) = self.url {
            sink_config.url = url;
        }
        if let Some(index) = self.index {
            sink_config.index = index;
        }
        if let Some(signed_requests) = self.signed_requests {
            sink_config.signed_requests = signed_requests;
        }
    }
}

impl RuntimeOverrides {
    fn apply(self, runtime: &mut RuntimeConfig) {
        if let Some(page_size) = self.page_size {
            runtime.page_size = page_size;
        }
        if let Some(concurrency_limit) = self.concurrency_limit {
            runtime.concurrency_limit = concurrency_limit;
        }
        if let Some(count_item_failures) = self.count_item_failures {
            runtime.count_item_failures = count_item_failures;
        }
    }
}

/// 📂 The TOML file as a layer, with the old `[supervisor_config]` table renamed to `runtime`
/// so it lands in the same place as `LOADINATOR_RUNTIME__*` instead of next to it.
fn file_layer(file_name: &Path) -> anyhow::Result<Serialized<Dict>> {
    let mut table: Dict = Figment::from(Toml::file(file_name))
        .extract()
        .with_context(|| format!("💀 '{}' isn't TOML we can read", file_name.display()))?;

    if let Some(legacy) = table.remove("supervisor_config") {
        if table.contains_key("runtime") {
            warn!(
                config_file = %file_name.display(),
                "⚠️ both [runtime] and [supervisor_config] are set; [runtime] wins"
            );
        } else {
            table.insert("runtime".to_string(), legacy);
        }
    }
    Ok(Serialized::defaults(table))
}

/// 🚀 Load the config — from env vars, a file, the command line, or the sheer power of hoping.
///
/// 📐 If `config_file_name` is None → env vars and overrides only. No file. No assumptions.
/// If it's Some → the file must exist; it wins over env vars, and overrides win over both.
///
/// 💀 Returns an error if config is unparseable. Check the error message though —
/// it's contextual, informative, and written with love. Or despair. Hard to tell at 3am.
pub fn load_config(
    config_file_name: Option<&Path>,
    overrides: ConfigOverrides,
) -> anyhow::Result<AppConfig> {
    info!(config_file = ?config_file_name, "🔧 loading configuration");

    let config = Figment::new().merge(Env::prefixed("LOADINATOR_").split("__"));

    let config = match config_file_name {
        Some(file_name) => {
            // -- figment treats a missing file as an empty one; we'd rather hear about it
            if !file_name.is_file() {
                anyhow::bail!(
                    "💀 Config file '{}' doesn't exist. Double check the path, or the cwd you ran this from.",
                    file_name.display()
                );
            }
            config.merge(file_layer(file_name)?)
        }
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (LOADINATOR_*). \
             The file exists in our hearts, and on disk, but not in a shape we understand.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (LOADINATOR_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };

    let mut app_config: AppConfig = config.extract().context(context_msg)?;
    overrides.apply(&mut app_config);
    Ok(app_config)
}
