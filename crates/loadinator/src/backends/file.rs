//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The disk was quiet. Too quiet. A lone process had been tasked with reading
//! a course dump — one JSON object per line, straight out of `mongoexport`.
//! Simple, they said. What could go wrong?
//!
//! The file didn't exist. A line was half a document. Someone left three blank
//! lines at the end "for readability". This module reads it anyway, one page at
//! a time, and tells you about the lines it couldn't make sense of.
//!
//! 🚰 File → BufReader → lines → SourceRecord → Page
//! 🦆 (mandatory, no notes)

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader, Lines},
};
use tracing::{debug, warn};

use crate::backends::Source;
use crate::common::{Page, SourceRecord};

/// 📂 Where the course dump lives. That's it. That's the config.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct FileSourceConfig {
    pub file_name: PathBuf,
}

impl Default for FileSourceConfig {
    fn default() -> Self {
        Self {
            // -- ✅ "It just works" — the three most dangerous words in software engineering
            file_name: PathBuf::from("courses.ndjson"),
        }
    }
}

/// 📂 FileSource — a newline-delimited course dump, read a page at a time.
///
/// Order is file order, which makes it stable for the run. Malformed lines are
/// logged with their line number and skipped; I/O errors are not skipped, they
/// bubble up, because a half-read disk is not a "soft" failure.
pub(crate) struct FileSource {
    lines: Lines<BufReader<File>>,
    source_config: FileSourceConfig,
    line_number: u64,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("source_config", &self.source_config)
            .field("line_number", &self.line_number)
            .finish()
    }
}

impl FileSource {
    pub(crate) async fn new(source_config: FileSourceConfig) -> Result<Self> {
        let file_handle = File::open(&source_config.file_name)
            .await
            .with_context(|| {
                format!(
                    "💀 The door to '{}' would not budge. We knocked. We pleaded. \
                    We checked if it existed (it might not). The course dump remains unopened.",
                    source_config.file_name.display()
                )
            })?;

        Ok(Self {
            lines: BufReader::new(file_handle).lines(),
            source_config,
            line_number: 0,
        })
    }
}

#[async_trait]
impl Source for FileSource {
    async fn next_page(&mut self, page_size: usize) -> Result<Page> {
        let mut page = Vec::with_capacity(page_size);

        while page.len() < page_size {
            let Some(line) = self.lines.next_line().await.with_context(|| {
                format!(
                    "💀 Reading line {} of '{}' failed mid-sentence",
                    self.line_number + 1,
                    self.source_config.file_name.display()
                )
            })?
            else {
                break;
            };
            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<SourceRecord>(trimmed) {
                Ok(record) => page.push(record),
                Err(err) => {
                    warn!(
                        line_number = self.line_number,
                        error = %err,
                        "⚠️ skipping a line that isn't a course — it had ambitions, just not the right ones"
                    );
                }
            }
        }

        debug!(
            records = page.len(),
            line_number = self.line_number,
            "📖 paged records out of the course dump"
        );
        Ok(page)
    }
}
