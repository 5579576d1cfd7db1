//! 📊 progress.rs — "Are we there yet?" — every pipeline, every time, forever.
//!
//! 🚀 Workers don't touch the totals. They mail deltas. One reporter task owns
//! the [`RunCounters`], opens the mail, and reads the numbers out loud once per
//! interval. When the last sender hangs up, it reads them one final time and
//! hands the totals back.
//!
//! ⚠️  Warning: Watching this log line will not make it go faster.
//! Neither will refreshing it. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::time::Duration;

use async_channel::Receiver;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::info;

/// 📬 One piece of mail for the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CounterDelta {
    /// 📖 records dispatched to a worker (credited before the worker runs)
    Read(u64),
    /// ✅ records credited as written
    Inserted(u64),
    /// 💀 records that didn't make it
    Failed(u64),
}

/// 📊 The run's totals. Owned by exactly one task at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunCounters {
    pub read: u64,
    pub inserted: u64,
    pub failed: u64,
    pub elapsed: Duration,
}

impl RunCounters {
    pub(crate) fn apply(&mut self, delta: CounterDelta) {
        match delta {
            CounterDelta::Read(n) => self.read += n,
            CounterDelta::Inserted(n) => self.inserted += n,
            CounterDelta::Failed(n) => self.failed += n,
        }
    }

    pub fn docs_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 { self.inserted as f64 / secs } else { 0.0 }
    }

    /// 🍽️ The end-of-run receipt. Two columns, right-aligned, no borders.
    /// NOTHING preset because we're minimalists. and also the borders looked bad.
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let rows = [
            ("Read", format_number(self.read)),
            ("Written", format_number(self.inserted)),
            ("Failed", format_number(self.failed)),
            ("Docs/s", format_number(self.docs_per_sec() as u64)),
            ("Elapsed", format_duration(self.elapsed)),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }
}

/// 🔢 "1000000" → "1,000,000" — you're welcome, eyes.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you should probably call your mom. It's been a while.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📡 The one task allowed to touch the totals.
pub(crate) struct ProgressReporter;

impl ProgressReporter {
    /// 🚀 Spawn the reporter. The handle resolves to the final totals once
    /// every `Sender` for `deltas` has been dropped and the mailbox is empty.
    pub(crate) fn start(deltas: Receiver<CounterDelta>, every: Duration) -> JoinHandle<RunCounters> {
        // -- tokio's interval panics on zero, and nobody needs a log line per nanosecond
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let started = Instant::now();
            let mut counters = RunCounters::default();
            let mut ticker = tokio::time::interval_at(started + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    delta = deltas.recv() => match delta {
                        Ok(delta) => counters.apply(delta),
                        // -- 📭 closed and drained: every worker and the driver have hung up
                        Err(_) => break,
                    },
                    _ = ticker.tick() => {
                        info!(
                            read = counters.read,
                            written = counters.inserted,
                            failed = counters.failed,
                            "📊 progress"
                        );
                    }
                }
            }

            counters.elapsed = started.elapsed();
            info!(
                read = counters.read,
                written = counters.inserted,
                failed = counters.failed,
                elapsed_ms = counters.elapsed.as_millis() as u64,
                "🏁 final tally"
            );
            counters
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_the_mail_adds_up() -> anyhow::Result<()> {
        let (tx, rx) = async_channel::bounded(4);
        let the_reporter = ProgressReporter::start(rx, Duration::from_millis(5));

        let the_worker_tx = tx.clone();
        tokio::spawn(async move {
            the_worker_tx.send(CounterDelta::Inserted(2)).await.ok();
            the_worker_tx.send(CounterDelta::Failed(1)).await.ok();
        });
        tx.send(CounterDelta::Read(3)).await?;
        drop(tx);

        let the_totals = the_reporter.await?;
        assert_eq!(the_totals.read, 3);
        assert_eq!(the_totals.inserted, 2);
        assert_eq!(the_totals.failed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nobody_writes_and_the_reporter_still_goes_home() -> anyhow::Result<()> {
        let (tx, rx) = async_channel::bounded::<CounterDelta>(1);
        let the_reporter = ProgressReporter::start(rx, Duration::ZERO);
        drop(tx);

        let the_totals = the_reporter.await?;
        assert_eq!(the_totals.read, 0);
        assert_eq!(the_totals.inserted, 0);
        Ok(())
    }

    #[test]
    fn the_one_where_big_numbers_get_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn the_one_where_the_receipt_has_every_line() {
        let the_counters = RunCounters {
            read: 30_000,
            inserted: 29_998,
            failed: 2,
            elapsed: Duration::from_secs(3_725),
        };
        let the_table = the_counters.summary_table().to_string();
        assert!(the_table.contains("30,000"));
        assert!(the_table.contains("29,998"));
        assert!(the_table.contains("01:02:05"));
        assert!(the_table.contains("Failed"));
    }
}
