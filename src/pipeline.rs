use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::{self, VerificationReport};
use crate::fetcher::{self, CardSource};
use crate::normalize::{normalize, SkipReason};

/// Everything one build run shares: the store connection and the run clock.
///
/// The connection closes when the context is dropped.
pub struct PipelineContext {
    conn: Connection,
    started_at: DateTime<Utc>,
    show_progress: bool,
}

impl PipelineContext {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(db::connect(path)?))
    }

    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            started_at: Utc::now(),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    #[cfg(test)]
    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub fetched: usize,
    pub stored: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub verification: VerificationReport,
}

impl BuildReport {
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Full rebuild: reset the schema, fetch every page, store every card that
/// normalizes, then verify the result.
///
/// Records that fail to normalize are counted and skipped. Fetch and store
/// errors abort the run; cards already committed stay in place.
pub async fn run<S: CardSource>(
    ctx: &PipelineContext,
    source: &S,
    page_size: u32,
) -> Result<BuildReport> {
    db::reset_schema(&ctx.conn).context("Failed to reset card schema")?;
    info!("Card schema reset");

    let records = fetcher::fetch_all(source, page_size)
        .await
        .context("Failed to fetch card list")?;

    let (stored, skipped) = store_all(ctx, &records)?;

    let verification = db::verify(&ctx.conn).context("Failed to verify card store")?;

    Ok(BuildReport {
        fetched: records.len(),
        stored,
        skipped,
        verification,
    })
}

/// Normalize and write each record in order. Returns the stored count and
/// the skip counts per reason; the first store error is returned as-is.
pub fn store_all(
    ctx: &PipelineContext,
    records: &[serde_json::Value],
) -> Result<(usize, BTreeMap<SkipReason, usize>)> {
    let pb = if ctx.show_progress {
        ProgressBar::new(records.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let mut stored = 0usize;
    let mut skipped: BTreeMap<SkipReason, usize> = BTreeMap::new();

    for raw in records {
        match normalize(raw, &ctx.started_at) {
            Ok(card) => {
                db::upsert_card(&ctx.conn, &card.card.to_row(), &card.related)
                    .with_context(|| format!("Failed to store card {}", card.card.id))?;
                debug!("Stored {} with {} related rows", card.card, card.related.row_count());
                stored += 1;
                if stored % 100 == 0 {
                    info!("Stored {} cards", stored);
                }
            }
            Err(reason) => *skipped.entry(reason).or_default() += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("Stored {} cards, skipped {}", stored, skipped.values().sum::<usize>());
    Ok((stored, skipped))
}
