//! Pipeline orchestrator: ties loader → engine → storage together.
//!
//! `run()` — snapshot mode (default / cron use):
//!   1. Load collector CSVs → per-card batches
//!   2. Normalize + estimate every card (fan-out; cards are independent)
//!   3. Replace the card's rows for today's snapshot and upsert estimates
//!   Idempotent: re-running the same day rewrites the same snapshot.
//!
//! Estimation is pure per card, so the fan-out needs no shared state; all
//! database writes happen on the main task after the join.

use crate::config::{AppConfig, EngineConfig};
use crate::engine;
use crate::engine::normalize::{normalize_listing, normalize_spotlight, NormalizeOptions};
use crate::loader::{self, CardBatch};
use crate::models::{CardRow, EstimateRow, ListingRecord};
use crate::storage::Repository;
use crate::utils::format_price_avg;
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub struct Pipeline {
    config: AppConfig,
}

#[derive(Debug)]
pub struct PipelineStats {
    pub cards_processed: usize,
    pub rows_inserted: usize,
    pub errors: usize,
}

/// Everything one card contributes to the snapshot.
pub(crate) struct CardOutcome {
    pub(crate) rows: Vec<CardRow>,
    pub(crate) estimate: EstimateRow,
}

/// Normalize and estimate one card. Pure apart from the passed-in clock
/// values.
pub(crate) fn price_card(
    batch: &CardBatch,
    cfg: &EngineConfig,
    snapshot_date: NaiveDate,
    scraped_at: NaiveDateTime,
) -> CardOutcome {
    let opts = NormalizeOptions {
        missing_shipping_means_free: cfg.missing_shipping_means_free,
    };

    let listings: Vec<ListingRecord> = batch
        .listings
        .iter()
        .map(|raw| normalize_listing(raw, opts))
        .collect();
    let spotlight = batch
        .spotlight
        .as_ref()
        .map(|raw| normalize_spotlight(&batch.card_name, raw));

    let est = engine::estimate(&batch.card_name, &listings, spotlight.as_ref(), cfg);
    let price_avg = format_price_avg(est.box_price);

    let card_row = |price, shipping, stock| CardRow {
        name: batch.card_name.clone(),
        label: batch.label.clone(),
        set_name: batch.set_name.clone(),
        number_in_set: batch.number_in_set.clone(),
        image_url: batch.image_url.clone(),
        box_name: batch.box_name.clone(),
        url: batch.url.clone(),
        price,
        shipping,
        stock,
        price_avg: price_avg.clone(),
        snapshot_date,
        scraped_at,
    };

    let mut rows: Vec<CardRow> = listings
        .iter()
        .map(|l| card_row(l.price, l.shipping_cost, l.stock_available))
        .collect();
    if rows.is_empty() {
        // A card page with no listings still gets one (empty) display row,
        // as the collector always produced.
        rows.push(card_row(None, None, None));
    }

    let estimate = EstimateRow {
        name: batch.card_name.clone(),
        label: batch.label.clone(),
        box_name: batch.box_name.clone(),
        box_price: est.box_price,
        basis: est.basis,
        snapshot_date,
        computed_at: scraped_at,
    };

    CardOutcome { rows, estimate }
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(&self, input_dir: &Path) -> Result<PipelineStats> {
        let repo = Repository::open(&self.config.storage.db_path)
            .context("Failed to open DuckDB")?;

        if self.config.storage.run_migrations {
            repo.run_migrations()?;
        }

        let run_id = repo.begin_run().unwrap_or(0);
        let mut errors = 0usize;

        // ── 1. Load collector CSVs ────────────────────────────────────────────
        info!("=== Step 1: Loading collector CSVs ===");
        let files = loader::discover_csv_files(input_dir)?;
        info!("Found {} CSV files in {:?}", files.len(), input_dir);

        let mut batches: Vec<CardBatch> = Vec::new();
        for path in &files {
            match loader::load_batches(path) {
                Ok(mut b) => batches.append(&mut b),
                Err(e) => {
                    warn!("Error loading {:?}: {:#}", path, e);
                    errors += 1;
                }
            }
        }

        // ── 2. Estimate every card ────────────────────────────────────────────
        info!("=== Step 2: Estimating {} cards ===", batches.len());

        let snapshot_date = Utc::now().date_naive();
        let scraped_at = Utc::now().naive_utc();
        let engine_cfg = Arc::new(self.config.engine.clone());
        let sem = Arc::new(Semaphore::new(self.config.pipeline.concurrency));
        let mut handles = Vec::new();

        for batch in batches {
            let card = batch.card_name.clone();
            let engine_cfg = Arc::clone(&engine_cfg);
            let sem = Arc::clone(&sem);

            let handle = tokio::spawn(async move {
                let _permit = sem.acquire().await?;
                let outcome = price_card(&batch, &engine_cfg, snapshot_date, scraped_at);
                Ok::<CardOutcome, anyhow::Error>(outcome)
            });

            handles.push((card, handle));
        }

        let mut outcomes: Vec<CardOutcome> = Vec::new();
        for (card, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(e)) => { warn!("{}: {:#}", card, e); errors += 1; }
                Err(e) => { error!("Task panic for {}: {}", card, e); errors += 1; }
            }
        }

        // ── 3. Persist the snapshot ───────────────────────────────────────────
        let mut total_rows = 0usize;
        let mut estimates: Vec<EstimateRow> = Vec::new();
        for outcome in &outcomes {
            total_rows += repo.replace_card_rows(&outcome.rows)
                .with_context(|| format!("replace_card_rows({})", outcome.estimate.name))?;
            estimates.push(outcome.estimate.clone());
        }
        repo.upsert_estimates(&estimates)?;

        let stats = PipelineStats {
            cards_processed: outcomes.len(),
            rows_inserted: total_rows,
            errors,
        };

        repo.finish_run(
            run_id,
            stats.cards_processed,
            stats.rows_inserted,
            if errors > 0 { Some(&format!("{} errors", errors)) } else { None },
        ).ok();

        info!(
            "=== Done: {} cards | {} rows | {} errors | snapshot {} ===",
            stats.cards_processed, stats.rows_inserted, stats.errors, snapshot_date,
        );

        Ok(stats)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
