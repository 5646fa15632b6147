use crate::models::{CardRow, EstimateRow, PriceBasis};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use duckdb::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS card_data (
    name            VARCHAR NOT NULL,
    label           VARCHAR NOT NULL DEFAULT '',
    "set"           VARCHAR,
    number_in_set   VARCHAR,
    image_url       VARCHAR,
    box_name        VARCHAR NOT NULL DEFAULT '',
    url             VARCHAR,
    -- One row per marketplace listing; missing fields stay NULL
    price           DOUBLE,
    shipping        DOUBLE,
    stock           INTEGER,
    -- Formatted ("12.34" or 'NA'); the diff compares these textually
    price_avg       VARCHAR NOT NULL,
    snapshot_date   DATE NOT NULL,
    scraped_at      TIMESTAMP NOT NULL
);

CREATE TABLE IF NOT EXISTS box_prices (
    name            VARCHAR NOT NULL,
    label           VARCHAR NOT NULL DEFAULT '',
    box_name        VARCHAR NOT NULL DEFAULT '',
    box_price       DOUBLE,
    basis           VARCHAR,
    snapshot_date   DATE NOT NULL,
    computed_at     TIMESTAMP NOT NULL,
    PRIMARY KEY (name, box_name, label, snapshot_date)
);

CREATE TABLE IF NOT EXISTS pricing_runs (
    id                  INTEGER PRIMARY KEY,
    started_at          TIMESTAMP NOT NULL,
    finished_at         TIMESTAMP,
    status              VARCHAR NOT NULL DEFAULT 'running',
    cards_processed     INTEGER DEFAULT 0,
    rows_inserted       INTEGER DEFAULT 0,
    error_msg           VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_card_data_date ON card_data (snapshot_date);
CREATE INDEX IF NOT EXISTS idx_card_data_name ON card_data (name);
CREATE INDEX IF NOT EXISTS idx_box_prices_date ON box_prices (snapshot_date);
"#;

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn.execute_batch(INDEXES).context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Card rows ─────────────────────────────────────────────────────────────

    /// Replace one card's listing rows for its snapshot date — idempotent,
    /// safe to re-run on the same data. All rows in a call are expected to
    /// share (name, box_name, label, snapshot_date).
    pub fn replace_card_rows(&self, rows: &[CardRow]) -> Result<usize> {
        if rows.is_empty() { return Ok(0); }

        let tx = self.conn.unchecked_transaction()?;
        let first = &rows[0];
        tx.execute(
            r#"DELETE FROM card_data
               WHERE name = ? AND box_name = ? AND label = ? AND snapshot_date = ?"#,
            params![first.name, first.box_name, first.label, first.snapshot_date],
        )?;

        let sql = r#"
            INSERT INTO card_data
                (name, label, "set", number_in_set, image_url, box_name, url,
                 price, shipping, stock, price_avg, snapshot_date, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        for row in rows {
            tx.execute(sql, params![
                row.name, row.label, row.set_name, row.number_in_set,
                row.image_url, row.box_name, row.url,
                row.price, row.shipping, row.stock.map(|s| s as i64),
                row.price_avg, row.snapshot_date, row.scraped_at,
            ]).with_context(|| format!("insert card row {} {}", row.name, row.box_name))?;
        }

        tx.commit()?;
        Ok(rows.len())
    }

    // ── Estimates ─────────────────────────────────────────────────────────────

    pub fn upsert_estimates(&self, estimates: &[EstimateRow]) -> Result<usize> {
        if estimates.is_empty() { return Ok(0); }

        let tx = self.conn.unchecked_transaction()?;
        let sql = r#"
            INSERT INTO box_prices
                (name, label, box_name, box_price, basis, snapshot_date, computed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (name, box_name, label, snapshot_date) DO UPDATE SET
                box_price   = excluded.box_price,
                basis       = excluded.basis,
                computed_at = excluded.computed_at
        "#;
        for est in estimates {
            tx.execute(sql, params![
                est.name, est.label, est.box_name,
                est.box_price, est.basis.map(|b| b.as_str()),
                est.snapshot_date, est.computed_at,
            ]).with_context(|| format!("upsert estimate {} {}", est.name, est.box_name))?;
        }

        tx.commit()?;
        Ok(estimates.len())
    }

    // ── Diff inputs ───────────────────────────────────────────────────────────

    /// Price-average strings for one snapshot, keyed (name, box_name).
    /// Rows are ordered by label so a key collision keeps the last label,
    /// matching the historical dict-overwrite behavior.
    pub fn price_avgs_for(
        &self,
        date: NaiveDate,
    ) -> Result<HashMap<(String, String), String>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT DISTINCT name, box_name, label, price_avg
               FROM card_data WHERE snapshot_date = ? ORDER BY name, box_name, label"#,
        )?;
        let mut out = HashMap::new();
        let rows = stmt.query_map(params![date], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(3)?))
        })?;
        for row in rows {
            let (name, box_name, price_avg) = row?;
            out.insert((name, box_name), price_avg);
        }
        Ok(out)
    }

    /// Snapshot dates present, most recent first.
    pub fn snapshot_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT snapshot_date FROM card_data ORDER BY snapshot_date DESC",
        )?;
        let dates: Vec<NaiveDate> = stmt
            .query_map([], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(dates)
    }

    // ── Stats ─────────────────────────────────────────────────────────────────

    pub fn listing_row_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM card_data")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn card_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare(
            "SELECT COUNT(*) FROM (SELECT DISTINCT name, box_name, label FROM card_data)",
        )?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn estimate_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM box_prices")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn date_range(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        let mut s = self.conn.prepare(
            "SELECT MIN(snapshot_date), MAX(snapshot_date) FROM card_data",
        )?;
        Ok(s.query_row([], |r| Ok((r.get(0)?, r.get(1)?)))?)
    }

    pub fn list_cards(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT name FROM card_data ORDER BY name",
        )?;
        let names: Vec<String> = stmt
            .query_map([], |r| r.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(names)
    }

    /// Estimates for one snapshot date, for display/audit.
    pub fn estimates_for(&self, date: NaiveDate) -> Result<Vec<EstimateRow>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT name, label, box_name, box_price, basis, snapshot_date, computed_at
               FROM box_prices WHERE snapshot_date = ? ORDER BY box_name, name, label"#,
        )?;
        let rows: Vec<EstimateRow> = stmt
            .query_map(params![date], |r| {
                Ok(EstimateRow {
                    name: r.get(0)?,
                    label: r.get(1)?,
                    box_name: r.get(2)?,
                    box_price: r.get(3)?,
                    basis: r.get::<_, Option<String>>(4)?
                        .as_deref()
                        .and_then(parse_basis),
                    snapshot_date: r.get(5)?,
                    computed_at: r.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ── Run log ───────────────────────────────────────────────────────────────

    pub fn begin_run(&self) -> Result<i64> {
        // DuckDB has no last_insert_rowid(); allocate the id up front.
        let id: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(id), 0) + 1 FROM pricing_runs",
            [],
            |r| r.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO pricing_runs (id, started_at, status) VALUES (?, ?, 'running')",
            params![id, Utc::now().naive_utc()],
        )?;
        Ok(id)
    }

    pub fn finish_run(
        &self, run_id: i64, cards: usize, rows: usize, error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"UPDATE pricing_runs SET
               finished_at = ?, status = ?,
               cards_processed = ?, rows_inserted = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                cards as i64, rows as i64, error, run_id,
            ],
        )?;
        Ok(())
    }
}

fn parse_basis(s: &str) -> Option<PriceBasis> {
    match s {
        "SPOTLIGHT_TRUSTED" => Some(PriceBasis::SpotlightTrusted),
        "MARKET_MEAN_FIRST10" => Some(PriceBasis::MarketMeanFirst10),
        "MARKET_FILTERED_MEAN" => Some(PriceBasis::MarketFilteredMean),
        "MARKET_RAW_MEAN" => Some(PriceBasis::MarketRawMean),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
