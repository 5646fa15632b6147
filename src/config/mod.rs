use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineConfig,
    pub notifier: NotifierConfig,
}

/// Aggregation engine knobs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_deviation_multiplier")]
    pub deviation_multiplier: f64,

    #[serde(default = "default_min_trusted_sales")]
    pub min_trusted_sales: u32,

    #[serde(default = "default_spotlight_min_stock")]
    pub spotlight_min_stock: u32,

    #[serde(default = "default_spotlight_sample_size")]
    pub spotlight_sample_size: usize,

    /// Whether an absent shipping element reads as free ($0) or unknown.
    /// The two collector contexts historically disagreed; pick per caller.
    #[serde(default = "default_true")]
    pub missing_shipping_means_free: bool,

    /// Restore the historical card-level trust check (one qualifying
    /// seller trusts every listing of the card) for bit-for-bit parity
    /// with old output.
    #[serde(default)]
    pub legacy_card_level_trust: bool,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

/// Diff report delivery. Explicit object, never ambient env lookup at the
/// call site: the notifier is constructed from this and nothing else.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_deviation_multiplier() -> f64 {
    2.0
}
fn default_min_trusted_sales() -> u32 {
    500
}
fn default_spotlight_min_stock() -> u32 {
    25
}
fn default_spotlight_sample_size() -> usize {
    10
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/boxprice.duckdb")
}
fn default_concurrency() -> usize {
    4
}
fn default_username() -> String {
    "Price Checker Bot".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_true() -> bool {
    true
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("BOXPRICE").separator("__"))
            .build()?;

        let app_cfg: AppConfig = cfg.try_deserialize().unwrap_or_else(|_| AppConfig::default());
        Ok(app_cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            storage: StorageConfig {
                db_path: default_db_path(),
                run_migrations: true,
            },
            pipeline: PipelineConfig {
                concurrency: default_concurrency(),
            },
            notifier: NotifierConfig::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deviation_multiplier: default_deviation_multiplier(),
            min_trusted_sales: default_min_trusted_sales(),
            spotlight_min_stock: default_spotlight_min_stock(),
            spotlight_sample_size: default_spotlight_sample_size(),
            missing_shipping_means_free: true,
            legacy_card_level_trust: false,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            username: default_username(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}
