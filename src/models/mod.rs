use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ── Raw scraped rows ──────────────────────────────────────────────────────────

/// One marketplace listing as text fragments from the collector.
/// Empty/absent cells stay `None`; nothing is parsed here.
#[derive(Debug, Clone, Default)]
pub struct RawListingRow {
    pub card_name: Option<String>,
    pub label: Option<String>,
    pub box_name: Option<String>,
    pub set_name: Option<String>,
    pub number_in_set: Option<String>,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub price: Option<String>,    // "$1,234.56"
    pub stock: Option<String>,    // "8 of 10"
    pub shipping: Option<String>, // "+ $4.99 Shipping" / "Free Shipping"
    pub seller: Option<String>,
    pub sales: Option<String>,    // "(1,234 Sales)"
    pub direct: Option<String>,   // "yes" when the Direct Seller marker was present
}

/// The single featured/sponsored offer for a card, as scraped text.
#[derive(Debug, Clone, Default)]
pub struct RawSpotlightRow {
    pub price: Option<String>,
    pub stock: Option<String>,
    pub direct: Option<String>,
}

// ── Normalized records ────────────────────────────────────────────────────────

/// One marketplace offer with numeric fields parsed or marked missing.
/// Immutable after normalization; a row missing `price` is kept here and
/// only excluded at aggregation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingRecord {
    pub card_name: String,
    pub price: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub seller_name: String,
    pub seller_sales_count: Option<u32>,
    pub is_direct_seller: bool,
    pub stock_available: Option<u32>,
}

impl ListingRecord {
    /// Price plus shipping, with unknown shipping counted as free.
    /// Undefined while the price itself is unknown.
    pub fn total_cost(&self) -> Option<f64> {
        self.price.map(|p| p + self.shipping_cost.unwrap_or(0.0))
    }
}

/// The spotlight offer. No seller-sales field; `is_direct_seller` is the
/// deciding trust signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpotlightListing {
    pub card_name: String,
    pub price: Option<f64>,
    pub stock_available: Option<u32>,
    pub is_direct_seller: bool,
}

// ── Engine output ─────────────────────────────────────────────────────────────

/// Which branch produced a box price.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceBasis {
    SpotlightTrusted,
    MarketMeanFirst10,
    MarketFilteredMean,
    MarketRawMean,
}

impl PriceBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceBasis::SpotlightTrusted => "SPOTLIGHT_TRUSTED",
            PriceBasis::MarketMeanFirst10 => "MARKET_MEAN_FIRST10",
            PriceBasis::MarketFilteredMean => "MARKET_FILTERED_MEAN",
            PriceBasis::MarketRawMean => "MARKET_RAW_MEAN",
        }
    }
}

/// Final per-card estimate. `box_price` is `None` only when the card has no
/// priced listings at all, and `basis` is `None` exactly then.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardPriceEstimate {
    pub card_name: String,
    pub box_price: Option<f64>,
    pub basis: Option<PriceBasis>,
}

// ── Persistence rows ──────────────────────────────────────────────────────────

/// One `card_data` row, keyed (name, box_name, label, snapshot_date).
/// `price_avg` is the formatted string ("12.34" or "NA") because the
/// day-over-day diff compares it textually.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRow {
    pub name: String,
    pub label: String,
    pub set_name: String,
    pub number_in_set: String,
    pub image_url: String,
    pub box_name: String,
    pub url: String,
    pub price: Option<f64>,
    pub shipping: Option<f64>,
    pub stock: Option<u32>,
    pub price_avg: String,
    pub snapshot_date: NaiveDate,
    pub scraped_at: NaiveDateTime,
}

/// One stored estimate, keyed (name, box_name, label, snapshot_date).
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateRow {
    pub name: String,
    pub label: String,
    pub box_name: String,
    pub box_price: Option<f64>,
    pub basis: Option<PriceBasis>,
    pub snapshot_date: NaiveDate,
    pub computed_at: NaiveDateTime,
}
