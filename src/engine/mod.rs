//! Card price aggregation engine.
//!
//! Turns one card's normalized listing set plus its optional spotlight
//! offer into a single box price:
//!
//!   1. Spotlight reconciliation — a direct-seller spotlight with enough
//!      stock is trusted when its price sits within the deviation band of
//!      the first listings' costs; otherwise the market decides.
//!   2. Market branch — outlier-filter the total costs, restrict to
//!      trusted sellers, and take the mean; relax the trust filter when it
//!      empties the set.
//!
//! Pure and stateless per card: cards can be estimated concurrently with
//! no shared state, and one card's bad data never fails the batch.

pub mod normalize;
pub mod stats;

use tracing::debug;

use crate::config::EngineConfig;
use crate::models::{CardPriceEstimate, ListingRecord, PriceBasis, SpotlightListing};

// ── Spotlight reconciler ──────────────────────────────────────────────────────

/// Where reconciliation landed for one card.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SpotlightDecision {
    /// No spotlight offer, or its price never parsed.
    NoSpotlight,
    /// Failed the direct-seller/stock gate, or no priced listings to
    /// compare against.
    Ineligible,
    /// Within the deviation band of the early market sample.
    Trusted(f64),
    /// Priced outside the band; the full market mean takes over.
    Rejected,
}

fn reconcile_spotlight(
    spotlight: Option<&SpotlightListing>,
    listings: &[ListingRecord],
    cfg: &EngineConfig,
) -> SpotlightDecision {
    let Some(spot) = spotlight else {
        return SpotlightDecision::NoSpotlight;
    };
    let Some(price) = spot.price else {
        return SpotlightDecision::NoSpotlight;
    };

    let enough_stock = spot
        .stock_available
        .is_some_and(|s| s >= cfg.spotlight_min_stock);
    if !spot.is_direct_seller || !enough_stock {
        return SpotlightDecision::Ineligible;
    }

    // First N priced listings in scrape order.
    let sample: Vec<f64> = listings
        .iter()
        .filter_map(ListingRecord::total_cost)
        .take(cfg.spotlight_sample_size)
        .collect();
    if sample.is_empty() {
        return SpotlightDecision::Ineligible;
    }

    let mu = stats::mean(&sample).unwrap();
    // A single sampled cost means sigma 0: the spotlight must match exactly.
    let sigma = stats::sample_stddev(&sample).unwrap_or(0.0);

    if (price - mu).abs() <= cfg.deviation_multiplier * sigma {
        SpotlightDecision::Trusted(price)
    } else {
        SpotlightDecision::Rejected
    }
}

// ── Market branch ─────────────────────────────────────────────────────────────

fn market_estimate(
    listings: &[ListingRecord],
    cfg: &EngineConfig,
) -> (Option<f64>, Option<PriceBasis>) {
    let priced: Vec<(&ListingRecord, f64)> = listings
        .iter()
        .filter_map(|l| l.total_cost().map(|c| (l, c)))
        .collect();
    if priced.is_empty() {
        return (None, None);
    }

    let costs: Vec<f64> = priced.iter().map(|(_, c)| *c).collect();
    let banded: Vec<(&ListingRecord, f64)> = if costs.len() <= 1 {
        priced
    } else {
        let mu = stats::mean(&costs).unwrap();
        let sigma = stats::sample_stddev(&costs).unwrap();
        priced
            .into_iter()
            .filter(|(_, c)| (c - mu).abs() <= cfg.deviation_multiplier * sigma)
            .collect()
    };

    let trusted: Vec<f64> = if cfg.legacy_card_level_trust {
        // Historical card-level check: one qualifying seller trusts every
        // listing of the card.
        if banded
            .iter()
            .any(|(l, _)| stats::is_trusted(l, cfg.min_trusted_sales))
        {
            banded.iter().map(|(_, c)| *c).collect()
        } else {
            Vec::new()
        }
    } else {
        banded
            .iter()
            .filter(|(l, _)| stats::is_trusted(l, cfg.min_trusted_sales))
            .map(|(_, c)| *c)
            .collect()
    };

    if let Some(avg) = stats::mean(&trusted) {
        return (Some(avg), Some(PriceBasis::MarketFilteredMean));
    }

    // No trusted sellers left: relax the trust filter.
    let banded_costs: Vec<f64> = banded.iter().map(|(_, c)| *c).collect();
    match stats::mean(&banded_costs) {
        Some(avg) => (Some(avg), Some(PriceBasis::MarketRawMean)),
        None => (None, None),
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Estimate one card's box price. Pure composition of the reconciler and
/// the market branch; `box_price` is `None` only when the card has no
/// priced listings at all.
pub fn estimate(
    card_name: &str,
    listings: &[ListingRecord],
    spotlight: Option<&SpotlightListing>,
    cfg: &EngineConfig,
) -> CardPriceEstimate {
    let (box_price, basis) = match reconcile_spotlight(spotlight, listings, cfg) {
        SpotlightDecision::Trusted(price) => (Some(price), Some(PriceBasis::SpotlightTrusted)),
        SpotlightDecision::Rejected => {
            // A rejected spotlight falls back to the unfiltered mean over
            // every priced listing.
            let costs: Vec<f64> = listings.iter().filter_map(ListingRecord::total_cost).collect();
            match stats::mean(&costs) {
                Some(avg) => (Some(avg), Some(PriceBasis::MarketRawMean)),
                None => (None, None),
            }
        }
        SpotlightDecision::NoSpotlight | SpotlightDecision::Ineligible => {
            market_estimate(listings, cfg)
        }
    };

    debug!("{}: box price {:?} via {:?}", card_name, box_price, basis);

    CardPriceEstimate {
        card_name: card_name.to_string(),
        box_price,
        basis,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
