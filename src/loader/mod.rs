//! CSV loader for the collector handoff.
//!
//! The external scraping collaborator writes one CSV per run with the
//! columns
//! `kind,card_name,label,box_name,set,number_in_set,image_url,url,price,stock,shipping,seller,sales,direct`
//! where `kind` is `listing` or `spotlight`. Rows sharing
//! (card_name, box_name, label) form one card batch; row order within the
//! file is scrape order, which the engine's spotlight sample depends on.

use crate::models::{RawListingRow, RawSpotlightRow};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// All raw rows for one (card, box, label) key, in scrape order.
#[derive(Debug, Clone, Default)]
pub struct CardBatch {
    pub card_name: String,
    pub label: String,
    pub box_name: String,
    pub set_name: String,
    pub number_in_set: String,
    pub image_url: String,
    pub url: String,
    pub listings: Vec<RawListingRow>,
    pub spotlight: Option<RawSpotlightRow>,
}

fn cell(record: &csv::StringRecord, i: usize) -> Option<String> {
    record
        .get(i)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Group collector rows into per-card batches, preserving scrape order.
pub fn read_batches<R: Read>(reader: R) -> Result<Vec<CardBatch>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut batches: Vec<CardBatch> = Vec::new();
    let mut index: HashMap<(String, String, String), usize> = HashMap::new();

    for (i, result) in csv_reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {}: {}", i + 1, e);
                continue;
            }
        };

        let kind = cell(&record, 0).unwrap_or_default().to_lowercase();
        let Some(card_name) = cell(&record, 1) else {
            warn!("Row {}: no card name, skipping", i + 1);
            continue;
        };
        let label = cell(&record, 2).unwrap_or_default();
        let box_name = cell(&record, 3).unwrap_or_default();

        let key = (card_name.clone(), box_name.clone(), label.clone());
        let idx = *index.entry(key).or_insert_with(|| {
            batches.push(CardBatch {
                card_name: card_name.clone(),
                label: label.clone(),
                box_name: box_name.clone(),
                set_name: cell(&record, 4).unwrap_or_default(),
                number_in_set: cell(&record, 5).unwrap_or_default(),
                image_url: cell(&record, 6).unwrap_or_default(),
                url: cell(&record, 7).unwrap_or_default(),
                ..Default::default()
            });
            batches.len() - 1
        });
        let batch = &mut batches[idx];

        match kind.as_str() {
            "listing" => batch.listings.push(RawListingRow {
                card_name: Some(card_name),
                label: cell(&record, 2),
                box_name: cell(&record, 3),
                set_name: cell(&record, 4),
                number_in_set: cell(&record, 5),
                image_url: cell(&record, 6),
                url: cell(&record, 7),
                price: cell(&record, 8),
                stock: cell(&record, 9),
                shipping: cell(&record, 10),
                seller: cell(&record, 11),
                sales: cell(&record, 12),
                direct: cell(&record, 13),
            }),
            "spotlight" => {
                if batch.spotlight.is_some() {
                    warn!("Row {}: duplicate spotlight for {}, keeping first", i + 1, batch.card_name);
                } else {
                    batch.spotlight = Some(RawSpotlightRow {
                        price: cell(&record, 8),
                        stock: cell(&record, 9),
                        direct: cell(&record, 13),
                    });
                }
            }
            other => warn!("Row {}: unknown kind {:?}, skipping", i + 1, other),
        }
    }

    Ok(batches)
}

/// Load one collector CSV from disk.
pub fn load_batches(path: &Path) -> Result<Vec<CardBatch>> {
    debug!("Loading batches from {:?}", path);
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not open {:?}", path))?;
    let batches = read_batches(file)?;
    info!("{:?}: {} card batches", path, batches.len());
    Ok(batches)
}

pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "csv").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "kind,card_name,label,box_name,set,number_in_set,image_url,url,price,stock,shipping,seller,sales,direct\n";

    #[test]
    fn test_groups_by_card_box_label() {
        let csv = format!(
            "{HEADER}\
             listing,Charizard,Holofoil,Top Shelf 151,Base Set,4/102,img,u,$100.00,3 of 3,,shopA,(600 Sales),\n\
             listing,Pikachu,,Top Shelf 151,Base Set,58/102,img2,u2,$5.00,1 of 1,,shopB,(40 Sales),\n\
             listing,Charizard,Holofoil,Top Shelf 151,,,,,$110.00,2 of 2,+ $3.00 Shipping,shopC,(1 Sales),yes\n"
        );
        let batches = read_batches(csv.as_bytes()).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].card_name, "Charizard");
        assert_eq!(batches[0].listings.len(), 2);
        assert_eq!(batches[0].set_name, "Base Set");
        assert_eq!(batches[1].card_name, "Pikachu");
        assert_eq!(batches[1].listings.len(), 1);
    }

    #[test]
    fn test_preserves_scrape_order() {
        let csv = format!(
            "{HEADER}\
             listing,Mew,,Box,,,,,$1.00,,,s1,,\n\
             listing,Mew,,Box,,,,,$2.00,,,s2,,\n\
             listing,Mew,,Box,,,,,$3.00,,,s3,,\n"
        );
        let batches = read_batches(csv.as_bytes()).unwrap();
        let prices: Vec<_> = batches[0]
            .listings
            .iter()
            .map(|l| l.price.clone().unwrap())
            .collect();
        assert_eq!(prices, vec!["$1.00", "$2.00", "$3.00"]);
    }

    #[test]
    fn test_spotlight_attaches_to_batch() {
        let csv = format!(
            "{HEADER}\
             listing,Mewtwo,,Box,,,,,$50.00,,,s1,(600 Sales),\n\
             spotlight,Mewtwo,,Box,,,,,$51.00,30 of 30,,,,yes\n"
        );
        let batches = read_batches(csv.as_bytes()).unwrap();
        assert_eq!(batches.len(), 1);
        let spot = batches[0].spotlight.as_ref().unwrap();
        assert_eq!(spot.price.as_deref(), Some("$51.00"));
        assert_eq!(spot.stock.as_deref(), Some("30 of 30"));
        assert_eq!(spot.direct.as_deref(), Some("yes"));
    }

    #[test]
    fn test_empty_cells_are_missing() {
        let csv = format!("{HEADER}listing,Eevee,,Box,,,,,,,,,,\n");
        let batches = read_batches(csv.as_bytes()).unwrap();
        let row = &batches[0].listings[0];
        assert_eq!(row.price, None);
        assert_eq!(row.stock, None);
        assert_eq!(row.seller, None);
    }

    #[test]
    fn test_skips_unknown_kind_and_nameless_rows() {
        let csv = format!(
            "{HEADER}\
             bogus,Eevee,,Box,,,,,,,,,,\n\
             listing,,,Box,,,,,$1.00,,,,,\n\
             listing,Eevee,,Box,,,,,$2.00,,,,,\n"
        );
        let batches = read_batches(csv.as_bytes()).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].listings.len(), 1);
        assert_eq!(batches[0].listings[0].price.as_deref(), Some("$2.00"));
    }
}
