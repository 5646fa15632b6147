use crate::models::{ListingRecord, RawListingRow, RawSpotlightRow, SpotlightListing};

/// How an absent shipping element is read. The two historical collector
/// contexts disagree: the market scraper treats it as free, the box scraper
/// as unknown. Callers must say which they mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub missing_shipping_means_free: bool,
}

// ── Field parsers ─────────────────────────────────────────────────────────────

/// Parse a price: strip currency symbol and thousands separators.
/// "$1,234.56" → 1234.56 | "610.00" → 610.0. Negative or garbage → None.
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "NA" || s == "-" || s == "—" {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok().filter(|v: &f64| *v >= 0.0)
}

/// Parse the leading integer of a "N of M" stock string.
/// "8 of 10" → 8 | "3" → 3 | "NA" → None.
pub fn parse_stock(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || s == "NA" {
        return None;
    }
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parse a seller sales count from "(1,234 Sales)".
pub fn parse_sales(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || s == "NA" {
        return None;
    }
    let cleaned: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// True only when the explicit Direct Seller marker was scraped.
pub fn parse_direct(s: Option<&str>) -> bool {
    matches!(
        s.map(str::trim),
        Some(v) if v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("direct seller")
    )
}

/// Shipping: "Free Shipping" and "0" are free; an absent element resolves
/// per the caller's policy.
pub fn parse_shipping(s: Option<&str>, opts: NormalizeOptions) -> Option<f64> {
    match s.map(str::trim) {
        None | Some("") => {
            if opts.missing_shipping_means_free {
                Some(0.0)
            } else {
                None
            }
        }
        Some(v) if v.eq_ignore_ascii_case("free shipping") => Some(0.0),
        Some(v) => parse_price(v),
    }
}

// ── Raw row → ListingRecord ───────────────────────────────────────────────────

/// Normalize one scraped row. Never drops the row: unparseable fields are
/// tagged missing and a priceless record is only excluded at aggregation.
pub fn normalize_listing(row: &RawListingRow, opts: NormalizeOptions) -> ListingRecord {
    ListingRecord {
        card_name: row.card_name.clone().unwrap_or_default().trim().to_string(),
        price: row.price.as_deref().and_then(parse_price),
        shipping_cost: parse_shipping(row.shipping.as_deref(), opts),
        seller_name: row.seller.clone().unwrap_or_default().trim().to_string(),
        seller_sales_count: row.sales.as_deref().and_then(parse_sales),
        is_direct_seller: parse_direct(row.direct.as_deref()),
        stock_available: row.stock.as_deref().and_then(parse_stock),
    }
}

/// Normalize the spotlight row for a card.
pub fn normalize_spotlight(card_name: &str, row: &RawSpotlightRow) -> SpotlightListing {
    SpotlightListing {
        card_name: card_name.trim().to_string(),
        price: row.price.as_deref().and_then(parse_price),
        stock_available: row.stock.as_deref().and_then(parse_stock),
        is_direct_seller: parse_direct(row.direct.as_deref()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FREE: NormalizeOptions = NormalizeOptions { missing_shipping_means_free: true };
    const UNKNOWN: NormalizeOptions = NormalizeOptions { missing_shipping_means_free: false };

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$1,234.56"), Some(1234.56));
        assert_eq!(parse_price("610.00"), Some(610.0));
        assert_eq!(parse_price("  $5  "), Some(5.0));
        assert_eq!(parse_price("NA"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("-"), None);
        assert_eq!(parse_price("-5.00"), None);
        assert_eq!(parse_price("call for price"), None);
    }

    #[test]
    fn test_parse_stock() {
        assert_eq!(parse_stock("8 of 10"), Some(8));
        assert_eq!(parse_stock("120 of 300"), Some(120));
        assert_eq!(parse_stock("3"), Some(3));
        assert_eq!(parse_stock("NA"), None);
        assert_eq!(parse_stock("of 10"), None);
    }

    #[test]
    fn test_parse_sales() {
        assert_eq!(parse_sales("(1,234 Sales)"), Some(1234));
        assert_eq!(parse_sales("(7 Sales)"), Some(7));
        assert_eq!(parse_sales("500"), Some(500));
        assert_eq!(parse_sales("NA"), None);
    }

    #[test]
    fn test_parse_direct() {
        assert!(parse_direct(Some("yes")));
        assert!(parse_direct(Some("Direct Seller")));
        assert!(!parse_direct(Some("no")));
        assert!(!parse_direct(None));
    }

    #[test]
    fn test_shipping_policy_switch() {
        assert_eq!(parse_shipping(None, FREE), Some(0.0));
        assert_eq!(parse_shipping(None, UNKNOWN), None);
        assert_eq!(parse_shipping(Some(""), FREE), Some(0.0));
        assert_eq!(parse_shipping(Some("Free Shipping"), UNKNOWN), Some(0.0));
        assert_eq!(parse_shipping(Some("$4.99"), UNKNOWN), Some(4.99));
    }

    #[test]
    fn test_normalize_keeps_partial_rows() {
        let row = RawListingRow {
            card_name: Some("Charizard".into()),
            seller: Some("shopA".into()),
            ..Default::default()
        };
        let rec = normalize_listing(&row, UNKNOWN);
        assert_eq!(rec.card_name, "Charizard");
        assert_eq!(rec.price, None);
        assert_eq!(rec.total_cost(), None);
        assert!(!rec.is_direct_seller);
    }

    #[test]
    fn test_normalize_full_row() {
        let row = RawListingRow {
            card_name: Some("Pikachu".into()),
            price: Some("$12.50".into()),
            stock: Some("4 of 4".into()),
            shipping: Some("+ $1.25 Shipping".into()),
            seller: Some("shopB".into()),
            sales: Some("(12,000 Sales)".into()),
            direct: Some("yes".into()),
            ..Default::default()
        };
        let rec = normalize_listing(&row, FREE);
        assert_eq!(rec.price, Some(12.5));
        assert_eq!(rec.shipping_cost, Some(1.25));
        assert_eq!(rec.total_cost(), Some(13.75));
        assert_eq!(rec.seller_sales_count, Some(12_000));
        assert_eq!(rec.stock_available, Some(4));
        assert!(rec.is_direct_seller);
    }

    #[test]
    fn test_normalize_spotlight() {
        let row = RawSpotlightRow {
            price: Some("$51.00".into()),
            stock: Some("30 of 30".into()),
            direct: Some("yes".into()),
        };
        let s = normalize_spotlight("Mewtwo", &row);
        assert_eq!(s.price, Some(51.0));
        assert_eq!(s.stock_available, Some(30));
        assert!(s.is_direct_seller);
    }
}
