//! Sample statistics for the price aggregation engine.
//!
//! Everything here is a pure function of its input; degenerate sample sizes
//! (0 or 1 values) are defined, never an error.

use crate::models::ListingRecord;

/// Arithmetic mean. `None` on an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (Bessel-corrected, divisor n−1).
/// `None` with fewer than 2 values.
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mu = mean(values)?;
    let var = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / (n - 1) as f64;
    Some(var.sqrt())
}

/// Keep values within `multiplier` sample deviations of the mean.
///
/// With 0 or 1 values the deviation is undefined and the input is returned
/// unchanged. The bound is inclusive, so values equal to the mean always
/// survive and the result is never empty.
pub fn filter_outliers(values: &[f64], multiplier: f64) -> Vec<f64> {
    if values.len() <= 1 {
        return values.to_vec();
    }
    // Both are Some for n >= 2.
    let mu = mean(values).unwrap();
    let sigma = sample_stddev(values).unwrap();
    values
        .iter()
        .copied()
        .filter(|v| (v - mu).abs() <= multiplier * sigma)
        .collect()
}

/// Whether a listing's own seller meets the sales threshold. An unknown
/// sales count is untrusted.
pub fn is_trusted(listing: &ListingRecord, min_sales: u32) -> bool {
    listing.seller_sales_count.is_some_and(|n| n >= min_sales)
}

/// Restrict a listing set to trusted sellers.
pub fn filter_trusted<'a>(
    listings: &'a [ListingRecord],
    min_sales: u32,
) -> Vec<&'a ListingRecord> {
    listings.iter().filter(|l| is_trusted(l, min_sales)).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sales: Option<u32>) -> ListingRecord {
        ListingRecord {
            card_name: "x".into(),
            price: Some(10.0),
            shipping_cost: Some(0.0),
            seller_name: "s".into(),
            seller_sales_count: sales,
            is_direct_seller: false,
            stock_available: None,
        }
    }

    #[test]
    fn test_mean_and_stddev() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[42.0]), Some(42.0));
        assert_eq!(mean(&[48.0, 52.0]), Some(50.0));

        assert_eq!(sample_stddev(&[]), None);
        assert_eq!(sample_stddev(&[42.0]), None);
        // [48, 52]: deviations ±2, variance 8/1 = 8, sigma = 2.828…
        let sigma = sample_stddev(&[48.0, 52.0]).unwrap();
        assert!((sigma - 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_outliers_identity_for_tiny_samples() {
        assert_eq!(filter_outliers(&[], 2.0), Vec::<f64>::new());
        assert_eq!(filter_outliers(&[7.5], 2.0), vec![7.5]);
    }

    #[test]
    fn test_outliers_sigma_zero_keeps_equal_values() {
        // All values equal the mean: sigma = 0 but the bound is inclusive.
        assert_eq!(filter_outliers(&[5.0, 5.0, 5.0], 2.0), vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_outliers_removes_extreme_value() {
        // n = 6: mean 41.667, sample sigma 77.57, bound 155.13.
        // |200 − 41.667| = 158.33 > bound, every 9..11 stays.
        // (n >= 6 matters: a lone outlier can never exceed 2 sample
        // deviations when n <= 5, since max |v−μ|/σ = (n−1)/√n.)
        let values = [10.0, 11.0, 9.0, 10.0, 10.0, 200.0];
        let kept = filter_outliers(&values, 2.0);
        assert_eq!(kept, vec![10.0, 11.0, 9.0, 10.0, 10.0]);
    }

    #[test]
    fn test_outliers_bound_property_and_stability() {
        let values = [10.0, 11.0, 9.0, 10.0, 10.0, 200.0];
        let mu = mean(&values).unwrap();
        let sigma = sample_stddev(&values).unwrap();

        let once = filter_outliers(&values, 2.0);
        for v in &once {
            assert!((v - mu).abs() <= 2.0 * sigma);
        }

        // Filtering an already-filtered set returns the same set.
        let twice = filter_outliers(&once, 2.0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_outliers_order_independent_multiset() {
        let mut a = filter_outliers(&[10.0, 11.0, 9.0, 10.0, 10.0, 200.0], 2.0);
        let mut b = filter_outliers(&[200.0, 10.0, 10.0, 9.0, 11.0, 10.0], 2.0);
        a.sort_by(f64::total_cmp);
        b.sort_by(f64::total_cmp);
        assert_eq!(a, b);
    }

    #[test]
    fn test_trusted_threshold_inclusive() {
        let listings = vec![
            record(Some(499)),
            record(Some(500)),
            record(Some(12_000)),
            record(None),
        ];
        let kept = filter_trusted(&listings, 500);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|l| l.seller_sales_count.unwrap() >= 500));
    }

    #[test]
    fn test_trusted_is_subset() {
        let listings = vec![record(Some(600)), record(None)];
        let kept = filter_trusted(&listings, 500);
        assert!(kept.len() <= listings.len());
        assert!(kept.iter().all(|k| listings.iter().any(|i| i == *k)));
    }
}
