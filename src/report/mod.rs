//! Day-over-day price_avg diff report.
//!
//! The comparison is textual on the formatted price strings ("12.34" /
//! "NA"), not numeric with a tolerance: which diffs get reported is part
//! of the contract, and a numeric comparison would change it.

use std::collections::HashMap;

/// Formatted price_avg per (name, box_name) for one snapshot.
pub type PriceAvgs = HashMap<(String, String), String>;

/// Delivery limit per message part; splits happen at the last newline
/// before this boundary.
pub const MESSAGE_CHUNK_LIMIT: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceDiff {
    pub name: String,
    pub box_name: String,
    pub yesterday: Option<String>,
    pub today: String,
}

/// Compare today's keys against yesterday's. A key absent yesterday is a
/// difference (its old value renders as NA). Output is sorted for stable
/// reports.
pub fn diff_snapshots(today: &PriceAvgs, yesterday: &PriceAvgs) -> Vec<PriceDiff> {
    let mut diffs: Vec<PriceDiff> = today
        .iter()
        .filter_map(|((name, box_name), today_price)| {
            let old = yesterday.get(&(name.clone(), box_name.clone()));
            if old.map(String::as_str) == Some(today_price.as_str()) {
                None
            } else {
                Some(PriceDiff {
                    name: name.clone(),
                    box_name: box_name.clone(),
                    yesterday: old.cloned(),
                    today: today_price.clone(),
                })
            }
        })
        .collect();
    diffs.sort_by(|a, b| (&a.name, &a.box_name).cmp(&(&b.name, &b.box_name)));
    diffs
}

pub fn diff_line(diff: &PriceDiff) -> String {
    format!(
        "{} in {} - Yesterday: {}, Today: {}",
        diff.name,
        diff.box_name,
        diff.yesterday.as_deref().unwrap_or("NA"),
        diff.today,
    )
}

/// Assemble the full report body, or `None` when nothing changed.
pub fn render_report(diffs: &[PriceDiff]) -> Option<String> {
    if diffs.is_empty() {
        return None;
    }
    let mut content =
        String::from("Differences found in price_avg between today and yesterday:\n");
    for diff in diffs {
        content.push_str(&diff_line(diff));
        content.push('\n');
    }
    Some(content)
}

/// Split a message at the last newline before `max_len`; a single line
/// longer than the limit is hard-split. The carried-over remainder is
/// trimmed.
pub fn chunk_message(content: &str, max_len: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = content.to_string();
    while rest.len() > max_len {
        let mut boundary = max_len;
        while !rest.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let cut = rest[..boundary].rfind('\n').unwrap_or(boundary);
        parts.push(rest[..cut].to_string());
        rest = rest[cut..].trim().to_string();
    }
    parts.push(rest);
    parts
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn avgs(entries: &[(&str, &str, &str)]) -> PriceAvgs {
        entries
            .iter()
            .map(|(n, b, p)| ((n.to_string(), b.to_string()), p.to_string()))
            .collect()
    }

    #[test]
    fn test_string_inequality_not_numeric() {
        let today = avgs(&[("Charizard", "Box", "50.0")]);
        let yesterday = avgs(&[("Charizard", "Box", "50.00")]);
        // Numerically equal, textually different: reported.
        assert_eq!(diff_snapshots(&today, &yesterday).len(), 1);

        let same = avgs(&[("Charizard", "Box", "50.00")]);
        assert!(diff_snapshots(&same, &yesterday).is_empty());
    }

    #[test]
    fn test_missing_yesterday_key_is_reported() {
        let today = avgs(&[("Mew", "New Box", "9.99")]);
        let diffs = diff_snapshots(&today, &PriceAvgs::new());
        assert_eq!(diffs.len(), 1);
        assert_eq!(
            diff_line(&diffs[0]),
            "Mew in New Box - Yesterday: NA, Today: 9.99"
        );
    }

    #[test]
    fn test_diff_line_format() {
        let diff = PriceDiff {
            name: "Charizard".into(),
            box_name: "Top Shelf 151".into(),
            yesterday: Some("100.00".into()),
            today: "105.00".into(),
        };
        assert_eq!(
            diff_line(&diff),
            "Charizard in Top Shelf 151 - Yesterday: 100.00, Today: 105.00"
        );
    }

    #[test]
    fn test_render_report_empty_and_nonempty() {
        assert_eq!(render_report(&[]), None);

        let diff = PriceDiff {
            name: "Mew".into(),
            box_name: "Box".into(),
            yesterday: None,
            today: "1.00".into(),
        };
        let report = render_report(std::slice::from_ref(&diff)).unwrap();
        assert!(report.starts_with(
            "Differences found in price_avg between today and yesterday:\n"
        ));
        assert!(report.ends_with("Mew in Box - Yesterday: NA, Today: 1.00\n"));
    }

    #[test]
    fn test_chunk_short_message_single_part() {
        let parts = chunk_message("hello\nworld", MESSAGE_CHUNK_LIMIT);
        assert_eq!(parts, vec!["hello\nworld"]);
    }

    #[test]
    fn test_chunk_splits_at_last_newline() {
        // 60 lines of 49 chars + newline each = 3000 chars.
        let line = "x".repeat(49);
        let content: String = (0..60).map(|_| format!("{}\n", line)).collect();
        let parts = chunk_message(&content, MESSAGE_CHUNK_LIMIT);

        assert!(parts.len() >= 2);
        for part in &parts {
            assert!(part.len() <= MESSAGE_CHUNK_LIMIT);
        }
        // No line is split across parts.
        for part in &parts {
            for l in part.lines() {
                assert!(l.is_empty() || l == line);
            }
        }
        // Nothing is lost.
        let total: usize = parts
            .iter()
            .map(|p| p.lines().filter(|l| !l.is_empty()).count())
            .sum();
        assert_eq!(total, 60);
    }

    #[test]
    fn test_chunk_hard_splits_without_newline() {
        let content = "y".repeat(4500);
        let parts = chunk_message(&content, MESSAGE_CHUNK_LIMIT);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 2000);
        assert_eq!(parts[1].len(), 2000);
        assert_eq!(parts[2].len(), 500);
    }
}
