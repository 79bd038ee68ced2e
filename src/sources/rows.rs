//! Watchlist row parsing

use crate::error::{AppError, Result};
use crate::watchlist::WatchlistEntry;
use std::collections::HashSet;

const SCRIP_COLUMN: &str = "scrip name";
const TARGET_COLUMN: &str = "target price";

/// One usable source row
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub scrip_name: String,
    pub target_price: f64,
}

/// Parse a CSV export of one tab.
///
/// Columns are matched case-insensitively after trimming. Rows with an empty
/// name, a non-numeric target or a non-positive target are skipped.
pub fn parse_watchlist_csv(tab: &str, text: &str) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::source(tab, format!("unreadable header: {}", e)))?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    };

    let (Some(scrip_idx), Some(target_idx)) = (column(SCRIP_COLUMN), column(TARGET_COLUMN)) else {
        return Err(AppError::source(
            tab,
            format!("missing 'Scrip Name' or 'Target Price' column (found {:?})", headers),
        ));
    };

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping bad line {} in '{}': {}", line + 2, tab, e);
                continue;
            }
        };

        let scrip = record.get(scrip_idx).unwrap_or("").trim();
        if scrip.is_empty() || scrip.eq_ignore_ascii_case("nan") {
            continue;
        }

        let Some(target) = record.get(target_idx).and_then(parse_price) else {
            tracing::debug!("Skipping '{}' in '{}': no usable target price", scrip, tab);
            continue;
        };

        rows.push(RawRow {
            scrip_name: scrip.to_string(),
            target_price: target,
        });
    }

    Ok(rows)
}

fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('₹')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// Build entries, keeping the first occurrence of a duplicated scrip
pub fn rows_to_entries(tab: &str, rows: Vec<RawRow>, default_suffix: &str) -> Vec<WatchlistEntry> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| {
            let fresh = seen.insert(row.scrip_name.clone());
            if !fresh {
                tracing::warn!("Duplicate scrip '{}' in '{}' ignored", row.scrip_name, tab);
            }
            fresh
        })
        .map(|row| WatchlistEntry::new(row.scrip_name, row.target_price, default_suffix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchlist::DEFAULT_SUFFIX;

    #[test]
    fn test_parse_skips_malformed_rows() {
        let text = "\
 Scrip Name , Target Price ,Notes
RELIANCE,3000,breakout
,150,
nan,200,
TCS,abc,
INFY,-5,
HDFCBANK,\"1,750.50\",
SBIN.BO,800
";
        let rows = parse_watchlist_csv("Intraday", text).unwrap();
        assert_eq!(
            rows,
            vec![
                RawRow { scrip_name: "RELIANCE".to_string(), target_price: 3000.0 },
                RawRow { scrip_name: "HDFCBANK".to_string(), target_price: 1750.5 },
                RawRow { scrip_name: "SBIN.BO".to_string(), target_price: 800.0 },
            ]
        );
    }

    #[test]
    fn test_missing_columns_is_source_error() {
        let err = parse_watchlist_csv("Broken", "Symbol,Price\nTCS,4000\n").unwrap_err();
        assert!(matches!(err, AppError::Source { ref tab, .. } if tab == "Broken"));
    }

    #[test]
    fn test_duplicates_keep_first() {
        let rows = vec![
            RawRow { scrip_name: "TCS".to_string(), target_price: 4000.0 },
            RawRow { scrip_name: "TCS".to_string(), target_price: 4100.0 },
            RawRow { scrip_name: "INFY".to_string(), target_price: 1500.0 },
        ];
        let entries = rows_to_entries("Demo", rows, DEFAULT_SUFFIX);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].target_price, 4000.0);
        assert_eq!(entries[1].normalized_symbol, "INFY.NS");
    }
}
