//! Watchlist source adapters
//!
//! A source supplies, per tab, raw `{scrip name, target price}` rows. Rows
//! that cannot be used are skipped; only an unreachable or structurally
//! broken tab is an error, and it never affects other tabs.

mod csv_dir;
mod google_sheet;
mod rows;

pub use csv_dir::CsvDirSource;
pub use google_sheet::GoogleSheetSource;
pub use rows::{parse_watchlist_csv, rows_to_entries, RawRow};

use crate::error::Result;
use async_trait::async_trait;

/// Tabular watchlist feed
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    /// Source type (e.g., "google_sheet", "csv_dir")
    fn kind(&self) -> &'static str;

    /// Tab (watchlist) names in display order
    async fn tabs(&self) -> Result<Vec<String>>;

    /// Rows of one tab
    async fn fetch_tab(&self, tab: &str) -> Result<Vec<RawRow>>;
}
