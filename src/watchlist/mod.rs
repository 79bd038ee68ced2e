//! Watchlist data model
//!
//! A watchlist is a named, ordered list of scrips with a target price each.
//! Only `current_price` and `status` change during a refresh; the target is
//! fixed when the list is loaded.

mod store;
mod symbol;

pub use store::{StoreSnapshot, WatchlistStore};
pub use symbol::{normalize_symbol, DEFAULT_SUFFIX};

use serde::{Deserialize, Serialize};

/// Terminal status of an entry after a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    NotFetched,
    BelowTarget,
    TargetHit,
    NoData,
    Timeout,
    Error,
}

impl Status {
    /// Human-readable label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotFetched => "Not Fetched",
            Status::BelowTarget => "Below Target",
            Status::TargetHit => "Target Hit!",
            Status::NoData => "No Data",
            Status::Timeout => "Timeout",
            Status::Error => "Error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One scrip in a watchlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub scrip_name: String,
    pub normalized_symbol: String,
    pub target_price: f64,
    /// `None` until the first fetch attempt
    pub current_price: Option<f64>,
    pub status: Status,
}

impl WatchlistEntry {
    /// Create a freshly loaded entry
    pub fn new(scrip_name: impl Into<String>, target_price: f64, default_suffix: &str) -> Self {
        let scrip_name = scrip_name.into();
        let normalized_symbol = normalize_symbol(&scrip_name, default_suffix);
        Self {
            scrip_name,
            normalized_symbol,
            target_price,
            current_price: None,
            status: Status::NotFetched,
        }
    }

    /// Record a usable price and the resulting status
    pub fn set_price(&mut self, price: f64, status: Status) {
        self.current_price = Some(price);
        self.status = status;
    }

    /// Record a failed fetch; the price is reset to zero
    pub fn set_failed(&mut self, status: Status) {
        self.current_price = Some(0.0);
        self.status = status;
    }
}

/// Named, ordered sequence of entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    pub name: String,
    pub entries: Vec<WatchlistEntry>,
}

impl Watchlist {
    pub fn new(name: impl Into<String>, entries: Vec<WatchlistEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_is_not_fetched() {
        let entry = WatchlistEntry::new("RELIANCE", 3000.0, DEFAULT_SUFFIX);
        assert_eq!(entry.normalized_symbol, "RELIANCE.NS");
        assert_eq!(entry.current_price, None);
        assert_eq!(entry.status, Status::NotFetched);
    }

    #[test]
    fn test_failed_entry_resets_price() {
        let mut entry = WatchlistEntry::new("TCS", 4000.0, DEFAULT_SUFFIX);
        entry.set_price(3950.0, Status::BelowTarget);
        entry.set_failed(Status::Timeout);
        assert_eq!(entry.current_price, Some(0.0));
        assert_eq!(entry.status, Status::Timeout);
        assert_eq!(entry.target_price, 4000.0);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&Status::TargetHit).unwrap();
        assert_eq!(json, "\"target_hit\"");
        assert_eq!(Status::NoData.to_string(), "No Data");
    }
}
