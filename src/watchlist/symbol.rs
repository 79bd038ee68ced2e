//! Symbol normalization
//!
//! Maps a user-entered scrip name to the provider's symbol form. NSE scrips
//! are entered bare (`RELIANCE`) and need the exchange suffix (`RELIANCE.NS`);
//! anything that already carries a suffix (`500325.BO`) passes through.

/// Default exchange suffix (NSE on Yahoo)
pub const DEFAULT_SUFFIX: &str = ".NS";

/// Normalize a raw scrip name to a provider symbol
pub fn normalize_symbol(raw: &str, default_suffix: &str) -> String {
    let symbol = raw.trim();
    if symbol.contains('.') {
        symbol.to_string()
    } else {
        format!("{}{}", symbol, default_suffix)
    }
}
