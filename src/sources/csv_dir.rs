//! Local CSV directory source: one `<watchlist>.csv` per watchlist

use super::{parse_watchlist_csv, RawRow, WatchlistSource};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl WatchlistSource for CsvDirSource {
    fn kind(&self) -> &'static str {
        "csv_dir"
    }

    async fn tabs(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| AppError::source(self.dir.display().to_string(), e))?;

        let mut tabs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_csv = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tabs.push(stem.to_string());
            }
        }

        tabs.sort();
        Ok(tabs)
    }

    async fn fetch_tab(&self, tab: &str) -> Result<Vec<RawRow>> {
        let path = self.dir.join(format!("{}.csv", tab));
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AppError::source(tab, format!("{}: {}", path.display(), e)))?;
        parse_watchlist_csv(tab, &text)
    }
}
