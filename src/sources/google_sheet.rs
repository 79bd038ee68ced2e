//! Public Google Sheet source
//!
//! Each configured tab is fetched as CSV, by gid when one is configured and
//! by tab name through the gviz endpoint otherwise.

use super::{parse_watchlist_csv, RawRow, WatchlistSource};
use crate::config::{SheetTab, SourceConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

pub struct GoogleSheetSource {
    client: Client,
    base_url: String,
    sheet_id: String,
    tabs: Vec<SheetTab>,
}

impl GoogleSheetSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        if config.sheet_id.trim().is_empty() {
            return Err(AppError::Config("source.sheet_id is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.sheet_base_url.trim_end_matches('/').to_string(),
            sheet_id: config.sheet_id.trim().to_string(),
            tabs: config.tabs.clone(),
        })
    }

    /// CSV export URL for a tab
    fn export_url(&self, tab: &SheetTab) -> String {
        match &tab.gid {
            Some(gid) => format!(
                "{}/spreadsheets/d/{}/export?format=csv&gid={}",
                self.base_url, self.sheet_id, gid
            ),
            None => format!(
                "{}/spreadsheets/d/{}/gviz/tq?tqx=out:csv&sheet={}",
                self.base_url,
                self.sheet_id,
                urlencoding::encode(&tab.name)
            ),
        }
    }
}

#[async_trait]
impl WatchlistSource for GoogleSheetSource {
    fn kind(&self) -> &'static str {
        "google_sheet"
    }

    async fn tabs(&self) -> Result<Vec<String>> {
        Ok(self.tabs.iter().map(|t| t.name.clone()).collect())
    }

    async fn fetch_tab(&self, tab: &str) -> Result<Vec<RawRow>> {
        let sheet_tab = self
            .tabs
            .iter()
            .find(|t| t.name == tab)
            .ok_or_else(|| AppError::NotFound(format!("Tab '{}' is not configured", tab)))?;

        let url = self.export_url(sheet_tab);
        info!("Fetching sheet data for {} from: {}", tab, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::source(tab, e))?;

        if !response.status().is_success() {
            return Err(AppError::source(tab, format!("HTTP {}", response.status())));
        }

        let text = response.text().await.map_err(|e| AppError::source(tab, e))?;
        parse_watchlist_csv(tab, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GoogleSheetSource {
        let config = SourceConfig {
            sheet_id: "sheet123".to_string(),
            tabs: vec![
                SheetTab { name: "Intraday".to_string(), gid: Some("0".to_string()) },
                SheetTab { name: "Swing Risky".to_string(), gid: None },
            ],
            ..SourceConfig::default()
        };
        GoogleSheetSource::new(&config).unwrap()
    }

    #[test]
    fn test_export_urls() {
        let source = source();
        assert_eq!(
            source.export_url(&source.tabs[0]),
            "https://docs.google.com/spreadsheets/d/sheet123/export?format=csv&gid=0"
        );
        assert_eq!(
            source.export_url(&source.tabs[1]),
            "https://docs.google.com/spreadsheets/d/sheet123/gviz/tq?tqx=out:csv&sheet=Swing%20Risky"
        );
    }

    #[test]
    fn test_missing_sheet_id_rejected() {
        assert!(GoogleSheetSource::new(&SourceConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_tabs_follow_config_order() {
        let tabs = source().tabs().await.unwrap();
        assert_eq!(tabs, vec!["Intraday".to_string(), "Swing Risky".to_string()]);
    }
}
