//! Application error types

use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Watchlist feed unreachable or malformed for one tab
    #[error("Source error for '{tab}': {message}")]
    Source { tab: String, message: String },

    /// Hit-log sink unavailable
    #[error("Ledger write error: {0}")]
    Ledger(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Store is empty and the source could not supply any watchlist
    #[error("Nothing to refresh: {0}")]
    NothingToRefresh(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a per-tab source error
    pub fn source(tab: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::Source {
            tab: tab.into(),
            message: message.to_string(),
        }
    }

    /// Stable machine-readable code for the HTTP surface
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::Csv(_) => "CSV_ERROR",
            AppError::Source { .. } => "SOURCE_ERROR",
            AppError::Ledger(_) => "LEDGER_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::NothingToRefresh(_) => "NOTHING_TO_REFRESH",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Serializable error response for API clients
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(err: AppError) -> Self {
        ErrorResponse::from(&err)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let err = AppError::source("Intraday", "HTTP 500");
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "SOURCE_ERROR");
        assert_eq!(response.message, "Source error for 'Intraday': HTTP 500");

        let response: ErrorResponse = AppError::NotFound("tab 'X'".to_string()).into();
        assert_eq!(response.code, "NOT_FOUND");
    }
}
