//! HTTP response envelope and request types

use crate::error::{AppError, ErrorResponse};
use serde::{Deserialize, Serialize};

/// Standard response envelope: `{"status": "success"|"error", "message", "data"}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Machine-readable error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success_with_message(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.to_string()),
            data: None,
            code: None,
        }
    }

    pub fn success_with_data(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            data: Some(data),
            code: None,
        }
    }

    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: Some(message.into()),
            data: Some(data),
            code: None,
        }
    }

    pub fn error(err: &AppError) -> Self {
        let ErrorResponse { code, message } = ErrorResponse::from(err);
        Self {
            status: "error".to_string(),
            message: Some(message),
            data: None,
            code: Some(code),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Empty payload for message-only responses
#[derive(Debug, Clone, Serialize)]
pub struct Empty {}

fn default_true() -> bool {
    true
}

/// Query of `POST /api/refresh-sheet`
#[derive(Debug, Clone, Deserialize)]
pub struct ReloadQuery {
    #[serde(default = "default_true")]
    pub reset_ledger: bool,
}

impl Default for ReloadQuery {
    fn default() -> Self {
        Self { reset_ledger: true }
    }
}
