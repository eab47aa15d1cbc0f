//! Error taxonomy for the chat endpoint.
//!
//! Every variant is terminal for the request and maps to a fixed HTTP status.
//! Malformed visualization JSON is not represented here: the codec recovers
//! from it locally (see [`crate::protocol::VisualizationError`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{message}")]
    Validation { message: String },

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid response format from analysis model")]
    Format { excerpt: String },

    #[error("Analysis service request failed")]
    Upstream { message: String },

    #[error("Session storage failure")]
    Storage { message: String },
}

/// JSON body returned for every failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AnalysisError {
    pub fn validation(message: impl Into<String>) -> Self {
        AnalysisError::Validation {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        AnalysisError::Upstream {
            message: message.into(),
        }
    }

    pub fn storage(err: anyhow::Error) -> Self {
        AnalysisError::Storage {
            message: format!("{:#}", err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AnalysisError::Validation { .. } => StatusCode::BAD_REQUEST,
            AnalysisError::Auth(_) => StatusCode::UNAUTHORIZED,
            AnalysisError::NotFound(_) => StatusCode::NOT_FOUND,
            AnalysisError::Format { .. }
            | AnalysisError::Upstream { .. }
            | AnalysisError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Validation { .. } => "validation",
            AnalysisError::Auth(_) => "auth",
            AnalysisError::NotFound(_) => "not_found",
            AnalysisError::Format { .. } => "format",
            AnalysisError::Upstream { .. } => "upstream",
            AnalysisError::Storage { .. } => "storage",
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            AnalysisError::Format { excerpt } => Some(excerpt.clone()),
            AnalysisError::Upstream { message } | AnalysisError::Storage { message } => {
                Some(message.clone())
            }
            _ => None,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            details: self.details(),
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
