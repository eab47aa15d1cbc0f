//! Prompt/response protocol codec.
//!
//! Fresh analyses are sent with a system instruction that pins the reply to a
//! marker contract (`---ANALYSIS---` then `---VISUALIZATION---` and one JSON
//! object). Replies are decoded back into an analysis string plus a
//! visualization object. Follow-up turns are free text in both directions.

pub mod parser;
pub mod prompt;
pub mod visualization;

use serde::{Deserialize, Serialize};

pub use parser::{decode_analysis, decode_follow_up, DecodedReply, VisualizationError, VisualizationStatus};
pub use prompt::{analysis_prompt, follow_up_prompt, AnalysisPromptInput, Prompt};
pub use visualization::{empty_visualizations, VisualizationPayload, CHART_TYPES};

pub const ANALYSIS_MARKER: &str = "---ANALYSIS---";
pub const VISUALIZATION_MARKER: &str = "---VISUALIZATION---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a conversation. Turn order is preserved when forwarded upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Declared format of the uploaded dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    #[default]
    Csv,
    Json,
    Excel,
}

impl FileType {
    pub fn label(&self) -> &'static str {
        match self {
            FileType::Csv => "CSV",
            FileType::Json => "JSON",
            FileType::Excel => "Excel (converted to CSV)",
        }
    }
}
