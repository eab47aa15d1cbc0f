//! `POST /chat` - fresh analyses and follow-up turns.
//!
//! Flow: authorize -> validate body -> pick mode -> build prompt -> LLM ->
//! decode -> (fresh only) write session. Every failure is terminal and
//! rendered as `{error, details?}`; only visualization parse problems are
//! recovered, inside the codec.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AnalysisError;
use crate::metrics;
use crate::protocol::{
    analysis_prompt, decode_analysis, decode_follow_up, follow_up_prompt, AnalysisPromptInput,
    ChatTurn, FileType, VisualizationStatus,
};
use crate::shared_state::AppState;
use crate::sweeper::report_stored_sessions;

pub const MAX_SESSION_ID_LEN: usize = 256;

pub const SESSION_EXPIRED_MESSAGE: &str =
    "Session not found or expired. Please start a new analysis by uploading your data again.";

/// Request body matching what the frontend sends
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Option<Vec<ChatTurn>>,
    pub data: Option<String>,
    pub session_id: Option<String>,
    pub is_new_analysis: Option<bool>,
    pub domain: Option<String>,
    #[serde(default)]
    pub file_type: FileType,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub analysis: String,
    /// `null` on follow-up turns.
    pub visualizations: Option<Value>,
    pub session_id: String,
    pub is_new_session: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum ChatMode<'a> {
    Fresh {
        data: &'a str,
        session_id: Option<&'a str>,
    },
    FollowUp {
        session_id: &'a str,
    },
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request_num = state.counters.inc_total_requests();

    match handle_chat(&state, &headers, body).await {
        Ok(response) => {
            info!(
                "Chat request #{} answered (session {}, new: {})",
                request_num, response.session_id, response.is_new_session
            );
            metrics::inc_request("chat", "200");
            Json(response).into_response()
        }
        Err(e) => {
            match &e {
                AnalysisError::Validation { .. } | AnalysisError::Auth(_) | AnalysisError::NotFound(_) => {
                    warn!("Chat request #{} rejected ({}): {}", request_num, e.kind(), e)
                }
                _ => error!("Chat request #{} failed ({}): {} {:?}", request_num, e.kind(), e, e.body().details),
            }
            metrics::inc_request("chat", e.status().as_str());
            e.into_response()
        }
    }
}

async fn handle_chat(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<ChatResponse, AnalysisError> {
    authorize(headers, state.config.api_auth_token.as_deref())?;

    let Json(req) = body.map_err(|rejection| {
        AnalysisError::validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;
    let messages = validate_messages(req.messages.as_deref())?;

    match resolve_mode(&req)? {
        ChatMode::Fresh { data, session_id } => {
            fresh_analysis(state, &req, messages, data, session_id).await
        }
        ChatMode::FollowUp { session_id } => follow_up(state, messages, session_id).await,
    }
}

async fn fresh_analysis(
    state: &AppState,
    req: &ChatRequest,
    messages: &[ChatTurn],
    data: &str,
    session_id: Option<&str>,
) -> Result<ChatResponse, AnalysisError> {
    let fresh_num = state.counters.inc_fresh_analyses();
    debug!("Fresh analysis #{} ({} bytes of {})", fresh_num, data.len(), req.file_type.label());

    let prompt = analysis_prompt(
        AnalysisPromptInput {
            messages,
            data,
            file_type: req.file_type,
            domain: req.domain.as_deref(),
        },
        state.config.analysis_temperature,
    );
    let reply = state.llm.complete(&prompt).await?;
    let decoded = decode_analysis(&reply)?;
    if let VisualizationStatus::Fallback(reason) = &decoded.status {
        metrics::inc_visualization_fallback(reason.reason());
    }

    let session_id = session_id
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    state
        .sessions
        .put(&session_id, data, &decoded.analysis)
        .map_err(AnalysisError::storage)?;
    report_stored_sessions(state.sessions.as_ref());
    info!(
        "Stored session {} ({} backend), fresh analysis #{}",
        session_id,
        state.sessions.backend_name(),
        fresh_num
    );

    Ok(ChatResponse {
        analysis: decoded.analysis,
        visualizations: decoded.visualizations,
        session_id,
        is_new_session: true,
    })
}

async fn follow_up(
    state: &AppState,
    messages: &[ChatTurn],
    session_id: &str,
) -> Result<ChatResponse, AnalysisError> {
    let follow_up_num = state.counters.inc_follow_ups();

    let Some(record) = state
        .sessions
        .get(session_id)
        .map_err(AnalysisError::storage)?
    else {
        // A lookup miss may have just dropped an expired record.
        report_stored_sessions(state.sessions.as_ref());
        return Err(AnalysisError::NotFound(SESSION_EXPIRED_MESSAGE.to_string()));
    };
    info!("Follow-up #{} on session {}", follow_up_num, record.session_id);

    let prompt = follow_up_prompt(
        messages,
        &record.data_summary,
        &record.initial_analysis,
        state.config.conversation_temperature,
    );
    let reply = state.llm.complete(&prompt).await?;
    let decoded = decode_follow_up(&reply);

    Ok(ChatResponse {
        analysis: decoded.analysis,
        visualizations: decoded.visualizations,
        session_id: record.session_id,
        is_new_session: false,
    })
}

fn authorize(headers: &HeaderMap, expected_token: Option<&str>) -> Result<(), AnalysisError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AnalysisError::Auth("Missing authorization header".to_string()))?;

    if let Some(token) = expected_token {
        let presented = value.strip_prefix("Bearer ").map(str::trim);
        if presented != Some(token) {
            return Err(AnalysisError::Auth("Invalid authorization token".to_string()));
        }
    }
    Ok(())
}

fn validate_messages(messages: Option<&[ChatTurn]>) -> Result<&[ChatTurn], AnalysisError> {
    let messages =
        messages.ok_or_else(|| AnalysisError::validation("Messages array is required"))?;
    if messages.is_empty() {
        return Err(AnalysisError::validation("At least one message is required"));
    }
    Ok(messages)
}

fn validate_session_id(session_id: &str) -> Result<(), AnalysisError> {
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(AnalysisError::validation(format!(
            "Session ID too long (max {} chars)",
            MAX_SESSION_ID_LEN
        )));
    }
    if !session_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AnalysisError::validation("Session ID contains invalid characters"));
    }
    Ok(())
}

fn resolve_mode(req: &ChatRequest) -> Result<ChatMode<'_>, AnalysisError> {
    let session_id = req.session_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if let Some(id) = session_id {
        validate_session_id(id)?;
    }
    let data = req.data.as_deref().filter(|d| !d.trim().is_empty());

    match (data, session_id) {
        (Some(data), session_id) => Ok(ChatMode::Fresh { data, session_id }),
        (None, _) if req.is_new_analysis == Some(true) => Err(AnalysisError::validation(
            "A new analysis requires dataset content in 'data'",
        )),
        (None, Some(session_id)) => Ok(ChatMode::FollowUp { session_id }),
        (None, None) => Err(AnalysisError::validation(
            "Either 'data' (new analysis) or 'sessionId' (follow-up) is required",
        )),
    }
}
