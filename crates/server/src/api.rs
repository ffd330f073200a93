//! JSON API surface.
//!
//! Endpoints:
//! - `POST /api/run` - run one customer message through the agent pipeline

use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use helpline_agent::{AgentRuntime, ThreadRngSim};
use helpline_core::domain::response::AgentResponse;
use helpline_core::errors::PipelineError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::admission::SessionAdmission;

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime<ThreadRngSim>>,
    pub admission: Arc<SessionAdmission>,
    pub logger: Arc<dyn ConversationLogger>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(rename = "agentId")]
    pub agent_id: Option<String>,
    pub message: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RunSuccess {
    pub success: bool,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(flatten)]
    pub response: AgentResponse,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), message: None }
    }
}

// ---------------------------------------------------------------------------
// Conversation logging
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub agent_id: String,
    pub session_id: String,
    pub message: String,
    pub response: AgentResponse,
    pub timestamp: DateTime<Utc>,
}

/// Sink for per-request conversation records. Logging is best-effort; a
/// failing sink must never fail the response.
#[async_trait]
pub trait ConversationLogger: Send + Sync {
    async fn log(&self, record: ConversationRecord) -> anyhow::Result<()>;
}

/// Default sink: emits each conversation as a structured tracing event.
pub struct TracingConversationLogger;

#[async_trait]
impl ConversationLogger for TracingConversationLogger {
    async fn log(&self, record: ConversationRecord) -> anyhow::Result<()> {
        let payload = serde_json::to_string(&record.response)?;
        info!(
            event_name = "conversation.logged",
            agent_id = %record.agent_id,
            session_id = %record.session_id,
            intent = %record.response.intent,
            total_ms = record.response.timing.total_ms,
            response = %payload,
            "conversation recorded"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new().route("/api/run", post(run_agent)).with_state(state)
}

pub async fn run_agent(
    State(state): State<ApiState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunSuccess>), (StatusCode, Json<ApiError>)> {
    let agent_id = request.agent_id.as_deref().map(str::trim).unwrap_or_default();
    let message = request.message.as_deref().map(str::trim).unwrap_or_default();

    if agent_id.is_empty() || message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("Missing required fields: agentId, message")),
        ));
    }

    let session_id = match request.session_id.as_deref().map(str::trim) {
        Some(session) if !session.is_empty() => session.to_string(),
        _ => format!("session-{}", Uuid::new_v4()),
    };

    // The permit frees the session slot on every exit path below.
    let _permit = state.admission.admit(&session_id).map_err(|denied| {
        warn!(
            event_name = "api.admission_denied",
            session_id = %session_id,
            active = denied.active,
            capacity = denied.capacity,
            "concurrent session limit reached"
        );
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiError::new("Maximum concurrent sessions reached. Please try again.")),
        )
    })?;

    let response =
        state.runtime.process_message(agent_id, message, &session_id).await.map_err(|error| {
            let status = match &error {
                PipelineError::AgentNotFound { .. } => StatusCode::NOT_FOUND,
                PipelineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(
                event_name = "api.run_failed",
                session_id = %session_id,
                error = %error,
                "pipeline rejected the request"
            );
            (
                status,
                Json(ApiError {
                    error: error.user_message().to_string(),
                    message: Some(error.to_string()),
                }),
            )
        })?;

    let record = ConversationRecord {
        agent_id: agent_id.to_string(),
        session_id: session_id.clone(),
        message: message.to_string(),
        response: response.clone(),
        timestamp: Utc::now(),
    };
    if let Err(error) = state.logger.log(record).await {
        warn!(
            event_name = "api.conversation_log_failed",
            session_id = %session_id,
            error = %error,
            "conversation logging failed"
        );
    }

    Ok((StatusCode::OK, Json(RunSuccess { success: true, session_id, response })))
}
