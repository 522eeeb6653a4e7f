//! REST API server for the loan orchestrator
//!
//! Exposes session creation, the inbound message turn and step execution
//! over HTTP for the chat frontend.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::agent::{ChatReply, Orchestrator, StepOutcome, StepRequest};
use crate::dispatcher::parse_amount;
use crate::error::OrchestrationError;
use crate::models::{CustomerProfile, SanctionRecord, Step, UnderwritingDecision, WorkflowState};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
    #[serde(alias = "user_input")]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct OrchestrateRequest {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    pub step: String,
    #[serde(default, alias = "customer_info", alias = "customerInfo")]
    pub payload: StepPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct StepPayload {
    #[serde(default, alias = "customerId")]
    pub customer_id: Option<String>,
    #[serde(default, alias = "loanAmount")]
    pub loan_amount: Option<Value>,
}

impl OrchestrateRequest {
    fn into_step_request(self) -> Result<StepRequest, OrchestrationError> {
        let step = Step::parse(&self.step).ok_or_else(|| {
            OrchestrationError::Validation(format!(
                "unknown step '{}', expected VERIFY_KYC or UNDERWRITE",
                self.step
            ))
        })?;

        match step {
            Step::VerifyKyc => {
                let customer_id = self
                    .payload
                    .customer_id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| {
                        OrchestrationError::Validation("VERIFY_KYC requires customerId".to_string())
                    })?;
                Ok(StepRequest::VerifyKyc { customer_id })
            }
            Step::Underwrite => {
                let raw = self.payload.loan_amount.unwrap_or(Value::Null);
                Ok(StepRequest::Underwrite {
                    loan_amount: parse_amount(&raw),
                })
            }
        }
    }
}

/// =============================
/// Response Models
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub state: WorkflowState,
    pub profile: Option<CustomerProfile>,
    pub last_decision: Option<UnderwritingDecision>,
    pub sanction: Option<SanctionRecord>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

/// Error envelope returned for every failed request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub success: bool,
    pub error: String,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct ApiError(OrchestrationError);

impl From<OrchestrationError> for ApiError {
    fn from(err: OrchestrationError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            OrchestrationError::Validation(_) | OrchestrationError::InvalidPrecondition(_) => {
                StatusCode::BAD_REQUEST
            }
            OrchestrationError::SessionNotFound(_) | OrchestrationError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            OrchestrationError::CollaboratorFailure(_) | OrchestrationError::Timeout { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self.0);
        } else {
            warn!(status = status.as_u16(), "Request rejected: {}", self.0);
        }

        let body = ApiErrorBody {
            success: false,
            error: self.0.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn new_chat(State(state): State<ApiState>) -> Json<SessionCreated> {
    let session_id = state.orchestrator.create_session().await;
    Json(SessionCreated { session_id })
}

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatReply> {
    let session_id = match req.session_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => state.orchestrator.create_session().await,
    };

    let reply = state
        .orchestrator
        .handle_message(&session_id, &req.text)
        .await?;
    Ok(Json(reply))
}

async fn orchestrate_handler(
    State(state): State<ApiState>,
    Json(req): Json<OrchestrateRequest>,
) -> ApiResult<StepOutcome> {
    let session_id = req.session_id.clone();
    let request = req.into_step_request()?;
    info!(session_id = %session_id, step = request.step().as_str(), "Received step request");

    let outcome = state.orchestrator.execute_step(&session_id, request).await?;
    Ok(Json(outcome))
}

async fn session_handler(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionView> {
    let session = state.orchestrator.snapshot(&session_id).await?;
    Ok(Json(SessionView {
        state: session.state(),
        message_count: session.history.message_count(),
        session_id: session.session_id,
        profile: session.profile,
        last_decision: session.last_decision,
        sanction: session.sanction,
        created_at: session.created_at,
        last_active: session.last_active,
    }))
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/new_chat", get(new_chat))
        .route("/api/sessions", post(new_chat))
        .route("/api/sessions/:session_id", get(session_handler))
        .route("/chat", post(chat_handler))
        .route("/orchestrate", post(orchestrate_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Periodically drop sessions idle for longer than `ttl`.
pub fn spawn_session_sweeper(orchestrator: Arc<Orchestrator>, ttl: Duration) -> JoinHandle<()> {
    let period = (ttl / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            orchestrator.evict_idle(ttl).await;
        }
    })
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
    session_ttl: Option<Duration>,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    if let Some(ttl) = session_ttl {
        info!(ttl_secs = ttl.as_secs(), "Session expiry enabled");
        spawn_session_sweeper(orchestrator.clone(), ttl);
    }

    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
