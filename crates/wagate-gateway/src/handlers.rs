// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use wagate_core::GateError;
use wagate_core::types::{
    Attachment, Identity, JobKind, JobRecord, JobStatus, Location, ProxyConfig, SessionRecord,
};
use wagate_jobs::EnqueueJob;
use wagate_session::CreateSession;

use crate::error::{ApiError, ApiResult};
use crate::server::GatewayState;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

/// Request body for POST /v1/sessions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, rename = "webhookURL")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub auto_reply_text: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

/// Session response shape shared by create/get/list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub actual_phone: Option<String>,
    #[serde(rename = "webhookURL")]
    pub webhook_url: Option<String>,
    pub auto_reply_text: Option<String>,
    pub connected: bool,
    pub logged_in: bool,
    pub created_at: String,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            phone: record.phone,
            actual_phone: record.actual_phone,
            webhook_url: record.webhook_url,
            auto_reply_text: record.auto_reply,
            connected: record.connected,
            logged_in: record.logged_in,
            created_at: record.created_at,
        }
    }
}

/// POST /v1/sessions
pub async fn create_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let record = state
        .manager
        .create(
            &identity,
            CreateSession {
                id: body.id,
                name: body.name,
                phone: body.phone,
                webhook_url: body.webhook_url,
                auto_reply: body.auto_reply_text,
                proxy: body.proxy,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /v1/sessions
pub async fn list_sessions(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let records = state.manager.list(&identity).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /v1/sessions/{id}
pub async fn get_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let record = state.manager.get(&identity, &id).await?;
    Ok(Json(record.into()))
}

/// POST /v1/sessions/{id}/connect
pub async fn connect_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.connect(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/sessions/{id}/disconnect
pub async fn disconnect_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.disconnect(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/sessions/{id}/logout
pub async fn logout_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.logout(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/sessions/{id}
pub async fn delete_session(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.manager.delete(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for POST /v1/sessions/{id}/send/text.
#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    pub to: String,
    pub body: String,
}

/// Request body for POST /v1/sessions/{id}/send/location.
#[derive(Debug, Deserialize)]
pub struct SendLocationRequest {
    pub to: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Request body for POST /v1/sessions/{id}/send/attachment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAttachmentRequest {
    pub to: String,
    pub url: String,
    pub mime_type: String,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub message_id: String,
}

/// POST /v1/sessions/{id}/send/text
pub async fn send_text(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<SendTextRequest>,
) -> ApiResult<Json<SendResponse>> {
    let message_id = state
        .manager
        .send_text(&identity, &id, &body.to, &body.body)
        .await?;
    Ok(Json(SendResponse {
        message_id: message_id.0,
    }))
}

/// POST /v1/sessions/{id}/send/location
pub async fn send_location(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<SendLocationRequest>,
) -> ApiResult<Json<SendResponse>> {
    let location = Location {
        latitude: body.latitude,
        longitude: body.longitude,
        name: body.name,
    };
    let message_id = state
        .manager
        .send_location(&identity, &id, &body.to, &location)
        .await?;
    Ok(Json(SendResponse {
        message_id: message_id.0,
    }))
}

/// POST /v1/sessions/{id}/send/attachment
pub async fn send_attachment(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<SendAttachmentRequest>,
) -> ApiResult<Json<SendResponse>> {
    let attachment = Attachment {
        url: body.url,
        mime_type: body.mime_type,
        caption: body.caption,
    };
    let message_id = state
        .manager
        .send_attachment(&identity, &id, &body.to, &attachment)
        .await?;
    Ok(Json(SendResponse {
        message_id: message_id.0,
    }))
}

/// Request body for POST /v1/jobs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueJobRequest {
    pub kind: JobKind,
    pub session_id: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub scheduled_for: Option<String>,
}

/// Job summary, used by list responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub message: Option<String>,
}

/// Full job detail including bulk progress.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job_id: String,
    pub kind: JobKind,
    pub session_id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub scheduled_for: Option<String>,
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub remaining: u32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<JobRecord> for JobSummary {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.id,
            status: record.status,
            message: record.last_error,
        }
    }
}

impl From<JobRecord> for JobDetail {
    fn from(record: JobRecord) -> Self {
        let remaining = record.remaining();
        Self {
            job_id: record.id,
            kind: record.kind,
            session_id: record.session_id,
            status: record.status,
            attempts: record.attempts,
            max_attempts: record.max_attempts,
            scheduled_for: record.scheduled_for,
            total: record.total,
            succeeded: record.succeeded,
            failed: record.failed,
            remaining,
            last_error: record.last_error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// POST /v1/jobs
pub async fn enqueue_job(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<EnqueueJobRequest>,
) -> ApiResult<(StatusCode, Json<JobDetail>)> {
    // Ownership of the target session gates enqueue.
    state.manager.authorize(&identity, &body.session_id).await?;
    let record = state
        .queue
        .enqueue(EnqueueJob {
            kind: body.kind,
            session_id: body.session_id,
            payload: body.payload.to_string(),
            scheduled_for: body.scheduled_for,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Query parameters for GET /v1/jobs.
#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub kind: Option<JobKind>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

/// GET /v1/jobs
pub async fn list_jobs(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<JobSummary>>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);
    let records = if identity.is_admin() {
        state
            .queue
            .list(query.status, query.kind, limit, offset)
            .await?
    } else {
        state
            .queue
            .list_for_owner(&identity.user_id, query.status, query.kind, limit, offset)
            .await?
    };
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /v1/jobs/{id}
pub async fn get_job(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobDetail>> {
    let record = load_job_authorized(&state, &identity, &id).await?;
    Ok(Json(record.into()))
}

/// POST /v1/jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSummary>> {
    load_job_authorized(&state, &identity, &id).await?;
    state.queue.cancel(&id).await?;
    Ok(Json(state.queue.get(&id).await?.into()))
}

/// POST /v1/jobs/{id}/retry
pub async fn retry_job(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobSummary>> {
    load_job_authorized(&state, &identity, &id).await?;
    let record = state.queue.retry(&id).await?;
    Ok(Json(record.into()))
}

/// Query parameters for DELETE /v1/jobs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupQuery {
    /// Delete jobs older than this many seconds.
    pub age_secs: i64,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

/// DELETE /v1/jobs — retention cleanup, admin only.
pub async fn cleanup_jobs(
    State(state): State<GatewayState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<CleanupQuery>,
) -> ApiResult<Json<CleanupResponse>> {
    if !identity.is_admin() {
        return Err(ApiError(GateError::Forbidden));
    }
    if query.age_secs < 0 {
        return Err(ApiError(GateError::InvalidInput(
            "age_secs must be non-negative".into(),
        )));
    }
    let removed = state.queue.cleanup(query.age_secs).await?;
    Ok(Json(CleanupResponse { removed }))
}

async fn load_job_authorized(
    state: &GatewayState,
    identity: &Identity,
    id: &str,
) -> Result<JobRecord, GateError> {
    let record = state.queue.get(id).await?;
    if !identity.is_admin() {
        state.manager.authorize(identity, &record.session_id).await?;
    }
    Ok(record)
}

/// Request body for POST /v1/login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    /// Unix seconds.
    pub expires_at: i64,
}

/// POST /v1/login
///
/// Rate limited per client address: five consecutive failures block the
/// address for fifteen minutes.
pub async fn login(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let key = addr.ip().to_string();
    state.limiter.check(&key).await?;

    match state.verifier.verify(&body.username, &body.password).await {
        Ok(identity) => {
            state.limiter.record_attempt(&key, true).await;
            let (token, expires_at) = state.tokens.issue(&identity.user_id, identity.role)?;
            tracing::info!(user_id = %identity.user_id, "login succeeded");
            Ok(Json(LoginResponse { token, expires_at }))
        }
        Err(error) => {
            state.limiter.record_attempt(&key, false).await;
            tracing::info!(addr = %key, "login failed");
            Err(ApiError(error))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health — public, unauthenticated.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
