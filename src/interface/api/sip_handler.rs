//! SIP API handlers

use super::sip_dto::{
    ApiResponse, CreateDispatchRuleRequest, CreateParticipantRequest, CreateTrunkRequest,
    DispatchRequest, DispatchResponse, DispatchRuleResponse, DtmfRequest, HealthResponse,
    ListResponse, ParticipantResponse, TrunkResponse,
};
use crate::application::SipService;
use crate::domain::{DomainError, DtmfResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub sip_service: SipService,
}

/// Domain error rendered as an API response
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

/// Transport status for each error kind
pub fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::AlreadyExists(_) => StatusCode::CONFLICT,
        DomainError::FailedPrecondition(_) => StatusCode::PRECONDITION_FAILED,
        DomainError::Unimplemented(_) => StatusCode::NOT_IMPLEMENTED,
        DomainError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("API: {}", self.0);
        }
        (
            status,
            Json(ApiResponse::<()>::error(self.0.code(), self.0.to_string())),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

/// Health check: reports whether the store answers
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.sip_service.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                store: "ready".to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".to_string(),
                store: e.code().to_string(),
            }),
        )
            .into_response(),
    }
}

// ---- Trunks ----

pub async fn create_sip_trunk(
    State(state): State<AppState>,
    Json(req): Json<CreateTrunkRequest>,
) -> ApiResult<TrunkResponse> {
    info!("API: Creating SIP trunk");
    let trunk = state.sip_service.create_sip_trunk(req.into()).await?;
    created(trunk.into())
}

pub async fn list_sip_trunk(State(state): State<AppState>) -> ApiResult<ListResponse<TrunkResponse>> {
    let trunks = state.sip_service.list_sip_trunk().await?;
    ok(ListResponse::from_items(trunks))
}

pub async fn delete_sip_trunk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<TrunkResponse> {
    info!("API: Deleting SIP trunk {}", id);
    let trunk = state.sip_service.delete_sip_trunk(&id).await?;
    ok(trunk.into())
}

// ---- Dispatch rules ----

pub async fn create_sip_dispatch_rule(
    State(state): State<AppState>,
    Json(req): Json<CreateDispatchRuleRequest>,
) -> ApiResult<DispatchRuleResponse> {
    info!("API: Creating SIP dispatch rule");
    let rule = state.sip_service.create_sip_dispatch_rule(req.into()).await?;
    created(rule.into())
}

pub async fn list_sip_dispatch_rule(
    State(state): State<AppState>,
) -> ApiResult<ListResponse<DispatchRuleResponse>> {
    let rules = state.sip_service.list_sip_dispatch_rule().await?;
    ok(ListResponse::from_items(rules))
}

pub async fn delete_sip_dispatch_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DispatchRuleResponse> {
    info!("API: Deleting SIP dispatch rule {}", id);
    let rule = state.sip_service.delete_sip_dispatch_rule(&id).await?;
    ok(rule.into())
}

// ---- Participants ----

pub async fn create_sip_participant(
    State(state): State<AppState>,
    Json(req): Json<CreateParticipantRequest>,
) -> ApiResult<ParticipantResponse> {
    info!("API: Creating SIP participant in room {}", req.room_name);
    let participant = state.sip_service.create_sip_participant(req.into()).await?;
    created(participant.into())
}

pub async fn list_sip_participant(
    State(state): State<AppState>,
) -> ApiResult<ListResponse<ParticipantResponse>> {
    let participants = state.sip_service.list_sip_participant().await?;
    ok(ListResponse::from_items(participants))
}

pub async fn delete_sip_participant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ParticipantResponse> {
    info!("API: Deleting SIP participant {}", id);
    let participant = state.sip_service.delete_sip_participant(&id).await?;
    ok(participant.into())
}

pub async fn send_sip_participant_dtmf(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DtmfRequest>,
) -> ApiResult<DtmfResult> {
    let result = state
        .sip_service
        .send_sip_participant_dtmf(&id, &req.digits)
        .await?;
    ok(result)
}

// ---- Dispatch ----

pub async fn match_sip_dispatch_rule(
    State(state): State<AppState>,
    Json(req): Json<DispatchRequest>,
) -> ApiResult<DispatchResponse> {
    let decision = state
        .sip_service
        .match_sip_dispatch_rule(&req.into())
        .await?;
    ok(decision)
}
