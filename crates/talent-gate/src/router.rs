use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::access::{
    AccessGrant, CandidateId, CommitmentType, EmployerId, GrantKey, PaymentStatus, StagedProfile,
};
use crate::activity::ActivityAction;
use crate::alerts::{Alert, AlertError, SweepReport, Trigger};
use crate::context::EngineContext;
use crate::detection::Classification;
use crate::enforcement::{EnforcementRecord, HireOutcome, ObligationStatus};
use crate::error::AppError;
use crate::monitoring::{MessageDecision, ReportAck};

type Engine = State<Arc<EngineContext>>;

/// HTTP surface over the engine operations.
pub fn engine_router(context: Arc<EngineContext>) -> Router {
    Router::new()
        .route("/api/v1/messages/classify", post(classify_handler))
        .route("/api/v1/messages", post(message_handler))
        .route(
            "/api/v1/access/:employer_id/:candidate_id",
            get(staged_profile_handler),
        )
        .route("/api/v1/access/agreement", post(agreement_handler))
        .route("/api/v1/access/payment", post(payment_handler))
        .route("/api/v1/access/upgrade", post(upgrade_handler))
        .route("/api/v1/activity", post(activity_handler))
        .route("/api/v1/reports", post(report_handler))
        .route("/api/v1/alerts", get(alerts_handler))
        .route("/api/v1/alerts/:alert_id/acknowledge", post(acknowledge_handler))
        .route("/api/v1/alerts/:alert_id/resolve", post(resolve_handler))
        .route("/api/v1/sweeps/:trigger", post(sweep_handler))
        .route("/api/v1/enforcement/overdue", get(overdue_handler))
        .route("/api/v1/enforcement/hires", post(hire_handler))
        .route(
            "/api/v1/enforcement/:record_id/status",
            post(transition_handler),
        )
        .with_state(context)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PairRequest {
    employer_id: String,
    candidate_id: String,
}

impl PairRequest {
    fn key(&self) -> GrantKey {
        GrantKey::new(self.employer_id.clone(), self.candidate_id.clone())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageRequest {
    #[serde(flatten)]
    pair: PairRequest,
    text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    #[serde(flatten)]
    pair: PairRequest,
    payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpgradeRequest {
    #[serde(flatten)]
    pair: PairRequest,
    target_level: i64,
    #[serde(default)]
    commitment: Option<CommitmentType>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpgradeResponse {
    level: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActivityRequest {
    #[serde(flatten)]
    pair: PairRequest,
    action: ActivityAction,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportRequest {
    reporter_id: String,
    subject_id: String,
    reason: String,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AcknowledgeRequest {
    admin_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResolveRequest {
    admin_id: String,
    note: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HireRequest {
    #[serde(flatten)]
    pair: PairRequest,
    annual_salary_pence: u64,
    #[serde(default)]
    hired_at: Option<DateTime<Utc>>,
    via_platform: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransitionRequest {
    status: ObligationStatus,
}

pub(crate) async fn classify_handler(
    State(context): Engine,
    Json(request): Json<ClassifyRequest>,
) -> Json<Classification> {
    Json(context.detector.classify(&request.text))
}

pub(crate) async fn message_handler(
    State(context): Engine,
    Json(request): Json<MessageRequest>,
) -> Json<MessageDecision> {
    Json(context.monitor.gate_message(&request.pair.key(), &request.text))
}

pub(crate) async fn staged_profile_handler(
    State(context): Engine,
    Path((employer_id, candidate_id)): Path<(String, String)>,
) -> Result<Json<StagedProfile>, AppError> {
    let key = GrantKey::new(employer_id, candidate_id);
    Ok(Json(context.disclosure.staged_profile(&key)?))
}

pub(crate) async fn agreement_handler(
    State(context): Engine,
    Json(request): Json<PairRequest>,
) -> Result<Json<AccessGrant>, AppError> {
    Ok(Json(context.disclosure.sign_agreement(&request.key())?))
}

pub(crate) async fn payment_handler(
    State(context): Engine,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<AccessGrant>, AppError> {
    let grant = context
        .disclosure
        .record_payment(&request.pair.key(), request.payment_status)?;
    Ok(Json(grant))
}

pub(crate) async fn upgrade_handler(
    State(context): Engine,
    Json(request): Json<UpgradeRequest>,
) -> Result<Json<UpgradeResponse>, AppError> {
    let level = context.disclosure.request_upgrade(
        &request.pair.key(),
        request.target_level,
        request.commitment,
    )?;
    Ok(Json(UpgradeResponse {
        level: level.number(),
    }))
}

/// Fire-and-forget: failures are logged and the caller still gets 202.
pub(crate) async fn activity_handler(
    State(context): Engine,
    Json(request): Json<ActivityRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let key = request.pair.key();
    let flags = match context
        .monitor
        .track_activity(&key, request.action, request.metadata)
    {
        Ok(flags) => flags.len(),
        Err(err) => {
            warn!(
                employer_id = %key.employer_id,
                candidate_id = %key.candidate_id,
                error = %err,
                "activity not recorded"
            );
            0
        }
    };
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "flags_raised": flags })),
    )
}

pub(crate) async fn report_handler(
    State(context): Engine,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<ReportAck>), AppError> {
    let ack = context.monitor.report_suspicious(
        &CandidateId(request.reporter_id),
        &EmployerId(request.subject_id),
        &request.reason,
        request.evidence,
    )?;
    Ok((StatusCode::CREATED, Json(ack)))
}

pub(crate) async fn alerts_handler(State(context): Engine) -> Result<Json<Vec<Alert>>, AppError> {
    Ok(Json(context.alerts.list_active_alerts()?))
}

pub(crate) async fn acknowledge_handler(
    State(context): Engine,
    Path(alert_id): Path<Uuid>,
    Json(request): Json<AcknowledgeRequest>,
) -> Result<Json<Alert>, AppError> {
    Ok(Json(context.alerts.acknowledge(&alert_id, &request.admin_id)?))
}

pub(crate) async fn resolve_handler(
    State(context): Engine,
    Path(alert_id): Path<Uuid>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<Alert>, AppError> {
    let alert = context
        .alerts
        .resolve(&alert_id, &request.admin_id, &request.note)?;
    Ok(Json(alert))
}

pub(crate) async fn sweep_handler(
    State(context): Engine,
    Path(trigger): Path<String>,
) -> Result<Json<SweepReport>, AppError> {
    let trigger = match trigger.as_str() {
        "hourly" => Trigger::Hourly,
        "daily" => Trigger::Daily,
        "weekly" => Trigger::Weekly,
        other => {
            let err = AlertError::Validation(format!("unknown sweep trigger '{other}'"));
            return Err(err.into());
        }
    };
    Ok(Json(context.alerts.run_sweep(trigger)?))
}

pub(crate) async fn overdue_handler(
    State(context): Engine,
) -> Result<Json<Vec<EnforcementRecord>>, AppError> {
    let now = context.clock.now();
    Ok(Json(context.enforcement.get_overdue_fees(now)?))
}

pub(crate) async fn hire_handler(
    State(context): Engine,
    Json(request): Json<HireRequest>,
) -> Result<(StatusCode, Json<HireOutcome>), AppError> {
    let hired_at = request.hired_at.unwrap_or_else(|| context.clock.now());
    let outcome = context.enforcement.record_hire(
        &request.pair.key(),
        request.annual_salary_pence,
        hired_at,
        request.via_platform,
    )?;
    let status = if outcome.billable {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

pub(crate) async fn transition_handler(
    State(context): Engine,
    Path(record_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<EnforcementRecord>, AppError> {
    Ok(Json(context.enforcement.transition(&record_id, request.status)?))
}
