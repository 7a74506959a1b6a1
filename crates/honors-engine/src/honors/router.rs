use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{HonorTypeId, LevelKey, SchoolYear, StudentId};
use super::generator::{GenerationError, HonorRollService};
use super::repository::{
    GradeStore, HonorResultKey, HonorResultStore, HonorResultView, NotificationGateway,
    StudentRoster,
};
use super::workflow::{ApprovalDecision, ApprovalService, WorkflowError};

/// Shared handler state: the generator, the approval workflow, and read
/// access to persisted results for listings.
pub struct HonorsState<R, G, S, N> {
    pub generator: Arc<HonorRollService<R, G, S, N>>,
    pub approvals: Arc<ApprovalService<S>>,
    pub results: Arc<S>,
}

impl<R, G, S, N> Clone for HonorsState<R, G, S, N> {
    fn clone(&self) -> Self {
        Self {
            generator: Arc::clone(&self.generator),
            approvals: Arc::clone(&self.approvals),
            results: Arc::clone(&self.results),
        }
    }
}

/// Router builder exposing the engine's HTTP endpoints.
pub fn honors_router<R, G, S, N>(state: HonorsState<R, G, S, N>) -> Router
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    Router::new()
        .route("/api/v1/honors/generate", post(generate_handler::<R, G, S, N>))
        .route(
            "/api/v1/honors/results/:level/:school_year",
            get(results_handler::<R, G, S, N>),
        )
        .route(
            "/api/v1/honors/students/:student_id/evaluation",
            get(evaluation_handler::<R, G, S, N>),
        )
        .route(
            "/api/v1/honors/results/:student_id/decision",
            post(decision_handler::<R, G, S, N>),
        )
        .route(
            "/api/v1/honors/results/:student_id/override",
            post(override_handler::<R, G, S, N>),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateRequest {
    level: LevelKey,
    school_year: SchoolYear,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EvaluationQuery {
    level: LevelKey,
    school_year: SchoolYear,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionRequest {
    level: LevelKey,
    school_year: SchoolYear,
    decision: ApprovalDecision,
    actor: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideRequest {
    level: LevelKey,
    school_year: SchoolYear,
    honor_type: HonorTypeId,
    reason: String,
    actor: String,
}

fn error_payload(message: impl ToString) -> axum::Json<serde_json::Value> {
    axum::Json(json!({ "error": message.to_string() }))
}

fn generation_error_response(error: GenerationError) -> Response {
    let status = match &error {
        GenerationError::InProgress { .. } => StatusCode::CONFLICT,
        GenerationError::UnknownLevel(_) | GenerationError::UnknownStudent(_) => {
            StatusCode::NOT_FOUND
        }
        GenerationError::Evaluation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        GenerationError::Roster(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error_payload(error)).into_response()
}

fn workflow_error_response(error: WorkflowError) -> Response {
    let status = match &error {
        WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
        WorkflowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        WorkflowError::HonorNotOffered { .. } | WorkflowError::EmptyOverrideReason => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, error_payload(error)).into_response()
}

pub(crate) async fn generate_handler<R, G, S, N>(
    State(state): State<HonorsState<R, G, S, N>>,
    axum::Json(request): axum::Json<GenerateRequest>,
) -> Response
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    match state.generator.generate(request.level, &request.school_year) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => generation_error_response(error),
    }
}

pub(crate) async fn results_handler<R, G, S, N>(
    State(state): State<HonorsState<R, G, S, N>>,
    Path((level, school_year)): Path<(String, String)>,
) -> Response
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    let level: LevelKey = match level.parse() {
        Ok(level) => level,
        Err(error) => return (StatusCode::BAD_REQUEST, error_payload(error)).into_response(),
    };
    let school_year = match SchoolYear::new(&school_year) {
        Ok(year) => year,
        Err(error) => return (StatusCode::BAD_REQUEST, error_payload(error)).into_response(),
    };

    match state.results.list_for(level, &school_year) {
        Ok(results) => {
            let views: Vec<HonorResultView> = results.iter().map(HonorResultView::from).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => (StatusCode::INTERNAL_SERVER_ERROR, error_payload(error)).into_response(),
    }
}

pub(crate) async fn evaluation_handler<R, G, S, N>(
    State(state): State<HonorsState<R, G, S, N>>,
    Path(student_id): Path<String>,
    Query(query): Query<EvaluationQuery>,
) -> Response
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    let student_id = StudentId(student_id);
    match state
        .generator
        .evaluate_student(&student_id, query.level, &query.school_year)
    {
        Ok(evaluation) => (StatusCode::OK, axum::Json(evaluation)).into_response(),
        Err(error) => generation_error_response(error),
    }
}

pub(crate) async fn decision_handler<R, G, S, N>(
    State(state): State<HonorsState<R, G, S, N>>,
    Path(student_id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    let key = HonorResultKey {
        student_id: StudentId(student_id),
        level: request.level,
        school_year: request.school_year,
    };
    match state
        .approvals
        .decide(&key, request.decision, &request.actor)
    {
        Ok(result) => {
            (StatusCode::OK, axum::Json(HonorResultView::from(&result))).into_response()
        }
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn override_handler<R, G, S, N>(
    State(state): State<HonorsState<R, G, S, N>>,
    Path(student_id): Path<String>,
    axum::Json(request): axum::Json<OverrideRequest>,
) -> Response
where
    R: StudentRoster + 'static,
    G: GradeStore + 'static,
    S: HonorResultStore + 'static,
    N: NotificationGateway + 'static,
{
    let key = HonorResultKey {
        student_id: StudentId(student_id),
        level: request.level,
        school_year: request.school_year,
    };
    match state
        .approvals
        .override_honor(&key, &request.honor_type, &request.reason, &request.actor)
    {
        Ok(result) => {
            (StatusCode::OK, axum::Json(HonorResultView::from(&result))).into_response()
        }
        Err(error) => workflow_error_response(error),
    }
}
