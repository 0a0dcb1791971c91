use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use chrono::NaiveDate;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use clinic_core::artifacts::{Advice, AdviceDraft, Report, ReportDraft, Request, RequestDraft};
use clinic_core::directory::{Demographics, Subject};
use clinic_core::lifecycle::ClinicalService;
use clinic_core::memory::MemoryStore;
use clinic_core::subjects::SubjectService;
use clinic_core::{Actor, CoreConfig, WorkflowError};
use clinic_types::{CanonicalId, NonEmptyText, RequestKind, Urgency};

/// Application state shared across REST API handlers
///
/// Holds the subject and clinical services wired over the in-memory store.
/// Authentication/session handling is out of scope; handlers accept the
/// acting identity in the request and pass it straight through to the core.
#[derive(Clone)]
struct AppState {
    subjects: SubjectService<MemoryStore>,
    clinical: ClinicalService<MemoryStore, MemoryStore>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        register_subject,
        set_eligibility,
        update_demographics,
        create_report,
        list_reports,
        create_advice,
        approve_advice,
        list_advice,
        submit_request,
        list_requests
    ),
    components(schemas(
        HealthRes,
        RegisterSubjectReq,
        SetEligibilityReq,
        UpdateDemographicsReq,
        SubjectRes,
        CreateReportReq,
        ReportRes,
        CreateAdviceReq,
        ApproveAdviceReq,
        AdviceRes,
        CreateRequestReq,
        RequestRes
    ))
)]
struct ApiDoc;

/// Main entry point for the clinic back-office application
///
/// Starts the REST server and serves the workflow core over an in-memory
/// subject directory and artifact store.
///
/// # Environment Variables
/// - `CLINIC_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_LEGACY_PREFIX`: prefix for newly allocated patient ids (default: "PAT")
/// - `CLINIC_LEGACY_WIDTH`: zero-padded width of the numeric suffix (default: 4)
/// - `CLINIC_LEGACY_PREFIX_VARIANTS`: comma-separated historical prefixes (default: "PT")
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("clinic=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = std::env::var("CLINIC_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".into())
        .parse()?;

    let prefix = std::env::var("CLINIC_LEGACY_PREFIX").unwrap_or_else(|_| "PAT".into());
    let width: usize = std::env::var("CLINIC_LEGACY_WIDTH")
        .unwrap_or_else(|_| "4".into())
        .parse()?;
    let variants: Vec<String> = std::env::var("CLINIC_LEGACY_PREFIX_VARIANTS")
        .unwrap_or_else(|_| "PT".into())
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    let cfg = Arc::new(CoreConfig::new(
        prefix,
        width,
        variants,
        8,
        Duration::from_secs(5),
    )?);
    let store = Arc::new(MemoryStore::new());
    let state = AppState {
        subjects: SubjectService::new(cfg.clone(), store.clone()),
        clinical: ClinicalService::new(cfg, store.clone(), store),
    };

    tracing::info!("++ Starting clinic REST on {}", addr);

    let app = Router::new()
        .route("/health", get(health))
        .route("/subjects", post(register_subject))
        .route("/subjects/:reference/eligibility", post(set_eligibility))
        .route(
            "/subjects/:reference/demographics",
            post(update_demographics),
        )
        .route("/subjects/:reference/reports", get(list_reports))
        .route("/subjects/:reference/advice", get(list_advice))
        .route("/subjects/:reference/requests", get(list_requests))
        .route("/reports", post(create_report))
        .route("/advice", post(create_advice))
        .route("/advice/:id/approve", post(approve_advice))
        .route("/requests", post(submit_request))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

type Rejection = (StatusCode, &'static str);

/// Maps core failures onto status codes and user-visible messages. Each
/// machine-distinguishable failure kind gets its own message.
fn reject(err: WorkflowError) -> Rejection {
    match err {
        WorkflowError::SubjectNotFound => (StatusCode::NOT_FOUND, "Patient not found"),
        WorkflowError::AdviceNotFound => (StatusCode::NOT_FOUND, "Advice not found"),
        WorkflowError::SubjectIneligible => (
            StatusCode::FORBIDDEN,
            "Patient account is not active. Please contact administrator.",
        ),
        WorkflowError::RoleForbidden => (
            StatusCode::FORBIDDEN,
            "Your role does not permit this action",
        ),
        WorkflowError::NotSelf => (
            StatusCode::FORBIDDEN,
            "Patients may only act on their own record",
        ),
        WorkflowError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        WorkflowError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Storage timed out"),
        WorkflowError::AllocationExhausted { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Could not allocate a patient id, please retry",
        ),
        WorkflowError::Store(e) => {
            tracing::error!("store failure: {:?}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Storage unavailable")
        }
    }
}

fn parse_actor(actor_id: &str, actor_role: &str) -> Result<Actor, Rejection> {
    let id = CanonicalId::parse(actor_id)
        .map_err(|_| (StatusCode::BAD_REQUEST, "actor_id must be a canonical id"))?;
    let role = actor_role
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "unknown actor_role"))?;
    Ok(Actor::new(id, role))
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>, Rejection> {
    value
        .map(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d"))
        .transpose()
        .map_err(|_| (StatusCode::BAD_REQUEST, "dates must be YYYY-MM-DD"))
}

fn parse_urgency(value: Option<&str>) -> Result<Urgency, Rejection> {
    match value {
        None => Ok(Urgency::default()),
        Some(v) => v
            .parse()
            .map_err(|_| (StatusCode::BAD_REQUEST, "unknown urgency")),
    }
}

fn required_text(value: &str, message: &'static str) -> Result<NonEmptyText, Rejection> {
    NonEmptyText::new(value).map_err(|_| (StatusCode::BAD_REQUEST, message))
}

fn urgency_name(urgency: Urgency) -> String {
    match urgency {
        Urgency::Low => "low".into(),
        Urgency::Normal => "normal".into(),
        Urgency::High => "high".into(),
    }
}

#[derive(serde::Serialize, utoipa::ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

#[derive(serde::Deserialize, utoipa::IntoParams)]
struct ActorQuery {
    /// Canonical id of the acting user
    actor_id: String,
    /// Role of the acting user: patient, physician or admin
    actor_role: String,
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
struct RegisterSubjectReq {
    actor_id: String,
    actor_role: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    date_of_birth: Option<String>,
    gender: Option<String>,
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
struct SetEligibilityReq {
    actor_id: String,
    actor_role: String,
    /// active, inactive or suspended
    eligibility: String,
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
struct UpdateDemographicsReq {
    actor_id: String,
    actor_role: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    date_of_birth: Option<String>,
    gender: Option<String>,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
struct SubjectRes {
    canonical_id: String,
    legacy_id: String,
    eligibility: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    date_of_birth: Option<String>,
    gender: Option<String>,
    created_at: String,
}

impl From<Subject> for SubjectRes {
    fn from(subject: Subject) -> Self {
        Self {
            canonical_id: subject.canonical_id.to_string(),
            legacy_id: subject.legacy_id.to_string(),
            eligibility: subject.eligibility.to_string(),
            first_name: subject.demographics.first_name,
            last_name: subject.demographics.last_name,
            email: subject.demographics.email,
            phone: subject.demographics.phone,
            date_of_birth: subject.demographics.date_of_birth.map(|d| d.to_string()),
            gender: subject.demographics.gender,
            created_at: subject.created_at.to_rfc3339(),
        }
    }
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
struct CreateReportReq {
    actor_id: String,
    actor_role: String,
    /// Patient reference in canonical or legacy form
    patient: String,
    diagnosis: String,
    #[serde(default)]
    treatment: String,
    #[serde(default)]
    prescription: String,
    follow_up_date: Option<String>,
    #[serde(default)]
    notes: String,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
struct ReportRes {
    id: String,
    patient: String,
    author: String,
    diagnosis: String,
    treatment: String,
    prescription: String,
    follow_up_date: Option<String>,
    notes: String,
    created_at: String,
}

impl From<Report> for ReportRes {
    fn from(report: Report) -> Self {
        Self {
            id: report.id.to_string(),
            patient: report.subject.to_string(),
            author: report.author.to_string(),
            diagnosis: report.diagnosis,
            treatment: report.treatment,
            prescription: report.prescription,
            follow_up_date: report.follow_up_date.map(|d| d.to_string()),
            notes: report.notes,
            created_at: report.created_at.to_rfc3339(),
        }
    }
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
struct CreateAdviceReq {
    actor_id: String,
    actor_role: String,
    /// Patient reference in canonical or legacy form
    patient: String,
    condition: String,
    advice: String,
    #[serde(default)]
    medications: String,
    #[serde(default)]
    lifestyle: String,
    urgency: Option<String>,
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
struct ApproveAdviceReq {
    actor_id: String,
    actor_role: String,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
struct AdviceRes {
    id: String,
    patient: String,
    author: String,
    condition: String,
    advice: String,
    medications: String,
    lifestyle: String,
    urgency: String,
    status: String,
    created_at: String,
}

impl From<Advice> for AdviceRes {
    fn from(advice: Advice) -> Self {
        Self {
            id: advice.id.to_string(),
            patient: advice.subject.to_string(),
            author: advice.author.to_string(),
            condition: advice.condition,
            advice: advice.advice,
            medications: advice.medications,
            lifestyle: advice.lifestyle,
            urgency: urgency_name(advice.urgency),
            status: advice.status.to_string(),
            created_at: advice.created_at.to_rfc3339(),
        }
    }
}

#[derive(serde::Deserialize, utoipa::ToSchema)]
struct CreateRequestReq {
    actor_id: String,
    actor_role: String,
    /// advice or appointment
    kind: String,
    subject: String,
    #[serde(default)]
    description: String,
    urgency: Option<String>,
    preferred_date: Option<String>,
}

#[derive(serde::Serialize, utoipa::ToSchema)]
struct RequestRes {
    id: String,
    kind: String,
    subject: String,
    description: String,
    urgency: String,
    preferred_date: Option<String>,
    requested_by: String,
    created_at: String,
}

impl From<Request> for RequestRes {
    fn from(request: Request) -> Self {
        Self {
            id: request.id.to_string(),
            kind: match request.kind {
                RequestKind::Advice => "advice".into(),
                RequestKind::Appointment => "appointment".into(),
            },
            subject: request.subject_line,
            description: request.description,
            urgency: urgency_name(request.urgency),
            preferred_date: request.preferred_date.map(|d| d.to_string()),
            requested_by: request.requested_by.to_string(),
            created_at: request.created_at.to_rfc3339(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "clinic is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/subjects",
    request_body = RegisterSubjectReq,
    responses(
        (status = 200, description = "Subject registered", body = SubjectRes),
        (status = 400, description = "Bad request"),
        (status = 403, description = "Role not permitted"),
        (status = 503, description = "Allocation or storage failure")
    )
)]
/// Register a new patient account
///
/// Allocates the next legacy patient id and creates the account in the
/// subject directory. Staff roles only.
async fn register_subject(
    State(state): State<AppState>,
    Json(req): Json<RegisterSubjectReq>,
) -> Result<Json<SubjectRes>, Rejection> {
    let actor = parse_actor(&req.actor_id, &req.actor_role)?;
    let demographics = Demographics {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        phone: req.phone,
        date_of_birth: parse_date(req.date_of_birth.as_deref())?,
        gender: req.gender,
    };

    match state.subjects.register(&actor, demographics).await {
        Ok(subject) => Ok(Json(subject.into())),
        Err(e) => {
            tracing::warn!("register subject failed: {:?}", e);
            Err(reject(e))
        }
    }
}

#[utoipa::path(
    post,
    path = "/subjects/{reference}/eligibility",
    request_body = SetEligibilityReq,
    params(("reference" = String, Path, description = "Canonical or legacy patient id")),
    responses(
        (status = 200, description = "Eligibility updated", body = SubjectRes),
        (status = 403, description = "Role not permitted"),
        (status = 404, description = "Patient not found")
    )
)]
/// Set a patient's eligibility state (staff only)
async fn set_eligibility(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(req): Json<SetEligibilityReq>,
) -> Result<Json<SubjectRes>, Rejection> {
    let actor = parse_actor(&req.actor_id, &req.actor_role)?;
    let eligibility = req
        .eligibility
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "unknown eligibility state"))?;

    match state
        .subjects
        .set_eligibility(&actor, &reference, eligibility)
        .await
    {
        Ok(subject) => Ok(Json(subject.into())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    post,
    path = "/subjects/{reference}/demographics",
    request_body = UpdateDemographicsReq,
    params(("reference" = String, Path, description = "Canonical or legacy patient id")),
    responses(
        (status = 200, description = "Demographics updated", body = SubjectRes),
        (status = 403, description = "Role not permitted"),
        (status = 404, description = "Patient not found")
    )
)]
/// Replace a patient's demographic fields (staff only)
async fn update_demographics(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Json(req): Json<UpdateDemographicsReq>,
) -> Result<Json<SubjectRes>, Rejection> {
    let actor = parse_actor(&req.actor_id, &req.actor_role)?;
    let demographics = Demographics {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        phone: req.phone,
        date_of_birth: parse_date(req.date_of_birth.as_deref())?,
        gender: req.gender,
    };

    match state
        .subjects
        .update_demographics(&actor, &reference, demographics)
        .await
    {
        Ok(subject) => Ok(Json(subject.into())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    post,
    path = "/reports",
    request_body = CreateReportReq,
    responses(
        (status = 200, description = "Report created", body = ReportRes),
        (status = 403, description = "Denied"),
        (status = 404, description = "Patient not found")
    )
)]
/// File a clinical report against an active patient (staff only)
async fn create_report(
    State(state): State<AppState>,
    Json(req): Json<CreateReportReq>,
) -> Result<Json<ReportRes>, Rejection> {
    let actor = parse_actor(&req.actor_id, &req.actor_role)?;
    let draft = ReportDraft {
        diagnosis: required_text(&req.diagnosis, "diagnosis is required")?,
        treatment: req.treatment,
        prescription: req.prescription,
        follow_up_date: parse_date(req.follow_up_date.as_deref())?,
        notes: req.notes,
    };

    match state
        .clinical
        .create_report(&actor, &req.patient, draft)
        .await
    {
        Ok(report) => Ok(Json(report.into())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    get,
    path = "/subjects/{reference}/reports",
    params(
        ("reference" = String, Path, description = "Canonical or legacy patient id"),
        ActorQuery
    ),
    responses(
        (status = 200, description = "Reports for the patient", body = [ReportRes]),
        (status = 403, description = "Denied"),
        (status = 404, description = "Patient not found")
    )
)]
/// List a patient's reports, newest first (staff only)
async fn list_reports(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<ReportRes>>, Rejection> {
    let actor = parse_actor(&query.actor_id, &query.actor_role)?;

    match state.clinical.reports_for_subject(&actor, &reference).await {
        Ok(reports) => Ok(Json(reports.into_iter().map(Into::into).collect())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    post,
    path = "/advice",
    request_body = CreateAdviceReq,
    responses(
        (status = 200, description = "Advice created", body = AdviceRes),
        (status = 403, description = "Denied"),
        (status = 404, description = "Patient not found")
    )
)]
/// Create an advice record for a patient (staff only; created approved)
async fn create_advice(
    State(state): State<AppState>,
    Json(req): Json<CreateAdviceReq>,
) -> Result<Json<AdviceRes>, Rejection> {
    let actor = parse_actor(&req.actor_id, &req.actor_role)?;
    let draft = AdviceDraft {
        condition: required_text(&req.condition, "condition is required")?,
        advice: required_text(&req.advice, "advice text is required")?,
        medications: req.medications,
        lifestyle: req.lifestyle,
        urgency: parse_urgency(req.urgency.as_deref())?,
    };

    match state
        .clinical
        .create_advice(&actor, &req.patient, draft)
        .await
    {
        Ok(advice) => Ok(Json(advice.into())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    post,
    path = "/advice/{id}/approve",
    request_body = ApproveAdviceReq,
    params(("id" = String, Path, description = "Advice record id")),
    responses(
        (status = 200, description = "Advice approved", body = AdviceRes),
        (status = 403, description = "Role not permitted"),
        (status = 404, description = "Advice not found")
    )
)]
/// Approve a pending advice record (staff only; idempotent)
async fn approve_advice(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ApproveAdviceReq>,
) -> Result<Json<AdviceRes>, Rejection> {
    let actor = parse_actor(&req.actor_id, &req.actor_role)?;
    let advice_id = CanonicalId::parse(&id)
        .map_err(|_| (StatusCode::BAD_REQUEST, "advice id must be canonical"))?;

    match state.clinical.approve_advice(&actor, &advice_id).await {
        Ok(advice) => Ok(Json(advice.into())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    get,
    path = "/subjects/{reference}/advice",
    params(
        ("reference" = String, Path, description = "Canonical or legacy patient id"),
        ActorQuery
    ),
    responses(
        (status = 200, description = "Advice for the patient", body = [AdviceRes]),
        (status = 403, description = "Denied"),
        (status = 404, description = "Patient not found")
    )
)]
/// List a patient's advice, newest first (patients see only their own)
async fn list_advice(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<AdviceRes>>, Rejection> {
    let actor = parse_actor(&query.actor_id, &query.actor_role)?;

    match state.clinical.advice_for_subject(&actor, &reference).await {
        Ok(records) => Ok(Json(records.into_iter().map(Into::into).collect())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    post,
    path = "/requests",
    request_body = CreateRequestReq,
    responses(
        (status = 200, description = "Request submitted", body = RequestRes),
        (status = 403, description = "Denied"),
        (status = 404, description = "Patient not found")
    )
)]
/// Submit an advice or appointment request (patients, for themselves only)
async fn submit_request(
    State(state): State<AppState>,
    Json(req): Json<CreateRequestReq>,
) -> Result<Json<RequestRes>, Rejection> {
    let actor = parse_actor(&req.actor_id, &req.actor_role)?;
    let kind = match req.kind.trim().to_ascii_lowercase().as_str() {
        "advice" => RequestKind::Advice,
        "appointment" => RequestKind::Appointment,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                "kind must be advice or appointment",
            ));
        }
    };
    let draft = RequestDraft {
        kind,
        subject_line: required_text(&req.subject, "subject is required")?,
        description: req.description,
        urgency: parse_urgency(req.urgency.as_deref())?,
        preferred_date: parse_date(req.preferred_date.as_deref())?,
    };

    match state.clinical.submit_request(&actor, draft).await {
        Ok(request) => Ok(Json(request.into())),
        Err(e) => Err(reject(e)),
    }
}

#[utoipa::path(
    get,
    path = "/subjects/{reference}/requests",
    params(
        ("reference" = String, Path, description = "Canonical or legacy patient id"),
        ActorQuery
    ),
    responses(
        (status = 200, description = "Requests raised by the patient", body = [RequestRes]),
        (status = 403, description = "Denied"),
        (status = 404, description = "Patient not found")
    )
)]
/// List a patient's open requests, newest first
async fn list_requests(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<Vec<RequestRes>>, Rejection> {
    let actor = parse_actor(&query.actor_id, &query.actor_role)?;

    match state
        .clinical
        .requests_for_subject(&actor, &reference)
        .await
    {
        Ok(requests) => Ok(Json(requests.into_iter().map(Into::into).collect())),
        Err(e) => Err(reject(e)),
    }
}
