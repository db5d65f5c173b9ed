use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use govflow_client::HttpBackend;
use govflow_core::answers::AnswerDraftStore;
use govflow_core::approvals::{ApprovalWorkflow, PhaseTarget, ReviewQueue, ViewMode, WorkflowState};
use govflow_core::backend::{ApiError, ApprovalApi, InMemoryBackend, QuestionnaireApi};
use govflow_core::domain::answer::{AnswerBatch, AnswerValue, SaveReceipt};
use govflow_core::domain::approval::{ApprovalRecord, NewApprovalRequest, ReviewDecision};
use govflow_core::domain::phase::{Phase, PhaseId, QuestionId};
use govflow_core::domain::process::ProcessId;
use govflow_core::session::{Actor, AppContext, InMemoryStore, Role, Session};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;

const TOKEN: &str = "tok-integration";

#[derive(Clone)]
struct FakeState {
    backend: Arc<InMemoryBackend>,
}

struct Failure(ApiError);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        match self.0 {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::Status { status, message } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(json!({ "message": message })),
            )
                .into_response(),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
        }
    }
}

impl From<ApiError> for Failure {
    fn from(value: ApiError) -> Self {
        Self(value)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairQuery {
    process_id: String,
    phase_id: String,
}

fn authorize(headers: &HeaderMap) -> Result<(), Failure> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(Failure(ApiError::Unauthorized)),
    }
}

async fn pending(
    State(state): State<FakeState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ApprovalRecord>>, Failure> {
    authorize(&headers)?;
    Ok(Json(state.backend.pending_approvals().await?))
}

async fn create(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(request): Json<NewApprovalRequest>,
) -> Result<StatusCode, Failure> {
    authorize(&headers)?;
    state.backend.create_approval(request).await?;
    Ok(StatusCode::CREATED)
}

async fn review(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(decision): Json<ReviewDecision>,
) -> Result<StatusCode, Failure> {
    authorize(&headers)?;
    state.backend.review_approval(decision).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn check(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(query): Query<PairQuery>,
) -> Result<Json<Option<ApprovalRecord>>, Failure> {
    authorize(&headers)?;
    if query.process_id == "P-404" {
        return Err(Failure(ApiError::Status { status: 404, message: "no record".to_owned() }));
    }
    let record = state
        .backend
        .latest_approval(&ProcessId(query.process_id), &PhaseId(query.phase_id))
        .await?;
    Ok(Json(record))
}

async fn phase(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Path(phase_id): Path<String>,
) -> Result<Json<Phase>, Failure> {
    authorize(&headers)?;
    Ok(Json(state.backend.phase(&PhaseId(phase_id)).await?))
}

async fn answers(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(query): Query<PairQuery>,
) -> Result<Json<HashMap<QuestionId, String>>, Failure> {
    authorize(&headers)?;
    let stored = state
        .backend
        .answers(&ProcessId(query.process_id), &PhaseId(query.phase_id))
        .await?;
    Ok(Json(stored))
}

async fn save(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(batch): Json<AnswerBatch>,
) -> Result<Json<SaveReceipt>, Failure> {
    authorize(&headers)?;
    Ok(Json(state.backend.save_answers(batch).await?))
}

async fn spawn_fake(backend: Arc<InMemoryBackend>) -> String {
    let routes = Router::new()
        .route("/approvals", post(create))
        .route("/approvals/pending", get(pending))
        .route("/approvals/review", post(review))
        .route("/approvals/check", get(check))
        .route("/phases/{phase_id}", get(phase))
        .route("/answers", get(answers).post(save));
    let app = Router::new().nest("/api", routes).with_state(FakeState { backend });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind fake backend");
    let addr = listener.local_addr().expect("fake backend address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

fn client(base_url: &str, token: &str) -> Arc<HttpBackend> {
    let token = Some(SecretString::from(token.to_owned()));
    Arc::new(HttpBackend::new(base_url, Duration::from_secs(5), token).expect("http backend"))
}

fn target() -> PhaseTarget {
    PhaseTarget {
        process_id: ProcessId("P-1".to_owned()),
        phase_id: PhaseId("F-1".to_owned()),
        phase_order: 1,
        phase_title: "Context".to_owned(),
    }
}

fn phase_fixture() -> Phase {
    serde_json::from_str(
        r#"{
            "idPhase": "F-1",
            "phaseOrder": 1,
            "title": "Context",
            "sections": [{
                "idSection": "S-1",
                "title": "Scope",
                "order": 1,
                "questions": [
                    {"idQuestion": "Q-1", "title": "Scope", "inputType": "TEXTO", "required": true},
                    {"idQuestion": "Q-3", "title": "Assets", "inputType": "TABLA",
                     "tableConfig": "{\"columns\":[{\"key\":\"name\",\"header\":\"Name\"},{\"key\":\"owner\",\"header\":\"Owner\"}]}"}
                ]
            }]
        }"#,
    )
    .expect("phase fixture")
}

#[tokio::test]
async fn approval_lifecycle_over_http() {
    let backend = Arc::new(InMemoryBackend::default());
    let http = client(&spawn_fake(backend.clone()).await, TOKEN);

    let mut owner = ApprovalWorkflow::load(http.clone(), target(), ViewMode::Editor)
        .await
        .expect("load workflow");
    assert_eq!(owner.state(), WorkflowState::None);

    owner
        .request(&Actor::new("ana", Role::User), Some("lista".to_owned()))
        .await
        .expect("request approval");
    assert_eq!(owner.state(), WorkflowState::Pending);
    assert!(!owner.can_edit());

    let mut queue = ReviewQueue::new(http.clone());
    let pending = queue.refresh().await.expect("pending list").to_vec();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].requested_by, "ana");

    let reviewer = Actor::new("luis", Role::Reviewer);
    queue.reject(&pending[0].id, &reviewer, "faltan datos").await.expect("reject");
    assert!(queue.items().is_empty());

    owner.refresh().await.expect("refresh owner");
    assert_eq!(owner.state(), WorkflowState::Rejected);
    assert_eq!(owner.visible_rejection_reason(), Some("faltan datos"));
    assert!(owner.can_edit());
}

#[tokio::test]
async fn answers_round_trip_through_draft_store() {
    let backend = Arc::new(InMemoryBackend::default());
    let process = ProcessId("P-1".to_owned());
    let phase_id = PhaseId("F-1".to_owned());
    backend.insert_phase(phase_fixture()).await;
    backend.insert_raw_answer(&process, &phase_id, "Q-3".into(), r#"[["db","ana"]]"#).await;
    let http = client(&spawn_fake(backend.clone()).await, TOKEN);

    let phase = http.phase(&phase_id).await.expect("phase over http");
    let assets = phase.question(&"Q-3".into()).expect("Q-3");
    assert_eq!(assets.table_config().expect("table config").columns.len(), 2);

    let mut store = AnswerDraftStore::load(http.clone(), process.clone(), &phase).await;
    assert_eq!(
        store.get(&"Q-3".into()),
        Some(&AnswerValue::Table(vec![vec!["db".to_owned(), "ana".to_owned()]]))
    );

    store.set("Q-1".into(), AnswerValue::Text("alcance".to_owned()));
    assert_eq!(store.flush().await.expect("flush"), 2);
    assert!(!store.is_dirty());

    let stored = backend.stored_answers(&process, &phase_id).await;
    assert_eq!(stored.get(&QuestionId::from("Q-1")).map(String::as_str), Some("alcance"));
    assert_eq!(stored.get(&QuestionId::from("Q-3")).map(String::as_str), Some(r#"[["db","ana"]]"#));
}

#[tokio::test]
async fn wrong_token_is_unauthorized_and_drops_session() {
    let backend = Arc::new(InMemoryBackend::default());
    let http = client(&spawn_fake(backend).await, "tok-stale");

    let error = http.pending_approvals().await.expect_err("stale token");
    assert_eq!(error, ApiError::Unauthorized);

    let mut context =
        AppContext::restore(Arc::new(InMemoryStore::default())).expect("restore context");
    context.sign_in(Session::new("ana", "usuario", None)).expect("sign in");
    assert!(context.handle_api_error(&error).expect("handle error"));
    assert!(!context.is_signed_in());
}

#[tokio::test]
async fn check_treats_404_and_null_as_no_record() {
    let backend = Arc::new(InMemoryBackend::default());
    let http = client(&spawn_fake(backend).await, TOKEN);

    let none = http
        .latest_approval(&ProcessId("P-1".to_owned()), &PhaseId("F-1".to_owned()))
        .await
        .expect("null body");
    assert_eq!(none, None);

    let missing = http
        .latest_approval(&ProcessId("P-404".to_owned()), &PhaseId("F-1".to_owned()))
        .await
        .expect("404 body");
    assert_eq!(missing, None);
}

#[tokio::test]
async fn conflicts_and_missing_phases_surface_status_errors() {
    let backend = Arc::new(InMemoryBackend::default());
    let http = client(&spawn_fake(backend).await, TOKEN);
    let request = NewApprovalRequest {
        process_id: ProcessId("P-1".to_owned()),
        phase_id: PhaseId("F-1".to_owned()),
        phase_order: 1,
        phase_title: "Context".to_owned(),
        requested_by: "ana".to_owned(),
        comments: None,
    };

    http.create_approval(request.clone()).await.expect("first request");
    let conflict = http.create_approval(request).await.expect_err("duplicate request");
    assert!(matches!(
        conflict,
        ApiError::Status { status: 409, ref message } if message.contains("already has")
    ));

    let missing = http.phase(&PhaseId("F-404".to_owned())).await.expect_err("unknown phase");
    assert!(missing.is_not_found());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);

    let http = client(&format!("http://{addr}/api"), TOKEN);
    let error = http.pending_approvals().await.expect_err("nothing listening");
    assert!(matches!(error, ApiError::Transport(_)));
}
