use crate::config::validate_run_bounds;
use crate::generation::StructuredGenerator;
use crate::models::{
    FeedbackRequest, FeedbackResponse, ResearchContext, ResearchRequest, ResearchResponse,
    SessionRecord, SessionStatus,
};
use crate::research::{FeedbackGenerator, ReportSynthesizer, ResearchOrchestrator};
use crate::sessions::SessionRegistry;
use crate::tasks::{DeepResearchTask, ReporterTask};
use crate::tools::SearchClient;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    runner: Arc<FlowRunner>,
    storage: Arc<dyn SessionStorage>,
    sessions: Arc<SessionRegistry>,
    feedback: Arc<FeedbackGenerator>,
}

impl AppState {
    /// Wires the research workflow (`deep_research` then `report_writer`) on
    /// top of one generator and one search client.
    pub fn new(
        generator: Arc<StructuredGenerator>,
        search: Arc<dyn SearchClient>,
        concurrency: usize,
    ) -> Self {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let sessions = Arc::new(SessionRegistry::new());
        let orchestrator = Arc::new(ResearchOrchestrator::new(
            generator.clone(),
            search,
            concurrency,
        ));
        let reporter = Arc::new(ReportSynthesizer::new(generator.clone()));

        let graph = GraphBuilder::new("deep_research_workflow")
            .add_task(Arc::new(DeepResearchTask::new(orchestrator, sessions.clone())))
            .add_task(Arc::new(ReporterTask::new(reporter)))
            .add_edge("deep_research", "report_writer")
            .build();

        Self {
            runner: Arc::new(FlowRunner::new(Arc::new(graph), storage.clone())),
            storage,
            sessions,
            feedback: Arc::new(FeedbackGenerator::new(generator)),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/feedback", post(feedback))
        .route("/research", post(research))
        .route("/sessions", get(list_sessions))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/cancel", post(cancel_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[instrument(skip(state, req))]
async fn feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    if req.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query must not be empty".to_string()));
    }
    if req.num_questions == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "numQuestions must be at least 1".to_string(),
        ));
    }

    let questions = state
        .feedback
        .generate(&req.query, req.num_questions)
        .await
        .map_err(|e| {
            error!("Feedback generation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(FeedbackResponse { questions }))
}

#[instrument(skip(state, req), fields(query = %req.query))]
async fn research(
    State(state): State<AppState>,
    Json(req): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>, ApiError> {
    let start_time = std::time::Instant::now();
    validate_run_bounds(req.breadth, req.depth).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    if req.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "query must not be empty".to_string()));
    }

    let (session_id, _cancel) = state.sessions.start(&req.query, req.breadth, req.depth);
    info!("Starting research workflow for session {}", session_id);

    let session = Session::new_from_task(session_id.clone(), "deep_research");
    let context = ResearchContext {
        session_id: session_id.clone(),
        query: req.query.clone(),
        breadth: req.breadth,
        depth: req.depth,
        result: None,
        report: String::new(),
    };
    session.context.set("research_context", context).await;
    if let Err(e) = state.storage.save(session).await {
        return Err(fail_session(&state, &session_id, e.to_string()));
    }

    if let Err(message) = drive_workflow(&state, &session_id).await {
        return Err(fail_session(&state, &session_id, message));
    }

    let session = match state.storage.get(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => return Err(fail_session(&state, &session_id, "session vanished".to_string())),
        Err(e) => return Err(fail_session(&state, &session_id, e.to_string())),
    };
    let Some(context) = session.context.get::<ResearchContext>("research_context").await else {
        return Err(fail_session(
            &state,
            &session_id,
            "research context missing after workflow".to_string(),
        ));
    };

    let result = context.result.unwrap_or_default();
    state.sessions.complete(&session_id, context.report.clone());
    info!("Workflow completed in {:?}", start_time.elapsed());

    Ok(Json(ResearchResponse {
        session_id,
        query: req.query,
        learnings: result.learnings,
        visited_urls: result.visited_urls,
        branches: result.branches,
        report: context.report,
        task_times: session.context.get("task_times").await.unwrap_or_default(),
        total_time_ms: start_time.elapsed().as_millis() as u64,
    }))
}

async fn drive_workflow(state: &AppState, session_id: &str) -> Result<(), String> {
    loop {
        let result = state.runner.run(session_id).await.map_err(|e| e.to_string())?;

        match &result.status {
            ExecutionStatus::Completed => return Ok(()),
            ExecutionStatus::Paused { next_task_id, .. } => {
                info!("Workflow paused, next task: {}", next_task_id);
                continue;
            }
            ExecutionStatus::Error(e) => return Err(e.to_string()),
            _ => continue,
        }
    }
}

fn fail_session(state: &AppState, session_id: &str, message: String) -> ApiError {
    match state.sessions.fail(session_id, message.clone()) {
        SessionStatus::Cancelled => {
            info!("Session {} was cancelled: {}", session_id, message);
            (StatusCode::CONFLICT, message)
        }
        _ => {
            error!("Workflow error for session {}: {}", session_id, message);
            (StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionRecord>> {
    Json(state.sessions.list())
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionRecord>, StatusCode> {
    state.sessions.get(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    match state.sessions.get(&id) {
        Some(record) if record.status == SessionStatus::InProgress && state.sessions.cancel(&id) => {
            info!("Cancellation requested for session {}", id);
            StatusCode::ACCEPTED
        }
        _ => StatusCode::NOT_FOUND,
    }
}
