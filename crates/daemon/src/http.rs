use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequest, Path, Request, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use forge_core::api::{
    AcceptedTask, CleanupReport, FamilyMap, HealthReport, MetricsReport, OptimizationResponse,
    TemplateListResponse, TemplateResponse, ToolStatus, UltraThinkResponse,
};
use forge_core::model::{TaskFamily, TaskId, TaskRecord};
use forge_core::request::{
    AnalysisRequest, GenerationRequest, OptimizationRequest, PublishRequest,
    TemplateRequest, UltraThinkRequest, Validate, ValidationError,
};
use forge_core::{new_ulid, now_ms};
use forge_exec::{ForgeCommand, SubprocessRunner, Toolchain};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

use crate::auth::{self, AuthError, Authenticator};
use crate::config::DaemonConfig;
use crate::jobs::Job;
use crate::ops::{self, OperationError, PresetCustomization};
use crate::orchestrator::{Orchestrator, SubmitError, TaskNotFound};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub auth: Arc<dyn Authenticator>,
    pub config: Arc<DaemonConfig>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, auth: Arc<dyn Authenticator>, config: DaemonConfig) -> Self {
        Self {
            orchestrator,
            auth,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/generate", post(generate))
        .route("/generate/ultrathink", post(generate_ultrathink))
        .route("/generate/from-template/{template_id}", post(generate_from_preset))
        .route("/generate/{id}", get(generation_status))
        .route("/analyze", post(analyze))
        .route("/analyze/{id}", get(analysis_status))
        .route("/publish", post(publish))
        .route("/publish/{id}", get(publish_status))
        .route("/optimize", post(optimize))
        .route("/templates", get(list_templates))
        .route("/templates/{template_id}", post(render_template))
        .route("/ultrathink", post(ultrathink))
        .route("/metrics", get(metrics))
        .route("/cleanup", delete(cleanup))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_bearer));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error(transparent)]
    Scheduling(#[from] SubmitError),
    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl From<TaskNotFound> for ApiError {
    fn from(value: TaskNotFound) -> Self {
        Self::NotFound(value.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Scheduling(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Operation(OperationError::Rejected(_)) => StatusCode::BAD_REQUEST,
            Self::Operation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status();
        if code.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, status = code.as_u16(), "request rejected");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status_code": code.as_u16(),
            "timestamp": now_ms(),
        }));
        (code, body).into_response()
    }
}

/// JSON body that has passed [`Validate`]. Malformed JSON is a validation error too.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ValidationError::Malformed(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

type Accepted = (StatusCode, Json<AcceptedTask>);

async fn root() -> Json<Value> {
    Json(json!({
        "name": "forge-daemon",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "generate": "/api/v1/generate",
            "generateUltrathink": "/api/v1/generate/ultrathink",
            "generateFromTemplate": "/api/v1/generate/from-template/{templateId}",
            "analyze": "/api/v1/analyze",
            "publish": "/api/v1/publish",
            "optimize": "/api/v1/optimize",
            "templates": "/api/v1/templates",
            "ultrathink": "/api/v1/ultrathink",
            "metrics": "/api/v1/metrics",
            "cleanup": "/api/v1/cleanup",
        }
    }))
}

async fn health(State(st): State<AppState>) -> Json<HealthReport> {
    let runner = SubprocessRunner::new().with_timeout(Duration::from_secs(10));
    let toolchain = &st.config.toolchain;
    let node = tool_status(&runner, toolchain, ForgeCommand::NodeVersion).await;
    let npm = tool_status(&runner, toolchain, ForgeCommand::NpmVersion).await;
    let cli_present = tokio::fs::try_exists(&toolchain.cli_script).await.unwrap_or(false);

    let stores = st.orchestrator.stores();
    let breakdown = stores.status_breakdown();
    let active_tasks = FamilyMap {
        generations: breakdown.generations.active(),
        analyses: breakdown.analyses.active(),
        publishes: breakdown.publishes.active(),
    };

    let status = if node.available && cli_present { "healthy" } else { "degraded" };
    Json(HealthReport {
        status: status.into(),
        timestamp_ms: now_ms(),
        node,
        npm,
        cli_present,
        cli_path: toolchain.cli_script.display().to_string(),
        active_tasks,
        tracked_tasks: stores.counts(),
    })
}

async fn tool_status(runner: &SubprocessRunner, toolchain: &Toolchain, command: ForgeCommand<'_>) -> ToolStatus {
    let argv = command.argv(toolchain);
    let result = runner.run(&argv, None).await;
    ToolStatus {
        available: result.success,
        version: result.success.then(|| result.stdout.trim().to_string()),
        path: argv.first().cloned().unwrap_or_default(),
    }
}

async fn accept_generation(st: &AppState, request: GenerationRequest) -> Result<Accepted, ApiError> {
    if st.orchestrator.is_shut_down() {
        return Err(SubmitError::ShuttingDown.into());
    }
    let output_dir = match &request.config.output_dir {
        Some(dir) => PathBuf::from(dir),
        None => st.config.work_root.join(format!("forge-{}", new_ulid())),
    };
    tokio::fs::create_dir_all(&output_dir)
        .await
        .map_err(|source| SubmitError::Workspace {
            path: output_dir.display().to_string(),
            source,
        })?;

    let job = Job::Generation { request, output_dir };
    let package_path = job.package_path();
    let record = st.orchestrator.submit(job)?;
    let accepted = AcceptedTask::from_record(&record).with_package_path(package_path.display().to_string());
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn generate(
    State(st): State<AppState>,
    ValidJson(request): ValidJson<GenerationRequest>,
) -> Result<Accepted, ApiError> {
    accept_generation(&st, request).await
}

async fn generate_ultrathink(
    State(st): State<AppState>,
    ValidJson(mut request): ValidJson<GenerationRequest>,
) -> Result<Accepted, ApiError> {
    request.ai_config = Some(request.ai_config.take().unwrap_or_default().ultrathink());
    accept_generation(&st, request).await
}

async fn generate_from_preset(
    State(st): State<AppState>,
    Path(template_id): Path<String>,
    ValidJson(custom): ValidJson<PresetCustomization>,
) -> Result<Accepted, ApiError> {
    let request = ops::preset_request(&template_id, custom)
        .ok_or_else(|| ApiError::NotFound(format!("template {template_id} not found")))?;
    request.validate()?;
    accept_generation(&st, request).await
}

async fn ensure_exists(path: &str) -> Result<(), ApiError> {
    match tokio::fs::try_exists(FsPath::new(path)).await {
        Ok(true) => Ok(()),
        _ => Err(ApiError::NotFound(format!("package path does not exist: {path}"))),
    }
}

async fn analyze(
    State(st): State<AppState>,
    ValidJson(request): ValidJson<AnalysisRequest>,
) -> Result<Accepted, ApiError> {
    ensure_exists(&request.package_path).await?;
    let record = st.orchestrator.submit(Job::Analysis(request))?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedTask::from_record(&record))))
}

async fn publish(
    State(st): State<AppState>,
    ValidJson(request): ValidJson<PublishRequest>,
) -> Result<Accepted, ApiError> {
    ensure_exists(&request.package_path).await?;
    let record = st.orchestrator.submit(Job::Publish(request))?;
    Ok((StatusCode::ACCEPTED, Json(AcceptedTask::from_record(&record))))
}

fn task_status(st: &AppState, family: TaskFamily, id: String) -> Result<Json<TaskRecord>, ApiError> {
    let record = st.orchestrator.status(family, &TaskId::from(id))?;
    Ok(Json(record))
}

async fn generation_status(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    task_status(&st, TaskFamily::Generation, id)
}

async fn analysis_status(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    task_status(&st, TaskFamily::Analysis, id)
}

async fn publish_status(
    State(st): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    task_status(&st, TaskFamily::Publish, id)
}

async fn optimize(
    State(st): State<AppState>,
    ValidJson(request): ValidJson<OptimizationRequest>,
) -> Result<Json<OptimizationResponse>, ApiError> {
    ensure_exists(&request.package_path).await?;
    Ok(Json(ops::optimize(st.orchestrator.context(), &request).await))
}

async fn list_templates(State(st): State<AppState>) -> Json<TemplateListResponse> {
    Json(ops::list_templates(st.orchestrator.context()).await)
}

async fn render_template(
    State(st): State<AppState>,
    Path(template_id): Path<String>,
    ValidJson(request): ValidJson<TemplateRequest>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let response = ops::generate_from_template(st.orchestrator.context(), &template_id, &request).await?;
    Ok(Json(response))
}

async fn ultrathink(
    State(st): State<AppState>,
    ValidJson(request): ValidJson<UltraThinkRequest>,
) -> Result<Json<UltraThinkResponse>, ApiError> {
    Ok(Json(ops::ultrathink(st.orchestrator.context(), &request).await?))
}

async fn metrics(State(st): State<AppState>) -> Json<MetricsReport> {
    Json(st.orchestrator.metrics(now_ms()))
}

async fn cleanup(State(st): State<AppState>) -> Json<CleanupReport> {
    Json(st.orchestrator.cleanup(now_ms()))
}

