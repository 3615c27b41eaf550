//! The work behind each asynchronous task family.
//!
//! A job runs after its record has been moved to `running` and reports
//! further phases through a [`ProgressReporter`]. Its return value becomes
//! the record's `result`; an [`ExecutionError`] becomes its `error`.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use forge_core::model::{FailureKind, TaskFamily, TaskId};
use forge_core::outcome::{AnalysisOutcome, GenerationOutcome, PublishOutcome};
use forge_core::request::{AnalysisRequest, GenerationRequest, PublishRequest};
use forge_exec::files::{self, FileError};
use forge_exec::{ForgeCommand, ParsedOutput, SubprocessResult, SubprocessRunner, Toolchain};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::collaborator::{Collaborator, CollaboratorError};
use crate::store::TaskStore;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{0}")]
    Process(String),
    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },
    #[error("AI collaborator failed: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error(transparent)]
    Files(#[from] FileError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ExecutionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::Execution,
        }
    }
}

/// Everything a job needs from the daemon. Shared by all tasks.
pub struct JobContext {
    pub runner: SubprocessRunner,
    pub toolchain: Toolchain,
    /// AI phases are skipped when absent.
    pub collaborator: Option<Arc<dyn Collaborator>>,
    pub collaborator_timeout: Duration,
}

impl JobContext {
    /// Run `command`, turning a non-zero exit or timeout into an error.
    pub async fn run_command(&self, command: ForgeCommand<'_>) -> Result<SubprocessResult, ExecutionError> {
        let argv = command.argv(&self.toolchain);
        let result = self.runner.run(&argv, command.working_dir()).await;
        if result.timed_out {
            return Err(ExecutionError::Timeout {
                what: command.label().to_string(),
                secs: self.runner.timeout().map(|t| t.as_secs()).unwrap_or_default(),
            });
        }
        if !result.success {
            return Err(ExecutionError::Process(result.failure_summary(command.label())));
        }
        Ok(result)
    }

    async fn ask<T, F>(&self, what: &str, call: F) -> Result<T, ExecutionError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        match tokio::time::timeout(self.collaborator_timeout, call).await {
            Ok(answer) => Ok(answer?),
            Err(_) => Err(ExecutionError::Timeout {
                what: what.to_string(),
                secs: self.collaborator_timeout.as_secs(),
            }),
        }
    }
}

/// Writes phase changes of one task to its store.
pub struct ProgressReporter {
    store: Arc<dyn TaskStore>,
    id: TaskId,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn TaskStore>, id: TaskId) -> Self {
        Self { store, id }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.id
    }

    pub fn advance(&self, progress: u8, stage: &str) {
        debug!(task_id = %self.id, progress, stage, "phase");
        if let Err(e) = self.store.update(&self.id, &mut |r| r.advance(progress, stage)) {
            warn!(task_id = %self.id, error = %e, "progress update rejected");
        }
    }

    /// Advisory note shown with the current phase.
    pub fn note(&self, message: &str) {
        let result = self.store.update(&self.id, &mut |r| {
            r.message = Some(message.to_string());
            Ok(())
        });
        if let Err(e) = result {
            warn!(task_id = %self.id, error = %e, "progress note rejected");
        }
    }
}

/// One unit of asynchronous work.
#[derive(Debug, Clone)]
pub enum Job {
    Generation {
        request: GenerationRequest,
        /// Directory the generator writes into; the package lands in `<output_dir>/<name>`.
        output_dir: PathBuf,
    },
    Analysis(AnalysisRequest),
    Publish(PublishRequest),
}

impl Job {
    pub fn family(&self) -> TaskFamily {
        match self {
            Self::Generation { .. } => TaskFamily::Generation,
            Self::Analysis(_) => TaskFamily::Analysis,
            Self::Publish(_) => TaskFamily::Publish,
        }
    }

    /// Request snapshot stored on the record.
    pub fn request_snapshot(&self) -> Value {
        let snapshot = match self {
            Self::Generation { request, .. } => serde_json::to_value(request),
            Self::Analysis(request) => serde_json::to_value(request),
            Self::Publish(request) => serde_json::to_value(request),
        };
        snapshot.unwrap_or(Value::Null)
    }

    /// Stage and progress the record shows once the job starts running.
    pub fn initial_phase(&self) -> (&'static str, u8) {
        match self {
            Self::Generation { .. } => ("analyzing_requirements", 10),
            Self::Analysis(_) => ("analyzing", 10),
            Self::Publish(_) => ("preparing", 10),
        }
    }

    pub fn package_path(&self) -> PathBuf {
        match self {
            Self::Generation { request, output_dir } => output_dir.join(&request.config.package_name),
            Self::Analysis(request) => PathBuf::from(&request.package_path),
            Self::Publish(request) => PathBuf::from(&request.package_path),
        }
    }

    pub async fn run(self, ctx: &JobContext, progress: &ProgressReporter) -> Result<Value, ExecutionError> {
        match self {
            Self::Generation { request, output_dir } => generate(request, &output_dir, ctx, progress).await,
            Self::Analysis(request) => analyze(request, ctx, progress).await,
            Self::Publish(request) => publish(request, ctx, progress).await,
        }
    }
}

async fn generate(
    request: GenerationRequest,
    output_dir: &Path,
    ctx: &JobContext,
    progress: &ProgressReporter,
) -> Result<Value, ExecutionError> {
    let mut config = request.config.clone();
    let package_path = output_dir.join(&config.package_name);

    let ai = match (&request.ai_config, &ctx.collaborator) {
        (Some(ai), Some(collaborator)) => Some((ai, collaborator)),
        (Some(_), None) => {
            progress.note("AI collaborator not configured; AI phases skipped");
            None
        }
        _ => None,
    };

    let analysis = match (&request.idea, ai) {
        (Some(idea), Some((_, collaborator))) => {
            let analysis = ctx
                .ask(
                    "idea analysis",
                    collaborator.analyze_idea(idea, request.complexity.as_deref(), &request.priorities),
                )
                .await?;
            config.apply_analysis(&analysis);
            Some(analysis)
        }
        _ => None,
    };

    progress.advance(30, "generating_structure");
    let scaffold = ctx
        .run_command(ForgeCommand::Generate {
            config: &config,
            output_dir,
        })
        .await?;

    let mut ai_files = Vec::new();
    if let Some((ai, collaborator)) = ai {
        progress.advance(50, "generating_code");
        let sources = ctx
            .ask(
                "source generation",
                collaborator.generate_source_code(&config, analysis.as_ref(), ai),
            )
            .await?;
        ai_files.extend(files::write_files(&package_path, &sources).await?);

        if config.enable_testing {
            progress.advance(70, "generating_tests");
            let tests = ctx
                .ask("test generation", collaborator.generate_tests(&config, &sources, ai))
                .await?;
            ai_files.extend(files::write_files(&package_path, &tests).await?);
        }
    }

    progress.advance(90, "finalizing_package");
    let outcome = GenerationOutcome {
        package_name: config.package_name.clone(),
        package_path: package_path.display().to_string(),
        output_dir: output_dir.display().to_string(),
        files: files::collect_files(output_dir),
        analysis,
        ai_files,
        stdout: scaffold.stdout,
    };
    info!(
        task_id = %progress.task_id(),
        files = outcome.files.len(),
        "package generated"
    );
    Ok(serde_json::to_value(outcome)?)
}

async fn analyze(
    request: AnalysisRequest,
    ctx: &JobContext,
    progress: &ProgressReporter,
) -> Result<Value, ExecutionError> {
    let output = ctx.run_command(ForgeCommand::Analyze(&request)).await?;

    progress.advance(80, "parsing_report");
    let parsed = ParsedOutput::from_stdout(&output.stdout);
    if let Some(note) = &parsed.parse_error {
        warn!(task_id = %progress.task_id(), error = %note, "analysis report kept as raw text");
    }

    let outcome = AnalysisOutcome {
        package_path: request.package_path.clone(),
        analysis_type: request.analysis_type.to_string(),
        report: parsed.value,
        raw_output: parsed.raw_output,
        parse_error: parsed.parse_error,
    };
    Ok(serde_json::to_value(outcome)?)
}

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    name: Option<String>,
    version: Option<String>,
}

async fn read_manifest(package_path: &Path) -> PackageManifest {
    let path = package_path.join("package.json");
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "unreadable package.json");
            PackageManifest::default()
        }),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no package.json");
            PackageManifest::default()
        }
    }
}

async fn publish(
    request: PublishRequest,
    ctx: &JobContext,
    progress: &ProgressReporter,
) -> Result<Value, ExecutionError> {
    let manifest = read_manifest(Path::new(&request.package_path)).await;

    progress.advance(40, "publishing");
    let output = ctx.run_command(ForgeCommand::Publish(&request)).await?;

    let package_url = match (&manifest.name, request.dry_run) {
        (Some(name), false) if request.registry == "npm" => {
            Some(format!("https://www.npmjs.com/package/{name}"))
        }
        _ => None,
    };

    let outcome = PublishOutcome {
        package_path: request.package_path.clone(),
        registry: request.registry.clone(),
        tag: request.tag.clone(),
        dry_run: request.dry_run,
        package_name: manifest.name,
        version: manifest.version,
        package_url,
        stdout: output.stdout,
    };
    Ok(serde_json::to_value(outcome)?)
}
