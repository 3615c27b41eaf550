//! Accepts jobs, runs them in the background and keeps their records honest.
//!
//! Lifecycle of one task:
//! `pending` (record created by `submit`) -> waits for an execution slot ->
//! `running` -> `completed` | `failed`. If the orchestrator shuts down while
//! the task waits for a slot, the task goes straight to `failed`.

use std::sync::Arc;
use std::time::Duration;

use forge_core::api::{CleanupReport, MetricsReport};
use forge_core::model::{FailureKind, TaskFamily, TaskId, TaskRecord, TransitionError};
use forge_core::EpochMs;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::cache::ResultCache;
use crate::jobs::{Job, JobContext, ProgressReporter};
use crate::store::{TaskStore, TaskStores};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("orchestrator is shutting down; no new tasks are accepted")]
    ShuttingDown,
    #[error("could not prepare {path}: {source}")]
    Workspace {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("{family} task {id} not found")]
pub struct TaskNotFound {
    pub family: TaskFamily,
    pub id: TaskId,
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub max_concurrent_tasks: usize,
    pub retention: Duration,
    pub cache_results: bool,
    pub result_ttl: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 4,
            retention: Duration::from_secs(3600),
            cache_results: true,
            result_ttl: Duration::from_secs(3600),
        }
    }
}

pub struct Orchestrator {
    stores: TaskStores,
    cache: Arc<ResultCache>,
    ctx: Arc<JobContext>,
    slots: Arc<Semaphore>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(ctx: JobContext, settings: OrchestratorSettings) -> Self {
        Self::with_stores(TaskStores::in_memory(), ctx, settings)
    }

    pub fn with_stores(stores: TaskStores, ctx: JobContext, settings: OrchestratorSettings) -> Self {
        Self {
            stores,
            cache: Arc::new(ResultCache::new()),
            ctx: Arc::new(ctx),
            slots: Arc::new(Semaphore::new(settings.max_concurrent_tasks.max(1))),
            settings,
        }
    }

    pub fn stores(&self) -> &TaskStores {
        &self.stores
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn context(&self) -> &JobContext {
        &self.ctx
    }

    pub fn is_shut_down(&self) -> bool {
        self.slots.is_closed()
    }

    /// Create the `pending` record and start background execution.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, job: Job) -> Result<TaskRecord, SubmitError> {
        if self.is_shut_down() {
            return Err(SubmitError::ShuttingDown);
        }

        let store = Arc::clone(self.stores.get(job.family()));
        let record = store.create(job.request_snapshot());
        info!(task_id = %record.id, family = %record.family, "task accepted");

        let execution = Execution {
            id: record.id.clone(),
            store,
            cache: Arc::clone(&self.cache),
            ctx: Arc::clone(&self.ctx),
            slots: Arc::clone(&self.slots),
            settings: self.settings,
        };
        tokio::spawn(execution.run(job));

        Ok(record)
    }

    /// Live record, or the cached final record once the live one was evicted.
    pub fn status(&self, family: TaskFamily, id: &TaskId) -> Result<TaskRecord, TaskNotFound> {
        if let Some(record) = self.stores.get(family).get(id) {
            return Ok(record);
        }
        self.cache
            .get(&family.cache_key(id))
            .and_then(|value| serde_json::from_value(value).ok())
            .ok_or_else(|| TaskNotFound {
                family,
                id: id.clone(),
            })
    }

    /// Evict terminal tasks past the retention window and expired cache entries.
    pub fn cleanup(&self, now_ms: EpochMs) -> CleanupReport {
        let mut report = CleanupReport {
            success: true,
            ..CleanupReport::default()
        };
        for family in TaskFamily::ALL {
            let store = self.stores.get(family);
            let evicted = store.sweep(now_ms, self.settings.retention);
            for record in &evicted {
                debug!(task_id = %record.id, family = %family, "evicted");
            }
            *report.cleaned.get_mut(family) = evicted.len();
            *report.remaining.get_mut(family) = store.len();
        }
        report.cache_purged = self.cache.purge_expired();
        report
    }

    pub fn metrics(&self, now_ms: EpochMs) -> MetricsReport {
        MetricsReport {
            timestamp_ms: now_ms,
            tasks: self.stores.status_breakdown(),
            cached_results: self.cache.len(),
        }
    }

    /// Stop accepting work. Tasks still waiting for a slot fail; running ones finish.
    pub fn shutdown(&self) {
        if !self.slots.is_closed() {
            info!("orchestrator shutting down");
            self.slots.close();
        }
    }
}

struct Execution {
    id: TaskId,
    store: Arc<dyn TaskStore>,
    cache: Arc<ResultCache>,
    ctx: Arc<JobContext>,
    slots: Arc<Semaphore>,
    settings: OrchestratorSettings,
}

impl Execution {
    async fn run(self, job: Job) {
        let permit = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.finish(|r| {
                    r.fail(
                        FailureKind::Scheduling,
                        "orchestrator shut down before the task could start",
                    )
                });
                return;
            }
        };

        let (stage, progress) = job.initial_phase();
        if let Err(e) = self.store.update(&self.id, &mut |r| r.start(stage, progress)) {
            warn!(task_id = %self.id, error = %e, "task could not start");
            drop(permit);
            let message = format!("task could not start: {e}");
            self.finish(|r| r.fail(FailureKind::Internal, message.clone()));
            return;
        }
        info!(task_id = %self.id, family = %self.store.family(), "task running");

        let ctx = Arc::clone(&self.ctx);
        let reporter = ProgressReporter::new(Arc::clone(&self.store), self.id.clone());
        let outcome = tokio::spawn(async move { job.run(&ctx, &reporter).await }).await;
        drop(permit);

        match outcome {
            Ok(Ok(result)) => self.finish(move |r| r.complete(result.clone())),
            Ok(Err(e)) => {
                let kind = e.kind();
                let message = e.to_string();
                warn!(task_id = %self.id, error = %message, ?kind, "task failed");
                self.finish(move |r| r.fail(kind, message.clone()));
            }
            Err(join) => {
                let message = if join.is_panic() {
                    "task panicked during execution"
                } else {
                    "task was cancelled"
                };
                error!(task_id = %self.id, "{message}");
                self.finish(|r| r.fail(FailureKind::Internal, message));
            }
        }
    }

    fn finish(&self, mut mutate: impl FnMut(&mut TaskRecord) -> Result<(), TransitionError>) {
        let record = match self.store.update(&self.id, &mut mutate) {
            Ok(record) => record,
            Err(e) => {
                error!(task_id = %self.id, error = %e, "could not record task outcome");
                return;
            }
        };
        info!(
            task_id = %record.id,
            family = %record.family,
            status = record.status.as_str(),
            "task finished"
        );

        if self.settings.cache_results {
            match serde_json::to_value(&record) {
                Ok(value) => self.cache.set(
                    record.family.cache_key(&record.id),
                    value,
                    self.settings.result_ttl,
                ),
                Err(e) => warn!(task_id = %record.id, error = %e, "result not cached"),
            }
        }
    }
}
