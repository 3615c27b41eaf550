//! Payloads returned by the HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{TaskFamily, TaskId, TaskRecord, TaskStatus};
use crate::EpochMs;

/// Returned immediately when an asynchronous request is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedTask {
    /// Id to poll with.
    pub task_id: TaskId,
    /// Family the task belongs to.
    pub family: TaskFamily,
    /// Always `pending` at acceptance.
    pub status: TaskStatus,
    /// Where to poll for status.
    pub status_url: String,
    /// When the record was created.
    pub created_at_ms: EpochMs,
    /// Generation only: where the package will appear.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_path: Option<String>,
}

impl AcceptedTask {
    /// Acceptance payload for a freshly created record.
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id.clone(),
            family: record.family,
            status: record.status,
            status_url: format!("/api/v1/{}/{}", record.family.route_segment(), record.id),
            created_at_ms: record.created_at_ms,
            package_path: None,
        }
    }

    /// Attach the generated package location.
    pub fn with_package_path(mut self, path: impl Into<String>) -> Self {
        self.package_path = Some(path.into());
        self
    }
}

/// One value per task family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMap<T> {
    /// Generation tasks.
    pub generations: T,
    /// Analysis tasks.
    pub analyses: T,
    /// Publish tasks.
    pub publishes: T,
}

impl<T> FamilyMap<T> {
    /// Value for `family`.
    pub fn get(&self, family: TaskFamily) -> &T {
        match family {
            TaskFamily::Generation => &self.generations,
            TaskFamily::Analysis => &self.analyses,
            TaskFamily::Publish => &self.publishes,
        }
    }

    /// Mutable value for `family`.
    pub fn get_mut(&mut self, family: TaskFamily) -> &mut T {
        match family {
            TaskFamily::Generation => &mut self.generations,
            TaskFamily::Analysis => &mut self.analyses,
            TaskFamily::Publish => &mut self.publishes,
        }
    }
}

/// Task counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    /// All tasks counted.
    pub total: usize,
    /// Waiting for an execution slot.
    pub pending: usize,
    /// Executing.
    pub running: usize,
    /// Finished with a result.
    pub completed: usize,
    /// Finished with an error.
    pub failed: usize,
}

impl StatusBreakdown {
    /// Count one task.
    pub fn record(&mut self, status: TaskStatus) {
        self.total += 1;
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Running => self.running += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }

    /// Pending plus running.
    pub fn active(&self) -> usize {
        self.pending + self.running
    }
}

/// Outcome of an age-based cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Always `true` once the sweep ran.
    pub success: bool,
    /// Records evicted per family.
    pub cleaned: FamilyMap<usize>,
    /// Records left per family.
    pub remaining: FamilyMap<usize>,
    /// Expired result-cache entries dropped in the same pass.
    pub cache_purged: usize,
}

/// Usage statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    /// When the report was taken.
    pub timestamp_ms: EpochMs,
    /// Counts per family and status.
    pub tasks: FamilyMap<StatusBreakdown>,
    /// Entries in the result cache, expired ones included.
    pub cached_results: usize,
}

/// Availability of one external tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStatus {
    /// Version check exited zero.
    pub available: bool,
    /// Trimmed version output when available.
    pub version: Option<String>,
    /// Executable that was checked.
    pub path: String,
}

/// Health of the daemon and its external executables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// `healthy` or `degraded`.
    pub status: String,
    /// When the report was taken.
    pub timestamp_ms: EpochMs,
    /// Interpreter check.
    pub node: ToolStatus,
    /// Registry tool check.
    pub npm: ToolStatus,
    /// The generator CLI script exists on disk.
    pub cli_present: bool,
    /// Configured CLI script path.
    pub cli_path: String,
    /// Pending + running tasks per family.
    pub active_tasks: FamilyMap<usize>,
    /// Records currently held per family, terminal ones included.
    pub tracked_tasks: FamilyMap<usize>,
}

/// Synchronous optimization result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResponse {
    /// The optimizer ran successfully.
    pub success: bool,
    /// Id minted for this run.
    pub optimization_id: String,
    /// Improvements reported by the optimizer.
    #[serde(default)]
    pub improvements: Vec<Value>,
    /// Optimizer metrics; an empty object when absent.
    #[serde(default)]
    pub metrics: Value,
    /// Follow-up suggestions.
    #[serde(default)]
    pub recommendations: Vec<Value>,
    /// Why stdout could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    /// Unparsed stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    /// Failure summary of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Synchronous template listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateListResponse {
    /// A template list was parsed.
    pub success: bool,
    /// Parsed template list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<Value>,
    /// Unparsed stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    /// Failure summary or parse note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Synchronous template rendering result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
    /// Rendered template.
    pub template_id: String,
    /// Directory rendered into.
    pub output_path: String,
    /// Full paths of the files under `output_path`.
    pub files: Vec<String>,
}

/// Synchronous idea-expansion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UltraThinkResponse {
    /// Output was parsed.
    pub success: bool,
    /// Id minted for this run.
    pub thinking_id: String,
    /// Candidate solutions.
    #[serde(default)]
    pub solutions: Vec<Value>,
    /// Observations about the idea.
    #[serde(default)]
    pub insights: Vec<Value>,
    /// Follow-up suggestions.
    #[serde(default)]
    pub recommendations: Vec<Value>,
    /// Why stdout could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    /// Unparsed stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}
