//! Task records and the task state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::util::{new_ulid, now_ms, EpochMs};

/// Opaque task identifier (ULID). Never reused within a process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Mints a fresh identifier.
    pub fn new() -> Self {
        Self(new_ulid().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Category of asynchronous work. Determines command shape and result schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskFamily {
    /// Package generation.
    Generation,
    /// Analysis of an existing package.
    Analysis,
    /// Publishing a package to a registry.
    Publish,
}

impl TaskFamily {
    /// Every family, in reporting order.
    pub const ALL: [TaskFamily; 3] = [Self::Generation, Self::Analysis, Self::Publish];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Analysis => "analysis",
            Self::Publish => "publish",
        }
    }

    /// Route segment under `/api/v1` where this family is submitted and polled.
    pub fn route_segment(&self) -> &'static str {
        match self {
            Self::Generation => "generate",
            Self::Analysis => "analyze",
            Self::Publish => "publish",
        }
    }

    /// Result cache key for a task of this family.
    pub fn cache_key(&self, id: &TaskId) -> String {
        format!("{}:{}", self.as_str(), id)
    }
}

impl fmt::Display for TaskFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Record exists, execution has not started.
    Pending,
    /// Background execution is active.
    Running,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl TaskStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns `true` if moving from this status to `next` is allowed.
    ///
    /// - `Pending` -> `Running`, `Failed`
    /// - `Running` -> `Completed`, `Failed`
    /// - terminal states -> nothing
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Failed),
            Self::Running => matches!(next, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a task ended in `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The task never got an execution slot.
    Scheduling,
    /// A subprocess or collaborator reported failure.
    Execution,
    /// A subprocess or collaborator call exceeded its deadline.
    Timeout,
    /// Unanticipated failure inside the execution path.
    Internal,
}

/// A rejected state-machine mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// Status change not permitted from the current status.
    #[error("task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Task being mutated.
        id: TaskId,
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },
    /// Progress may only grow.
    #[error("progress of task {id} cannot go back from {from} to {to}")]
    ProgressRegression {
        /// Task being mutated.
        id: TaskId,
        /// Current progress.
        from: u8,
        /// Requested progress.
        to: u8,
    },
    /// Progress above 100.
    #[error("progress {0} is outside 0..=100")]
    ProgressOutOfRange(u8),
}

/// One unit of asynchronous work tracked through the state machine.
///
/// Fields are readable by anyone; mutation should go through the transition
/// methods so the invariants hold:
/// - status only moves forward (see [`TaskStatus::can_transition_to`]),
/// - progress never decreases,
/// - once terminal exactly one of `result` / `error` is set,
/// - `completed_at_ms` is stamped exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Stable identifier.
    pub id: TaskId,
    /// Which store holds the record.
    pub family: TaskFamily,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Percent complete, 0..=100, never decreasing.
    pub progress: u8,
    /// Advisory phase label, e.g. `analyzing_requirements`.
    pub stage: String,
    /// Advisory note for the current phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Validated request, captured at acceptance time.
    pub request: Value,
    /// When the task was accepted.
    pub created_at_ms: EpochMs,
    /// Last mutation.
    pub updated_at_ms: EpochMs,
    /// Set once when the task reaches a terminal status.
    #[serde(default)]
    pub completed_at_ms: Option<EpochMs>,
    /// Family payload, set only when completed.
    #[serde(default)]
    pub result: Option<Value>,
    /// Failure description, set only when failed.
    #[serde(default)]
    pub error: Option<String>,
    /// Failure category, set only when failed.
    #[serde(default)]
    pub error_kind: Option<FailureKind>,
}

impl TaskRecord {
    /// Fresh `pending` record.
    pub fn new(id: TaskId, family: TaskFamily, request: Value) -> Self {
        let now = now_ms();
        Self {
            id,
            family,
            status: TaskStatus::Pending,
            progress: 0,
            stage: "initialization".into(),
            message: None,
            request,
            created_at_ms: now,
            updated_at_ms: now,
            completed_at_ms: None,
            result: None,
            error: None,
            error_kind: None,
        }
    }

    /// `true` once the task is completed or failed.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// `pending` -> `running`.
    pub fn start(&mut self, stage: impl Into<String>, progress: u8) -> Result<(), TransitionError> {
        self.ensure_transition(TaskStatus::Running)?;
        self.check_progress(progress)?;
        self.status = TaskStatus::Running;
        self.progress = progress;
        self.stage = stage.into();
        self.touch();
        Ok(())
    }

    /// Report a new phase while running.
    pub fn advance(&mut self, progress: u8, stage: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != TaskStatus::Running {
            return Err(TransitionError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: TaskStatus::Running,
            });
        }
        self.check_progress(progress)?;
        self.progress = progress;
        self.stage = stage.into();
        self.touch();
        Ok(())
    }

    /// `running` -> `completed`.
    pub fn complete(&mut self, result: Value) -> Result<(), TransitionError> {
        self.ensure_transition(TaskStatus::Completed)?;
        let now = now_ms();
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.stage = "done".into();
        self.result = Some(result);
        self.error = None;
        self.error_kind = None;
        self.completed_at_ms = Some(now);
        self.touch();
        Ok(())
    }

    /// `pending | running` -> `failed`. Progress and stage are kept as reached.
    pub fn fail(&mut self, kind: FailureKind, error: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_transition(TaskStatus::Failed)?;
        let now = now_ms();
        self.status = TaskStatus::Failed;
        self.result = None;
        self.error = Some(error.into());
        self.error_kind = Some(kind);
        self.completed_at_ms = Some(now);
        self.touch();
        Ok(())
    }

    /// Refresh `updated_at_ms`. Never moves it backwards.
    pub fn touch(&mut self) {
        self.updated_at_ms = now_ms().max(self.updated_at_ms);
    }

    /// Terminal and finished strictly before `cutoff_ms`.
    pub fn finished_before(&self, cutoff_ms: EpochMs) -> bool {
        self.is_terminal() && self.completed_at_ms.is_some_and(|at| at < cutoff_ms)
    }

    fn ensure_transition(&self, to: TaskStatus) -> Result<(), TransitionError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to,
            })
        }
    }

    fn check_progress(&self, progress: u8) -> Result<(), TransitionError> {
        if progress > 100 {
            return Err(TransitionError::ProgressOutOfRange(progress));
        }
        if progress < self.progress {
            return Err(TransitionError::ProgressRegression {
                id: self.id.clone(),
                from: self.progress,
                to: progress,
            });
        }
        Ok(())
    }
}
