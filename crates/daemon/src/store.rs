//! Per-family task records.
//!
//! Every mutation goes through [`TaskStore::update`], which applies the
//! mutator to a copy and writes it back only when the mutator accepts the
//! transition. Readers always see a whole record.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use forge_core::api::{FamilyMap, StatusBreakdown};
use forge_core::model::{TaskFamily, TaskId, TaskRecord, TransitionError};
use forge_core::EpochMs;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task {0} not found")]
    NotFound(TaskId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Mutator applied by [`TaskStore::update`].
pub type Mutator<'a> = &'a mut dyn FnMut(&mut TaskRecord) -> Result<(), TransitionError>;

pub trait TaskStore: Send + Sync {
    fn family(&self) -> TaskFamily;

    /// Mint an id and insert a `pending` record.
    fn create(&self, request: Value) -> TaskRecord;

    fn get(&self, id: &TaskId) -> Option<TaskRecord>;

    /// Atomic read-modify-write. A rejected mutation leaves the stored record untouched.
    fn update(&self, id: &TaskId, mutate: Mutator<'_>) -> Result<TaskRecord, StoreError>;

    fn list(&self) -> Vec<TaskRecord>;

    fn evict(&self, id: &TaskId) -> bool;

    /// Remove terminal records that finished more than `retention` before `now_ms`.
    fn sweep(&self, now_ms: EpochMs, retention: Duration) -> Vec<TaskRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local store. Records are lost on restart.
pub struct InMemoryTaskStore {
    family: TaskFamily,
    tasks: DashMap<TaskId, TaskRecord>,
}

impl InMemoryTaskStore {
    pub fn new(family: TaskFamily) -> Self {
        Self {
            family,
            tasks: DashMap::new(),
        }
    }
}

impl TaskStore for InMemoryTaskStore {
    fn family(&self) -> TaskFamily {
        self.family
    }

    fn create(&self, request: Value) -> TaskRecord {
        loop {
            let record = TaskRecord::new(TaskId::new(), self.family, request.clone());
            match self.tasks.entry(record.id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(record.clone());
                    return record;
                }
            }
        }
    }

    fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.tasks.get(id).map(|r| r.value().clone())
    }

    fn update(&self, id: &TaskId, mutate: Mutator<'_>) -> Result<TaskRecord, StoreError> {
        let mut entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let mut draft = entry.value().clone();
        mutate(&mut draft)?;
        draft.touch();
        *entry.value_mut() = draft.clone();
        Ok(draft)
    }

    fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self.tasks.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    fn evict(&self, id: &TaskId) -> bool {
        self.tasks.remove(id).is_some()
    }

    fn sweep(&self, now_ms: EpochMs, retention: Duration) -> Vec<TaskRecord> {
        let window = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(window);
        let expired: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|r| r.value().finished_before(cutoff))
            .map(|r| r.key().clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| {
                self.tasks
                    .remove_if(&id, |_, record| record.finished_before(cutoff))
                    .map(|(_, record)| record)
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }
}

/// One store per family.
#[derive(Clone)]
pub struct TaskStores {
    stores: FamilyMap<Arc<dyn TaskStore>>,
}

impl TaskStores {
    pub fn new(stores: FamilyMap<Arc<dyn TaskStore>>) -> Self {
        Self { stores }
    }

    pub fn in_memory() -> Self {
        Self::new(FamilyMap {
            generations: Arc::new(InMemoryTaskStore::new(TaskFamily::Generation)),
            analyses: Arc::new(InMemoryTaskStore::new(TaskFamily::Analysis)),
            publishes: Arc::new(InMemoryTaskStore::new(TaskFamily::Publish)),
        })
    }

    pub fn get(&self, family: TaskFamily) -> &Arc<dyn TaskStore> {
        self.stores.get(family)
    }

    /// Records held per family, terminal ones included.
    pub fn counts(&self) -> FamilyMap<usize> {
        let mut counts = FamilyMap::default();
        for family in TaskFamily::ALL {
            *counts.get_mut(family) = self.get(family).len();
        }
        counts
    }

    pub fn status_breakdown(&self) -> FamilyMap<StatusBreakdown> {
        let mut breakdown: FamilyMap<StatusBreakdown> = FamilyMap::default();
        for family in TaskFamily::ALL {
            let slot = breakdown.get_mut(family);
            for record in self.get(family).list() {
                slot.record(record.status);
            }
        }
        breakdown
    }
}
