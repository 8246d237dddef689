use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{WorkflowEvent, WorkflowEventKind};
use crate::errors::CoreEngineError;

/// Almacenamiento de eventos append-only, orden ascendente por `seq` dentro
/// de cada workflow.
pub trait EventStore: Send + Sync {
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, CoreEngineError>;
    fn list(&self, workflow_id: Uuid) -> Result<Vec<WorkflowEvent>, CoreEngineError>;
}

#[derive(Default)]
pub struct InMemoryEventStore {
    inner: DashMap<Uuid, Vec<WorkflowEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, CoreEngineError> {
        let mut events = self.inner.entry(workflow_id).or_default();
        let ev = WorkflowEvent { seq: events.len() as u64,
                                 workflow_id,
                                 kind,
                                 ts: Utc::now() };
        events.push(ev.clone());
        Ok(ev)
    }

    fn list(&self, workflow_id: Uuid) -> Result<Vec<WorkflowEvent>, CoreEngineError> {
        Ok(self.inner.get(&workflow_id).map(|v| v.value().clone()).unwrap_or_default())
    }
}
