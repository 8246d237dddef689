//! Errores del core: taxonomía de fallas del motor de workflow.

use plan_domain::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum CoreEngineError {
    /// Acción/fase inconsistente (router o guard). No se mutó nada.
    #[error("validation: {0}")]
    Validation(String),
    #[error("outdated transition: from_step {from_step} < current_step {current_step}")]
    OutdatedTransition { from_step: u32, current_step: u32 },
    #[error("approval incomplete: {approved}/{required} units approved")]
    ApprovalIncomplete { approved: u32, required: u32 },
    #[error("workflow {0} is paused")]
    WorkflowPaused(Uuid),
    #[error("generation dispatch failed for {asset_id}: {message}")]
    GenerationDispatch { asset_id: Uuid, message: String },
    #[error("retry budget exhausted for {asset_id} ({attempt_count}/{max_attempts})")]
    RetryBudgetExhausted { asset_id: Uuid, attempt_count: u32, max_attempts: u32 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("concurrent modification of {entity} {id}: expected version {expected}")]
    ConcurrentModification { entity: String, id: Uuid, expected: u64 },
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("domain: {0}")]
    Domain(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<DomainError> for CoreEngineError {
    fn from(e: DomainError) -> Self {
        CoreEngineError::Domain(e.to_string())
    }
}

impl CoreEngineError {
    /// Errores que no mutaron estado y que el llamador puede reintentar tal cual.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreEngineError::ConcurrentModification { .. } | CoreEngineError::StorageError(_))
    }
}
