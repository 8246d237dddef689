//! Eventos de workflow.
//!
//! Cada transición de fase, creación de unidades, rechazo o despacho deja un
//! evento append-only por `workflow_id`. El `seq` lo asigna el store.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plan_domain::{AssetType, CalibrationOutcome, JobType, Phase, QaDecision, RejectionPath};

/// Motivo por el que un avance no se aplicó.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockedReason {
    OutdatedStep,
    ApprovalIncomplete,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEventKind {
    PhaseChanged {
        from: Phase,
        to: Phase,
        step: u32,
    },
    /// Unidades del step siguiente creadas por un avance. `existing` cuenta
    /// las que ya estaban y no se duplicaron.
    UnitsInitialized {
        asset_type: AssetType,
        created: u32,
        existing: u32,
    },
    AdvanceBlocked {
        from_step: u32,
        reason: BlockedReason,
        approved: Option<u32>,
        required: Option<u32>,
    },
    GenerationDispatched {
        asset_id: Uuid,
        job_type: JobType,
        attempt: u32,
        correlation_id: Uuid,
    },
    /// Rechazo registrado en el historial de una unidad.
    AssetRejected {
        asset_id: Uuid,
        attempt: u32,
        path: RejectionPath,
        learning_applied: bool,
    },
    EditRequested {
        asset_id: Uuid,
        source_ref: String,
    },
    /// `policy_id` y `params_hash` identifican la política que armó el patch;
    /// `ignored` lista categorías recibidas fuera de la tabla.
    RetryStarted {
        asset_id: Uuid,
        attempt: u32,
        root_cause: Option<String>,
        categories: Vec<String>,
        #[serde(default)]
        policy_id: String,
        #[serde(default)]
        params_hash: String,
        #[serde(default)]
        ignored: Vec<String>,
    },
    RetryExhausted {
        asset_id: Uuid,
        attempt_count: u32,
    },
    DispatchFailed {
        asset_id: Uuid,
        error: String,
    },
    OutputRecorded {
        asset_id: Uuid,
        output_ref: String,
    },
    QaRecorded {
        asset_id: Uuid,
        decision: QaDecision,
    },
    UnitApproved {
        asset_id: Uuid,
        locked: bool,
    },
    EnabledChanged {
        enabled: bool,
    },
    CalibrationRecorded {
        category: String,
        outcome: CalibrationOutcome,
        weight: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub seq: u64,
    pub workflow_id: Uuid,
    pub kind: WorkflowEventKind,
    pub ts: DateTime<Utc>,
}

impl WorkflowEventKind {
    /// Nombre estable del evento (columna `event_type` en persistencia).
    pub fn type_name(&self) -> &'static str {
        match self {
            WorkflowEventKind::PhaseChanged { .. } => "phase_changed",
            WorkflowEventKind::UnitsInitialized { .. } => "units_initialized",
            WorkflowEventKind::AdvanceBlocked { .. } => "advance_blocked",
            WorkflowEventKind::GenerationDispatched { .. } => "generation_dispatched",
            WorkflowEventKind::AssetRejected { .. } => "asset_rejected",
            WorkflowEventKind::EditRequested { .. } => "edit_requested",
            WorkflowEventKind::RetryStarted { .. } => "retry_started",
            WorkflowEventKind::RetryExhausted { .. } => "retry_exhausted",
            WorkflowEventKind::DispatchFailed { .. } => "dispatch_failed",
            WorkflowEventKind::OutputRecorded { .. } => "output_recorded",
            WorkflowEventKind::QaRecorded { .. } => "qa_recorded",
            WorkflowEventKind::UnitApproved { .. } => "unit_approved",
            WorkflowEventKind::EnabledChanged { .. } => "enabled_changed",
            WorkflowEventKind::CalibrationRecorded { .. } => "calibration_recorded",
        }
    }

    /// Unidad afectada, si el evento es por unidad.
    pub fn asset_id(&self) -> Option<Uuid> {
        match self {
            WorkflowEventKind::GenerationDispatched { asset_id, .. }
            | WorkflowEventKind::AssetRejected { asset_id, .. }
            | WorkflowEventKind::EditRequested { asset_id, .. }
            | WorkflowEventKind::RetryStarted { asset_id, .. }
            | WorkflowEventKind::RetryExhausted { asset_id, .. }
            | WorkflowEventKind::DispatchFailed { asset_id, .. }
            | WorkflowEventKind::OutputRecorded { asset_id, .. }
            | WorkflowEventKind::QaRecorded { asset_id, .. }
            | WorkflowEventKind::UnitApproved { asset_id, .. } => Some(*asset_id),
            _ => None,
        }
    }
}
