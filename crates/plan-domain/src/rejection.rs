// rejection.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quality::QualityReport;
use crate::retry_patch::RetryPatch;

/// Resultado estructurado del servicio de análisis de rechazos.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RejectionAnalysis {
    #[serde(default)]
    pub failure_categories: Vec<String>,
    #[serde(default)]
    pub root_cause_summary: Option<String>,
    #[serde(default)]
    pub constraints_to_add: Vec<String>,
    #[serde(default)]
    pub constraints_to_remove: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Camino tomado al procesar un rechazo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPath {
    FullRetry,
    TargetedEdit,
    Exhausted,
}

/// Registro inmutable agregado al historial de la unidad en cada rechazo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionEvent {
    /// Intento al que corresponde el rechazo (el nuevo intento en un retry,
    /// el intento vigente en edición o agotamiento).
    pub attempt: u32,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub path: RejectionPath,
    pub analysis: Option<RejectionAnalysis>,
    pub retry_patch: Option<RetryPatch>,
    pub learning_applied: bool,
    /// Snapshot del reporte de QA vigente al momento del rechazo.
    pub qa_snapshot: Option<QualityReport>,
    pub rejected_at: DateTime<Utc>,
}
