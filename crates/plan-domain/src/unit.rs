// unit.rs
//! Unidad de generación: un asset producido por IA, atado a un espacio y a un
//! step. Los tres tipos (render, panorama, final360) comparten exactamente el
//! mismo ciclo de vida; sólo cambia `asset_type`.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::quality::{QaDecision, QualityReport};
use crate::rejection::RejectionEvent;
use crate::retry_patch::RetryPatch;
use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Render,
    Panorama,
    Final360,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [AssetType::Render, AssetType::Panorama, AssetType::Final360];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Render => "render",
            AssetType::Panorama => "panorama",
            AssetType::Final360 => "final360",
        }
    }

    /// Step que produce este tipo de asset.
    pub fn step(&self) -> u32 {
        match self {
            AssetType::Render => 4,
            AssetType::Panorama => 5,
            AssetType::Final360 => 6,
        }
    }

    /// Tipo de asset producido por un step (None para steps sin unidades).
    pub fn for_step(step: u32) -> Option<AssetType> {
        AssetType::ALL.iter().copied().find(|a| a.step() == step)
    }

    /// Slots de cámara por espacio: dos renders (A/B), un panorama por render
    /// y un único compuesto final.
    pub fn slots(&self) -> &'static [CameraSlot] {
        match self {
            AssetType::Render | AssetType::Panorama => &[CameraSlot::A, CameraSlot::B],
            AssetType::Final360 => &[CameraSlot::A],
        }
    }

    pub fn units_per_space(&self) -> usize {
        self.slots().len()
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetType::ALL.iter()
                      .copied()
                      .find(|a| a.as_str() == s)
                      .ok_or_else(|| DomainError::UnknownValue { kind: "asset_type", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CameraSlot {
    A,
    B,
}

impl CameraSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraSlot::A => "A",
            CameraSlot::B => "B",
        }
    }
}

impl FromStr for CameraSlot {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(CameraSlot::A),
            "B" => Ok(CameraSlot::B),
            other => Err(DomainError::UnknownValue { kind: "camera_slot", value: other.to_string() }),
        }
    }
}

/// Estado de una unidad de generación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Planned,
    Running,
    Retrying,
    BlockedForHuman,
    Failed,
    Completed,
    Editing,
}

impl UnitStatus {
    pub const ALL: [UnitStatus; 8] = [UnitStatus::Pending,
                                      UnitStatus::Planned,
                                      UnitStatus::Running,
                                      UnitStatus::Retrying,
                                      UnitStatus::BlockedForHuman,
                                      UnitStatus::Failed,
                                      UnitStatus::Completed,
                                      UnitStatus::Editing];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Pending => "pending",
            UnitStatus::Planned => "planned",
            UnitStatus::Running => "running",
            UnitStatus::Retrying => "retrying",
            UnitStatus::BlockedForHuman => "blocked_for_human",
            UnitStatus::Failed => "failed",
            UnitStatus::Completed => "completed",
            UnitStatus::Editing => "editing",
        }
    }

    /// Hay un job del Generator en vuelo para la unidad.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, UnitStatus::Running | UnitStatus::Retrying | UnitStatus::Editing)
    }
}

impl FromStr for UnitStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UnitStatus::ALL.iter()
                       .copied()
                       .find(|st| st.as_str() == s)
                       .ok_or_else(|| DomainError::UnknownValue { kind: "unit_status", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    Pending,
    Approved,
    Rejected,
}

impl QaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QaStatus::Pending => "pending",
            QaStatus::Approved => "approved",
            QaStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for QaStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QaStatus::Pending),
            "approved" => Ok(QaStatus::Approved),
            "rejected" => Ok(QaStatus::Rejected),
            other => Err(DomainError::UnknownValue { kind: "qa_status", value: other.to_string() }),
        }
    }
}

impl From<QaDecision> for QaStatus {
    fn from(d: QaDecision) -> Self {
        match d {
            QaDecision::Approved => QaStatus::Approved,
            QaDecision::Rejected => QaStatus::Rejected,
        }
    }
}

/// Tipo de job solicitado al Generator para la unidad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Generate,
    Retry,
    EditInpaint,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Generate => "generate",
            JobType::Retry => "retry",
            JobType::EditInpaint => "edit_inpaint",
        }
    }
}

impl FromStr for JobType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(JobType::Generate),
            "retry" => Ok(JobType::Retry),
            "edit_inpaint" => Ok(JobType::EditInpaint),
            other => Err(DomainError::UnknownValue { kind: "job_type", value: other.to_string() }),
        }
    }
}

/// Clave lógica de una unidad dentro de un workflow (espacio × tipo × slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub space_id: Uuid,
    pub asset_type: AssetType,
    pub slot: CameraSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationUnit {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub space_id: Uuid,
    pub asset_type: AssetType,
    pub slot: CameraSlot,
    pub status: UnitStatus,
    pub job_type: JobType,
    /// No decreciente; acotado por el presupuesto de reintentos.
    pub attempt_count: u32,
    pub locked_approved: bool,
    pub qa_status: QaStatus,
    /// Decisión de QA previa a un rechazo con edición dirigida.
    pub pre_rejection_qa_status: Option<QaStatus>,
    pub qa_report: Option<QualityReport>,
    pub prompt_text: Option<String>,
    pub output_ref: Option<String>,
    pub edit_source_ref: Option<String>,
    pub correction_text: Option<String>,
    pub seed: Option<u32>,
    pub retry_patch: Option<RetryPatch>,
    /// Historial completo de rechazos; nunca se trunca.
    pub rejection_history: Vec<RejectionEvent>,
    pub last_dispatch_id: Option<Uuid>,
    pub last_error: Option<String>,
    /// Versión para escritura condicional (concurrencia optimista).
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationUnit {
    pub fn new(workflow_id: Uuid, key: UnitKey) -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(),
               workflow_id,
               space_id: key.space_id,
               asset_type: key.asset_type,
               slot: key.slot,
               status: UnitStatus::Pending,
               job_type: JobType::Generate,
               attempt_count: 0,
               locked_approved: false,
               qa_status: QaStatus::Pending,
               pre_rejection_qa_status: None,
               qa_report: None,
               prompt_text: None,
               output_ref: None,
               edit_source_ref: None,
               correction_text: None,
               seed: None,
               retry_patch: None,
               rejection_history: Vec::new(),
               last_dispatch_id: None,
               last_error: None,
               version: 0,
               created_at: now,
               updated_at: now }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey { space_id: self.space_id,
                  asset_type: self.asset_type,
                  slot: self.slot }
    }

    /// Última decisión del QA automático. Sólo cuenta el reporte: `qa_status`
    /// también lo fija la aprobación humana, que llega como post-aprobación.
    pub fn was_ai_approved(&self) -> bool {
        self.qa_report
            .as_ref()
            .map(|report| report.decision() == QaDecision::Approved)
            .unwrap_or(false)
    }

    pub fn has_output(&self) -> bool {
        self.output_ref.as_deref().map(|o| !o.trim().is_empty()).unwrap_or(false)
    }
}
