// workflow.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::phase::Phase;
use crate::step_outputs::StepOutputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "2:1")]
    Equirectangular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Draft,
    Standard,
    High,
}

/// Configuración de generación de un step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    pub aspect_ratio: AspectRatio,
    pub quality: QualityTier,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self { aspect_ratio: AspectRatio::Landscape,
               quality: QualityTier::Standard }
    }
}

/// Un workflow por plano de entrada. Nunca se borra: termina en
/// `completed`/`failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub current_step: u32,
    pub phase: Phase,
    pub enabled: bool,
    #[serde(default)]
    pub step_config: BTreeMap<u32, StepConfig>,
    #[serde(default)]
    pub step_outputs: StepOutputs,
    pub last_error: Option<String>,
    /// Versión para escritura condicional (concurrencia optimista).
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(owner_id: Uuid, project_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4(),
               owner_id,
               project_id,
               current_step: 0,
               phase: Phase::Upload,
               enabled: true,
               step_config: BTreeMap::new(),
               step_outputs: StepOutputs::default(),
               last_error: None,
               version: 0,
               created_at: now,
               updated_at: now }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Configuración efectiva del step (default si no se fijó).
    pub fn config_for(&self, step: u32) -> StepConfig {
        self.step_config.get(&step).copied().unwrap_or_default()
    }
}
