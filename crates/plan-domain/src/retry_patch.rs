// retry_patch.rs
//! Patch acotado que acompaña a un reintento de generación.
//!
//! Sólo contiene instrucciones canónicas (una por categoría de fallo) y, como
//! mucho, un par de restricciones aprendidas cortas. Las notas libres del
//! revisor nunca se copian aquí.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Conjunto cerrado de categorías de fallo conocidas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    WrongRoom,
    ExtraFurniture,
    StructuralChange,
    FlooringMismatch,
    PerspectiveDistortion,
    SeamArtifact,
    WrongCameraDirection,
    StyleMismatch,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 8] = [FailureCategory::WrongRoom,
                                           FailureCategory::ExtraFurniture,
                                           FailureCategory::StructuralChange,
                                           FailureCategory::FlooringMismatch,
                                           FailureCategory::PerspectiveDistortion,
                                           FailureCategory::SeamArtifact,
                                           FailureCategory::WrongCameraDirection,
                                           FailureCategory::StyleMismatch];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::WrongRoom => "wrong_room",
            FailureCategory::ExtraFurniture => "extra_furniture",
            FailureCategory::StructuralChange => "structural_change",
            FailureCategory::FlooringMismatch => "flooring_mismatch",
            FailureCategory::PerspectiveDistortion => "perspective_distortion",
            FailureCategory::SeamArtifact => "seam_artifact",
            FailureCategory::WrongCameraDirection => "wrong_camera_direction",
            FailureCategory::StyleMismatch => "style_mismatch",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FailureCategory::ALL.iter()
                            .copied()
                            .find(|c| c.as_str() == s)
                            .ok_or_else(|| DomainError::UnknownValue { kind: "failure_category",
                                                                       value: s.to_string() })
    }
}

/// Clave de deduplicación de una entrada del patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PatchKey {
    Category(FailureCategory),
    /// Restricción aprendida del análisis (índice 0..n).
    Learned(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub key: PatchKey,
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPatch {
    pub entries: Vec<PatchEntry>,
    /// Pide al generador bajar la creatividad (violación estructural o de tipo de ambiente).
    pub reduce_creativity: bool,
    /// Semilla fresca para no repetir el mismo fallo de forma determinista.
    pub seed: u32,
}

impl RetryPatch {
    pub fn instructions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.instruction.as_str()).collect()
    }

    pub fn categories(&self) -> Vec<FailureCategory> {
        self.entries
            .iter()
            .filter_map(|e| match e.key {
                PatchKey::Category(c) => Some(c),
                PatchKey::Learned(_) => None,
            })
            .collect()
    }

    pub fn learned_count(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.key, PatchKey::Learned(_))).count()
    }

    pub fn contains(&self, key: &PatchKey) -> bool {
        self.entries.iter().any(|e| &e.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
