// phase.rs
//! Enum persistido de fases del workflow.
//!
//! Los valores en texto (`as_str`) son el contrato estable con la base de
//! datos y con los clientes: agregar una fase exige actualizar a la vez el
//! contrato de fases y el guard de endpoints (ver `plan-core`).
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Paso terminal: un workflow en `completed`/`failed` queda en este step.
pub const FINAL_STEP: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "upload")]
    Upload,
    #[serde(rename = "space_analysis_pending")]
    SpaceAnalysisPending,
    #[serde(rename = "space_analysis_running")]
    SpaceAnalysisRunning,
    #[serde(rename = "space_analysis_complete")]
    SpaceAnalysisComplete,
    #[serde(rename = "top_down_3d_pending")]
    TopDown3dPending,
    #[serde(rename = "top_down_3d_running")]
    TopDown3dRunning,
    #[serde(rename = "top_down_3d_review")]
    TopDown3dReview,
    #[serde(rename = "style_pending")]
    StylePending,
    #[serde(rename = "style_running")]
    StyleRunning,
    #[serde(rename = "style_review")]
    StyleReview,
    #[serde(rename = "detect_spaces_pending")]
    DetectSpacesPending,
    #[serde(rename = "detecting_spaces")]
    DetectingSpaces,
    #[serde(rename = "spaces_detected")]
    SpacesDetected,
    #[serde(rename = "camera_plan_pending")]
    CameraPlanPending,
    #[serde(rename = "camera_plan_confirmed")]
    CameraPlanConfirmed,
    #[serde(rename = "renders_pending")]
    RendersPending,
    #[serde(rename = "renders_in_progress")]
    RendersInProgress,
    #[serde(rename = "renders_review")]
    RendersReview,
    #[serde(rename = "panoramas_pending")]
    PanoramasPending,
    #[serde(rename = "panoramas_in_progress")]
    PanoramasInProgress,
    #[serde(rename = "panoramas_review")]
    PanoramasReview,
    #[serde(rename = "merging_pending")]
    MergingPending,
    #[serde(rename = "merging_in_progress")]
    MergingInProgress,
    #[serde(rename = "merging_review")]
    MergingReview,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl Phase {
    /// Todas las fases, en orden de avance.
    pub const ALL: [Phase; 26] = [Phase::Upload,
                                  Phase::SpaceAnalysisPending,
                                  Phase::SpaceAnalysisRunning,
                                  Phase::SpaceAnalysisComplete,
                                  Phase::TopDown3dPending,
                                  Phase::TopDown3dRunning,
                                  Phase::TopDown3dReview,
                                  Phase::StylePending,
                                  Phase::StyleRunning,
                                  Phase::StyleReview,
                                  Phase::DetectSpacesPending,
                                  Phase::DetectingSpaces,
                                  Phase::SpacesDetected,
                                  Phase::CameraPlanPending,
                                  Phase::CameraPlanConfirmed,
                                  Phase::RendersPending,
                                  Phase::RendersInProgress,
                                  Phase::RendersReview,
                                  Phase::PanoramasPending,
                                  Phase::PanoramasInProgress,
                                  Phase::PanoramasReview,
                                  Phase::MergingPending,
                                  Phase::MergingInProgress,
                                  Phase::MergingReview,
                                  Phase::Completed,
                                  Phase::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Upload => "upload",
            Phase::SpaceAnalysisPending => "space_analysis_pending",
            Phase::SpaceAnalysisRunning => "space_analysis_running",
            Phase::SpaceAnalysisComplete => "space_analysis_complete",
            Phase::TopDown3dPending => "top_down_3d_pending",
            Phase::TopDown3dRunning => "top_down_3d_running",
            Phase::TopDown3dReview => "top_down_3d_review",
            Phase::StylePending => "style_pending",
            Phase::StyleRunning => "style_running",
            Phase::StyleReview => "style_review",
            Phase::DetectSpacesPending => "detect_spaces_pending",
            Phase::DetectingSpaces => "detecting_spaces",
            Phase::SpacesDetected => "spaces_detected",
            Phase::CameraPlanPending => "camera_plan_pending",
            Phase::CameraPlanConfirmed => "camera_plan_confirmed",
            Phase::RendersPending => "renders_pending",
            Phase::RendersInProgress => "renders_in_progress",
            Phase::RendersReview => "renders_review",
            Phase::PanoramasPending => "panoramas_pending",
            Phase::PanoramasInProgress => "panoramas_in_progress",
            Phase::PanoramasReview => "panoramas_review",
            Phase::MergingPending => "merging_pending",
            Phase::MergingInProgress => "merging_in_progress",
            Phase::MergingReview => "merging_review",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }

    /// Step al que pertenece la fase.
    pub fn step(&self) -> u32 {
        match self {
            Phase::Upload | Phase::SpaceAnalysisPending | Phase::SpaceAnalysisRunning | Phase::SpaceAnalysisComplete => 0,
            Phase::TopDown3dPending | Phase::TopDown3dRunning | Phase::TopDown3dReview => 1,
            Phase::StylePending | Phase::StyleRunning | Phase::StyleReview => 2,
            Phase::DetectSpacesPending
            | Phase::DetectingSpaces
            | Phase::SpacesDetected
            | Phase::CameraPlanPending
            | Phase::CameraPlanConfirmed => 3,
            Phase::RendersPending | Phase::RendersInProgress | Phase::RendersReview => 4,
            Phase::PanoramasPending | Phase::PanoramasInProgress | Phase::PanoramasReview => 5,
            Phase::MergingPending | Phase::MergingInProgress | Phase::MergingReview => 6,
            Phase::Completed | Phase::Failed => FINAL_STEP,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }

    /// Fases en las que hay un job externo en vuelo.
    pub fn is_running(&self) -> bool {
        matches!(self,
                 Phase::SpaceAnalysisRunning
                 | Phase::TopDown3dRunning
                 | Phase::StyleRunning
                 | Phase::DetectingSpaces
                 | Phase::RendersInProgress
                 | Phase::PanoramasInProgress
                 | Phase::MergingInProgress)
    }

    /// Fase de entrada de un step (la que fija el Stage Advancer al avanzar).
    pub fn entry_for_step(step: u32) -> Option<Phase> {
        match step {
            0 => Some(Phase::SpaceAnalysisPending),
            1 => Some(Phase::TopDown3dPending),
            2 => Some(Phase::StylePending),
            3 => Some(Phase::DetectSpacesPending),
            4 => Some(Phase::RendersPending),
            5 => Some(Phase::PanoramasPending),
            6 => Some(Phase::MergingPending),
            FINAL_STEP => Some(Phase::Completed),
            _ => None,
        }
    }

    /// Fase de ejecución de un step con trabajo externo.
    pub fn running_for_step(step: u32) -> Option<Phase> {
        match step {
            0 => Some(Phase::SpaceAnalysisRunning),
            1 => Some(Phase::TopDown3dRunning),
            2 => Some(Phase::StyleRunning),
            3 => Some(Phase::DetectingSpaces),
            4 => Some(Phase::RendersInProgress),
            5 => Some(Phase::PanoramasInProgress),
            6 => Some(Phase::MergingInProgress),
            _ => None,
        }
    }

    /// Fase de revisión a la que se llega cuando el job del step termina.
    pub fn review_for_step(step: u32) -> Option<Phase> {
        match step {
            0 => Some(Phase::SpaceAnalysisComplete),
            1 => Some(Phase::TopDown3dReview),
            2 => Some(Phase::StyleReview),
            3 => Some(Phase::SpacesDetected),
            4 => Some(Phase::RendersReview),
            5 => Some(Phase::PanoramasReview),
            6 => Some(Phase::MergingReview),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL.iter()
                  .copied()
                  .find(|p| p.as_str() == s)
                  .ok_or_else(|| DomainError::UnknownValue { kind: "phase", value: s.to_string() })
    }
}
