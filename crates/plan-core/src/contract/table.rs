use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use plan_domain::Phase;

use crate::constants::CONTRACT_VERSION;
use crate::errors::CoreEngineError;
use crate::hashing::hash_value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    RunSpaceAnalysis,
    #[serde(rename = "RUN_TOP_DOWN_3D")]
    RunTopDown3d,
    RunStyle,
    DetectSpaces,
    ConfirmCameraPlan,
    RunRenders,
    RunPanoramas,
    RunMerge,
    Continue,
    AwaitJob,
    NoAction,
}

impl ActionType {
    pub const ALL: [ActionType; 11] = [ActionType::RunSpaceAnalysis,
                                       ActionType::RunTopDown3d,
                                       ActionType::RunStyle,
                                       ActionType::DetectSpaces,
                                       ActionType::ConfirmCameraPlan,
                                       ActionType::RunRenders,
                                       ActionType::RunPanoramas,
                                       ActionType::RunMerge,
                                       ActionType::Continue,
                                       ActionType::AwaitJob,
                                       ActionType::NoAction];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::RunSpaceAnalysis => "RUN_SPACE_ANALYSIS",
            ActionType::RunTopDown3d => "RUN_TOP_DOWN_3D",
            ActionType::RunStyle => "RUN_STYLE",
            ActionType::DetectSpaces => "DETECT_SPACES",
            ActionType::ConfirmCameraPlan => "CONFIRM_CAMERA_PLAN",
            ActionType::RunRenders => "RUN_RENDERS",
            ActionType::RunPanoramas => "RUN_PANORAMAS",
            ActionType::RunMerge => "RUN_MERGE",
            ActionType::Continue => "CONTINUE",
            ActionType::AwaitJob => "AWAIT_JOB",
            ActionType::NoAction => "NO_ACTION",
        }
    }

    /// Acciones que avanzan el workflow: su payload lleva `from_step` y
    /// `from_phase` para que el endpoint re-valide.
    pub fn advances(&self) -> bool {
        matches!(self, ActionType::Continue)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = CoreEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL.iter()
                       .copied()
                       .find(|a| a.as_str() == s)
                       .ok_or_else(|| CoreEngineError::Validation(format!("unknown action type '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    RunSpaceAnalysis,
    #[serde(rename = "run-top-down-3d")]
    RunTopDown3d,
    RunStyle,
    RunDetectSpaces,
    ConfirmCameraPlan,
    ContinueToStep,
    RunBatchRenders,
    RunBatchPanoramas,
    RunBatchMerge,
    JobStatus,
    RejectAsset,
    RecordResult,
    ApproveAsset,
}

impl Endpoint {
    pub const ALL: [Endpoint; 13] = [Endpoint::RunSpaceAnalysis,
                                     Endpoint::RunTopDown3d,
                                     Endpoint::RunStyle,
                                     Endpoint::RunDetectSpaces,
                                     Endpoint::ConfirmCameraPlan,
                                     Endpoint::ContinueToStep,
                                     Endpoint::RunBatchRenders,
                                     Endpoint::RunBatchPanoramas,
                                     Endpoint::RunBatchMerge,
                                     Endpoint::JobStatus,
                                     Endpoint::RejectAsset,
                                     Endpoint::RecordResult,
                                     Endpoint::ApproveAsset];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::RunSpaceAnalysis => "run-space-analysis",
            Endpoint::RunTopDown3d => "run-top-down-3d",
            Endpoint::RunStyle => "run-style",
            Endpoint::RunDetectSpaces => "run-detect-spaces",
            Endpoint::ConfirmCameraPlan => "confirm-camera-plan",
            Endpoint::ContinueToStep => "continue-to-step",
            Endpoint::RunBatchRenders => "run-batch-renders",
            Endpoint::RunBatchPanoramas => "run-batch-panoramas",
            Endpoint::RunBatchMerge => "run-batch-merge",
            Endpoint::JobStatus => "job-status",
            Endpoint::RejectAsset => "reject-asset",
            Endpoint::RecordResult => "record-result",
            Endpoint::ApproveAsset => "approve-asset",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = CoreEngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL.iter()
                     .copied()
                     .find(|e| e.as_str() == s)
                     .ok_or_else(|| CoreEngineError::Validation(format!("unknown endpoint '{s}'")))
    }
}

/// Fila del contrato: qué acción admite la fase, qué endpoint la ejecuta y
/// con qué etiqueta se muestra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseRule {
    pub allowed_action: ActionType,
    pub endpoint: Option<Endpoint>,
    pub label: &'static str,
}

const fn rule(allowed_action: ActionType, endpoint: Option<Endpoint>, label: &'static str) -> PhaseRule {
    PhaseRule { allowed_action,
                endpoint,
                label }
}

// El match exhaustivo obliga a declarar la regla de cada fase nueva.
fn rule_for(phase: Phase) -> PhaseRule {
    use ActionType as A;
    use Endpoint as E;
    match phase {
        Phase::Upload => rule(A::RunSpaceAnalysis, Some(E::RunSpaceAnalysis), "Analyze floor plan"),
        Phase::SpaceAnalysisPending => rule(A::RunSpaceAnalysis, Some(E::RunSpaceAnalysis), "Analyze floor plan"),
        Phase::SpaceAnalysisRunning => rule(A::AwaitJob, Some(E::JobStatus), "Analyzing floor plan"),
        Phase::SpaceAnalysisComplete => rule(A::Continue, Some(E::ContinueToStep), "Continue to 3D top-down"),
        Phase::TopDown3dPending => rule(A::RunTopDown3d, Some(E::RunTopDown3d), "Generate 3D top-down"),
        Phase::TopDown3dRunning => rule(A::AwaitJob, Some(E::JobStatus), "Generating 3D top-down"),
        Phase::TopDown3dReview => rule(A::Continue, Some(E::ContinueToStep), "Continue to style"),
        Phase::StylePending => rule(A::RunStyle, Some(E::RunStyle), "Apply style"),
        Phase::StyleRunning => rule(A::AwaitJob, Some(E::JobStatus), "Applying style"),
        Phase::StyleReview => rule(A::Continue, Some(E::ContinueToStep), "Continue to space detection"),
        Phase::DetectSpacesPending => rule(A::DetectSpaces, Some(E::RunDetectSpaces), "Detect spaces"),
        Phase::DetectingSpaces => rule(A::AwaitJob, Some(E::JobStatus), "Detecting spaces"),
        Phase::SpacesDetected => rule(A::ConfirmCameraPlan, Some(E::ConfirmCameraPlan), "Plan cameras"),
        Phase::CameraPlanPending => rule(A::ConfirmCameraPlan, Some(E::ConfirmCameraPlan), "Confirm camera plan"),
        Phase::CameraPlanConfirmed => rule(A::Continue, Some(E::ContinueToStep), "Continue to renders"),
        Phase::RendersPending => rule(A::RunRenders, Some(E::RunBatchRenders), "Generate renders"),
        Phase::RendersInProgress => rule(A::AwaitJob, Some(E::JobStatus), "Generating renders"),
        Phase::RendersReview => rule(A::Continue, Some(E::ContinueToStep), "Continue to panoramas"),
        Phase::PanoramasPending => rule(A::RunPanoramas, Some(E::RunBatchPanoramas), "Generate panoramas"),
        Phase::PanoramasInProgress => rule(A::AwaitJob, Some(E::JobStatus), "Generating panoramas"),
        Phase::PanoramasReview => rule(A::Continue, Some(E::ContinueToStep), "Continue to merge"),
        Phase::MergingPending => rule(A::RunMerge, Some(E::RunBatchMerge), "Merge 360 views"),
        Phase::MergingInProgress => rule(A::AwaitJob, Some(E::JobStatus), "Merging 360 views"),
        Phase::MergingReview => rule(A::Continue, Some(E::ContinueToStep), "Complete workflow"),
        Phase::Completed => rule(A::NoAction, None, "Completed"),
        Phase::Failed => rule(A::NoAction, None, "Failed"),
    }
}

/// Tabla inmutable `phase → regla`, cargada una vez por proceso.
#[derive(Debug)]
pub struct PhaseContract {
    version: &'static str,
    rules: BTreeMap<Phase, PhaseRule>,
    fingerprint: String,
}

impl PhaseContract {
    fn build() -> Self {
        let rules: BTreeMap<Phase, PhaseRule> = Phase::ALL.iter().map(|p| (*p, rule_for(*p))).collect();
        let rows: Vec<serde_json::Value> = rules.iter()
                                                .map(|(phase, r)| {
                                                    json!({
                                                        "phase": phase.as_str(),
                                                        "action": r.allowed_action.as_str(),
                                                        "endpoint": r.endpoint.map(|e| e.as_str()),
                                                        "label": r.label,
                                                    })
                                                })
                                                .collect();
        let fingerprint = hash_value(&json!({ "version": CONTRACT_VERSION, "rules": rows }));
        Self { version: CONTRACT_VERSION,
               rules,
               fingerprint }
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn rule(&self, phase: Phase) -> PhaseRule {
        self.rules.get(&phase).copied().unwrap_or_else(|| rule_for(phase))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, PhaseRule)> + '_ {
        self.rules.iter().map(|(p, r)| (*p, *r))
    }
}

static PHASE_CONTRACT: Lazy<PhaseContract> = Lazy::new(PhaseContract::build);

pub fn contract() -> &'static PhaseContract {
    &PHASE_CONTRACT
}

/// blake3 del JSON canónico de la tabla de fases + versión.
pub fn contract_fingerprint() -> &'static str {
    PHASE_CONTRACT.fingerprint()
}
