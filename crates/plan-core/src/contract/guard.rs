//! Guard de endpoints: cada endpoint declara el conjunto cerrado de fases
//! persistidas sobre las que puede actuar.
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use plan_domain::Phase;

use super::table::Endpoint;
use crate::errors::CoreEngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardDecision {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

const STEP_4_TO_6: &[Phase] = &[Phase::RendersPending,
                                Phase::RendersInProgress,
                                Phase::RendersReview,
                                Phase::PanoramasPending,
                                Phase::PanoramasInProgress,
                                Phase::PanoramasReview,
                                Phase::MergingPending,
                                Phase::MergingInProgress,
                                Phase::MergingReview];

fn allowed_phases(endpoint: Endpoint) -> &'static [Phase] {
    match endpoint {
        Endpoint::RunSpaceAnalysis => &[Phase::Upload, Phase::SpaceAnalysisPending],
        Endpoint::RunTopDown3d => &[Phase::TopDown3dPending],
        Endpoint::RunStyle => &[Phase::StylePending],
        Endpoint::RunDetectSpaces => &[Phase::DetectSpacesPending],
        Endpoint::ConfirmCameraPlan => &[Phase::SpacesDetected, Phase::CameraPlanPending],
        Endpoint::ContinueToStep => &[Phase::SpaceAnalysisComplete,
                                      Phase::TopDown3dReview,
                                      Phase::StyleReview,
                                      Phase::CameraPlanConfirmed,
                                      Phase::RendersReview,
                                      Phase::PanoramasReview,
                                      Phase::MergingReview],
        Endpoint::RunBatchRenders => &[Phase::RendersPending],
        Endpoint::RunBatchPanoramas => &[Phase::PanoramasPending],
        Endpoint::RunBatchMerge => &[Phase::MergingPending],
        Endpoint::JobStatus => &[Phase::SpaceAnalysisRunning,
                                 Phase::TopDown3dRunning,
                                 Phase::StyleRunning,
                                 Phase::DetectingSpaces,
                                 Phase::RendersInProgress,
                                 Phase::PanoramasInProgress,
                                 Phase::MergingInProgress],
        // Un rechazo post-aprobación de un render puede llegar con el
        // workflow ya en panoramas o merge.
        Endpoint::RejectAsset => &STEP_4_TO_6[1..],
        Endpoint::RecordResult | Endpoint::ApproveAsset => STEP_4_TO_6,
    }
}

pub struct EndpointGuard {
    allowed: BTreeMap<Endpoint, BTreeSet<Phase>>,
}

impl EndpointGuard {
    fn build() -> Self {
        let allowed = Endpoint::ALL.iter()
                                   .map(|e| (*e, allowed_phases(*e).iter().copied().collect()))
                                   .collect();
        Self { allowed }
    }

    pub fn allowed(&self, endpoint: Endpoint) -> impl Iterator<Item = Phase> + '_ {
        self.allowed.get(&endpoint).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn allows(&self, endpoint: Endpoint, phase: Phase) -> bool {
        self.allowed.get(&endpoint).map(|s| s.contains(&phase)).unwrap_or(false)
    }

    /// Re-valida contra la fase persistida. El error nombra el conjunto
    /// permitido y la fase real.
    pub fn validate(&self, endpoint: Endpoint, persisted_phase: Phase) -> GuardDecision {
        if self.allows(endpoint, persisted_phase) {
            return GuardDecision { valid: true, error: None };
        }
        let allowed: Vec<&str> = self.allowed(endpoint).map(|p| p.as_str()).collect();
        GuardDecision { valid: false,
                        error: Some(format!("endpoint {} allows phases [{}] but workflow is in phase {}",
                                            endpoint,
                                            allowed.join(", "),
                                            persisted_phase)) }
    }

    pub fn check(&self, endpoint: Endpoint, persisted_phase: Phase) -> Result<(), CoreEngineError> {
        let decision = self.validate(endpoint, persisted_phase);
        match decision.error {
            Some(err) => Err(CoreEngineError::Validation(err)),
            None => Ok(()),
        }
    }
}

static ENDPOINT_GUARD: Lazy<EndpointGuard> = Lazy::new(EndpointGuard::build);

pub fn endpoint_guard() -> &'static EndpointGuard {
    &ENDPOINT_GUARD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_reports_allowed_set_and_actual_phase() {
        let d = endpoint_guard().validate(Endpoint::RunBatchRenders, Phase::RendersReview);
        assert!(!d.valid);
        let err = d.error.unwrap();
        assert!(err.contains("[renders_pending]"));
        assert!(err.contains("renders_review"));
    }

    #[test]
    fn reject_is_allowed_after_step_four_started() {
        let g = endpoint_guard();
        assert!(!g.allows(Endpoint::RejectAsset, Phase::RendersPending));
        assert!(g.allows(Endpoint::RejectAsset, Phase::RendersReview));
        assert!(g.allows(Endpoint::RejectAsset, Phase::PanoramasInProgress));
        assert!(!g.allows(Endpoint::RejectAsset, Phase::Completed));
        assert!(g.check(Endpoint::RejectAsset, Phase::MergingReview).is_ok());
    }
}
