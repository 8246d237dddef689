// plan-domain library entry point
pub mod calibration;
pub mod error;
pub mod phase;
pub mod quality;
pub mod rejection;
pub mod retry_patch;
pub mod space;
pub mod step_outputs;
pub mod unit;
pub mod workflow;

pub use calibration::{CalibrationKey, CalibrationOutcome, CalibrationStat, HumanVote};
pub use error::DomainError;
pub use phase::{Phase, FINAL_STEP};
pub use quality::{QaDecision, QaIssue, QualityReport, QualityReportV1, Severity};
pub use rejection::{RejectionAnalysis, RejectionEvent, RejectionPath};
pub use retry_patch::{FailureCategory, PatchEntry, PatchKey, RetryPatch};
pub use space::Space;
pub use step_outputs::{StepOutput, StepOutputs};
pub use unit::{AssetType, CameraSlot, GenerationUnit, JobType, QaStatus, UnitKey, UnitStatus};
pub use workflow::{AspectRatio, QualityTier, StepConfig, Workflow};
