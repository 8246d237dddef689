//! plan-engine: Stage Advancer, motor de rechazos/reintentos, calibración,
//! dispatcher de endpoints e ingesta de resultados de generación.
pub mod advance;
pub mod calibration;
pub mod dispatch;
pub mod engine;
pub mod ingest;
pub mod reject;

pub use advance::AdvanceOutcome;
pub use calibration::{CalibrationRecord, CalibrationService, CalibrationVote};
pub use dispatch::{ActionRequest, EndpointResponse, JobStatusReport};
pub use engine::WorkflowEngine;
pub use ingest::{GenerationResult, SpaceDraft};
pub use reject::{RejectOutcome, RejectRequest};
