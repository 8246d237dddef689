pub mod memory;
pub mod types;

pub use memory::{InMemoryCalibrationRepository, InMemoryWorkflowRepository};
pub use types::{CalibrationRepository, UnitRepository, WorkflowRepository};
