//! plan-core: contrato de fases, router, guard de endpoints y contratos de
//! almacenamiento/colaboradores del motor de workflow.
pub mod collab;
pub mod constants;
pub mod contract;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod repo;

pub use collab::{AnalysisRequest, CollaboratorError, Collaborators, DispatchReceipt, GenerationMode, GenerationRequest,
                 Generator, PromptImprovementRequest, PromptImprover, RejectionAnalyzer, StageJobRequest, UrlSigner};
pub use contract::{contract, contract_fingerprint, endpoint_guard, route, route_raw, ActionType, Endpoint, EndpointGuard,
                   GuardDecision, PhaseContract, PhaseRule, RouteDecision};
pub use errors::CoreEngineError;
pub use event::{BlockedReason, EventStore, InMemoryEventStore, WorkflowEvent, WorkflowEventKind};
pub use repo::{CalibrationRepository, InMemoryCalibrationRepository, InMemoryWorkflowRepository, UnitRepository,
               WorkflowRepository};
