//! PlanFlow
//!
//! Motor de workflow por etapas para convertir un plano en renders,
//! panoramas y un recorrido 360 final, con aprobación humana por etapa y
//! reintentos con aprendizaje acotado.
//!
//! - `config`: configuración de servicios y base de datos desde `.env`.
//! - `errors`: errores de arranque (`CoreError`).
//! - `runtime`: armado del motor sobre Postgres o memoria.
//!
//! El resto de la superficie pública se re-exporta de los crates miembro.

pub mod config;
pub mod errors;
pub mod runtime;

pub use config::AppConfig;
pub use errors::CoreError;
pub use runtime::{http_collaborators, in_memory, postgres, MemoryRuntime, PgRuntime, Runtime};

pub use plan_core::{contract, contract_fingerprint, endpoint_guard, route, ActionType, CoreEngineError, Endpoint};
pub use plan_domain::{AssetType, GenerationUnit, Phase, Space, Workflow};
pub use plan_engine::{ActionRequest, AdvanceOutcome, CalibrationVote, EndpointResponse, GenerationResult, RejectOutcome,
                      RejectRequest, SpaceDraft, WorkflowEngine};
