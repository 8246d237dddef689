//! Contrato de fases, router y guard de endpoints.
//!
//! El router valida contra la fase que reporta el cliente; el guard vuelve a
//! validar contra la fase persistida al momento de ejecutar. Ambas tablas son
//! estáticas de proceso (`Lazy`) y se versionan juntas vía
//! `contract_fingerprint()`.
pub mod guard;
pub mod router;
pub mod table;

pub use guard::{endpoint_guard, EndpointGuard, GuardDecision};
pub use router::{route, route_raw, RouteDecision};
pub use table::{contract, contract_fingerprint, ActionType, Endpoint, PhaseContract, PhaseRule};
