//! plan-adapters: colaboradores concretos del motor.
//!
//! - `http`: clientes reqwest para Generator, análisis de rechazos y mejora
//!   de prompts.
//! - `signer`: URLs de storage con vencimiento (firma SHA-256).
//! - `stub`: colaboradores en memoria, guionados y con registro de llamadas.
pub mod config;
pub mod http;
pub mod signer;
pub mod stub;

pub use config::{ConfigError, ServiceConfig};
pub use http::{HttpGenerator, HttpPromptImprover, HttpRejectionAnalyzer};
pub use signer::StorageUrlSigner;
