//! plan-persistence
//!
//! Backend Postgres (Diesel + r2d2) de los contratos de almacenamiento de
//! `plan-core`: workflows, espacios, unidades de generación, log de eventos y
//! estadísticas de calibración.
//!
//! Módulos:
//! - `pg`: repositorios y pool.
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: configuración desde `.env` / entorno.
//! - `schema`: tablas Diesel.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_pool, build_pool_from_env, ConnectionProvider, PgCalibrationRepository, PgEventStore, PgPool,
             PgWorkflowRepository, PoolProvider};
