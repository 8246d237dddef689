//! Implementaciones Postgres (Diesel) de los contratos de almacenamiento del
//! core, con la misma semántica que los repositorios en memoria:
//! - escrituras de workflow/unidad condicionadas por `version`;
//! - alta de unidades idempotente por clave (`ON CONFLICT DO NOTHING`);
//! - log de eventos append-only ordenado por `seq` (BIGSERIAL);
//! - contadores de calibración con upsert atómico.

use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::warn;

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;

mod calibration;
mod events;
mod rows;
mod workflows;

pub use calibration::PgCalibrationRepository;
pub use events::PgEventStore;
pub use workflows::PgWorkflowRepository;

pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones (pool real o uno armado en tests).
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError>;
}

#[derive(Clone)]
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<PgPooledConnection, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| pool_error("checking out connection", e))
    }
}

const RETRY_DELAYS_MS: [u64; 3] = [15, 30, 45];

/// Reintento con backoff corto para errores transitorios. Sólo repite la
/// unidad de trabajo provista por `f`.
pub(crate) fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    for delay in RETRY_DELAYS_MS {
        match f() {
            Err(e) if e.is_retryable() => {
                warn!("transient storage error, retrying in {delay}ms: {e}");
                std::thread::sleep(std::time::Duration::from_millis(delay));
            }
            done => return done,
        }
    }
    f()
}

fn pool_error(stage: &str, e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::TransientIo(format!("{stage}: {e}"))
}

/// Construye el pool r2d2 y corre las migraciones pendientes una vez.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let max = max_size.max(1);
    if min_size > max {
        warn!("DATABASE_MIN_CONNECTIONS ({min_size}) exceeds DATABASE_MAX_CONNECTIONS ({max}); clamping");
    }
    let pool = r2d2::Pool::builder().min_idle(Some(min_size.clamp(1, max)))
                                    .max_size(max)
                                    .build(ConnectionManager::<PgConnection>::new(database_url))
                                    .map_err(|e| pool_error("building pool", e))?;
    let mut conn = pool.get().map_err(|e| pool_error("checking out migration connection", e))?;
    run_pending_migrations(&mut conn)?;
    drop(conn);
    Ok(pool)
}

/// Carga `.env`, lee `DbConfig` y construye un pool ya migrado.
pub fn build_pool_from_env() -> Result<PgPool, PersistenceError> {
    let cfg = crate::config::DbConfig::from_env()?;
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
