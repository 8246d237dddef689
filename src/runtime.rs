//! Armado del motor: colaboradores HTTP + repositorios (Postgres o memoria).
use log::info;
use std::sync::Arc;

use plan_adapters::{HttpGenerator, HttpPromptImprover, HttpRejectionAnalyzer, ServiceConfig, StorageUrlSigner};
use plan_core::constants::CONTRACT_VERSION;
use plan_core::{contract_fingerprint, CalibrationRepository, Collaborators, EventStore, InMemoryCalibrationRepository,
                InMemoryEventStore, InMemoryWorkflowRepository, UnitRepository, WorkflowRepository};
use plan_engine::{CalibrationService, WorkflowEngine};
use plan_persistence::{build_pool, DbConfig, PgCalibrationRepository, PgEventStore, PgWorkflowRepository, PoolProvider};

use crate::errors::CoreError;

/// Motor y servicio de calibración compartiendo el mismo log de eventos.
pub struct Runtime<R, E, C>
    where R: WorkflowRepository + UnitRepository,
          E: EventStore,
          C: CalibrationRepository
{
    pub engine: WorkflowEngine<R, E>,
    pub calibration: CalibrationService<C, E>,
}

pub type MemoryRuntime = Runtime<InMemoryWorkflowRepository, InMemoryEventStore, InMemoryCalibrationRepository>;
pub type PgRuntime =
    Runtime<PgWorkflowRepository<PoolProvider>, PgEventStore<PoolProvider>, PgCalibrationRepository<PoolProvider>>;

/// Clientes HTTP de los tres servicios externos y el firmador de URLs.
pub fn http_collaborators(cfg: &ServiceConfig) -> Result<Collaborators, CoreError> {
    let signer = StorageUrlSigner::new(cfg.storage_base_url.clone(),
                                       cfg.storage_signing_secret.clone(),
                                       cfg.storage_url_ttl);
    Ok(Collaborators { generator: Arc::new(HttpGenerator::from_config(cfg)?),
                       analyzer: Arc::new(HttpRejectionAnalyzer::from_config(cfg)?),
                       prompts: Arc::new(HttpPromptImprover::from_config(cfg)?),
                       signer: Some(Arc::new(signer)) })
}

pub fn in_memory(collaborators: Collaborators) -> MemoryRuntime {
    let events = Arc::new(InMemoryEventStore::new());
    info!("runtime: in-memory storage, contract {CONTRACT_VERSION} ({})", contract_fingerprint());
    Runtime { engine: WorkflowEngine::new(Arc::new(InMemoryWorkflowRepository::new()), events.clone(), collaborators),
              calibration: CalibrationService::new(Arc::new(InMemoryCalibrationRepository::new()), events) }
}

pub fn postgres(db: &DbConfig, collaborators: Collaborators) -> Result<PgRuntime, CoreError> {
    let pool = build_pool(&db.url, db.min_connections, db.max_connections)?;
    let provider = || PoolProvider { pool: pool.clone() };
    let events = Arc::new(PgEventStore::new(provider()));
    info!("runtime: postgres storage (pool {}..{}), contract {CONTRACT_VERSION} ({})",
          db.min_connections,
          db.max_connections,
          contract_fingerprint());
    Ok(Runtime { engine: WorkflowEngine::new(Arc::new(PgWorkflowRepository::new(provider())), events.clone(), collaborators),
                 calibration: CalibrationService::new(Arc::new(PgCalibrationRepository::new(provider())), events) })
}
