//! `WorkflowEngine`: estado compartido de los handlers.
//!
//! Cada operación es una request independiente: lee, decide y escribe con
//! escritura condicional por versión. No hay colas ni workers internos.
use log::{error, info};
use std::sync::Arc;
use uuid::Uuid;

use plan_core::{Collaborators, CoreEngineError, DispatchReceipt, EventStore, GenerationRequest, UnitRepository,
                WorkflowEventKind, WorkflowRepository};
use plan_domain::{AssetType, GenerationUnit, Phase, Space, UnitStatus, Workflow};
use plan_policies::BoundedPatchPolicy;

pub struct WorkflowEngine<R, E>
    where R: WorkflowRepository + UnitRepository,
          E: EventStore
{
    pub(crate) repo: Arc<R>,
    pub(crate) events: Arc<E>,
    pub(crate) collaborators: Collaborators,
    pub(crate) patch_policy: BoundedPatchPolicy,
}

impl<R, E> WorkflowEngine<R, E>
    where R: WorkflowRepository + UnitRepository,
          E: EventStore
{
    pub fn new(repo: Arc<R>, events: Arc<E>, collaborators: Collaborators) -> Self {
        Self { repo,
               events,
               collaborators,
               patch_policy: BoundedPatchPolicy::default() }
    }

    pub fn with_patch_policy(mut self, policy: BoundedPatchPolicy) -> Self {
        self.patch_policy = policy;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn event_store(&self) -> &E {
        &self.events
    }

    /// Alta de un workflow nuevo (fase `upload`).
    pub fn create_workflow(&self, owner_id: Uuid, project_id: Uuid) -> Result<Workflow, CoreEngineError> {
        let wf = Workflow::new(owner_id, project_id);
        self.repo.insert_workflow(&wf)?;
        info!("workflow {} created for project {}", wf.id, project_id);
        Ok(wf)
    }

    pub fn workflow(&self, id: Uuid) -> Result<Workflow, CoreEngineError> {
        self.repo.get_workflow(id)
    }

    pub fn unit(&self, id: Uuid) -> Result<GenerationUnit, CoreEngineError> {
        self.repo.get_unit(id)
    }

    pub(crate) fn emit(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<(), CoreEngineError> {
        self.events.append_kind(workflow_id, kind).map(|_| ())
    }

    pub(crate) fn active_spaces(&self, workflow_id: Uuid) -> Result<Vec<Space>, CoreEngineError> {
        Ok(self.repo
               .list_spaces(workflow_id)?
               .into_iter()
               .filter(Space::is_active)
               .collect())
    }

    /// Persiste la fase (y el step) con escritura condicional.
    pub(crate) fn move_phase(&self, wf: &Workflow, to: Phase, step: u32) -> Result<Workflow, CoreEngineError> {
        let mut next = wf.clone();
        next.phase = to;
        next.current_step = step;
        let saved = self.repo.update_workflow(&next, wf.version)?;
        if wf.phase != to {
            info!("workflow {}: {} -> {}", wf.id, wf.phase, to);
            self.emit(wf.id,
                      WorkflowEventKind::PhaseChanged { from: wf.phase,
                                                        to,
                                                        step })?;
        }
        Ok(saved)
    }

    /// Despacha al Generator. Un fallo deja la unidad en `failed` con el
    /// error persistido y se devuelve `GenerationDispatch`; no se reintenta.
    pub(crate) async fn dispatch_unit(&self, unit: GenerationUnit, request: GenerationRequest)
                                      -> Result<DispatchReceipt, CoreEngineError> {
        match self.collaborators.generator.generate(&request).await {
            Ok(receipt) => {
                self.emit(unit.workflow_id,
                          WorkflowEventKind::GenerationDispatched { asset_id: unit.id,
                                                                    job_type: unit.job_type,
                                                                    attempt: unit.attempt_count,
                                                                    correlation_id: request.correlation_id })?;
                Ok(receipt)
            }
            Err(e) => {
                let message = e.to_string();
                error!("dispatch failed for {} {} (attempt {}): {}",
                       unit.asset_type, unit.id, unit.attempt_count, message);
                let mut failed = unit.clone();
                failed.status = UnitStatus::Failed;
                failed.last_error = Some(message.clone());
                self.repo.update_unit(&failed, unit.version)?;
                self.emit(unit.workflow_id,
                          WorkflowEventKind::DispatchFailed { asset_id: unit.id,
                                                              error: message.clone() })?;
                Err(CoreEngineError::GenerationDispatch { asset_id: unit.id,
                                                          message })
            }
        }
    }

    pub(crate) fn generation_request(&self, wf: &Workflow, unit: &GenerationUnit, correlation_id: Uuid,
                                     mode: plan_core::GenerationMode)
                                     -> GenerationRequest {
        GenerationRequest { correlation_id,
                            workflow_id: wf.id,
                            asset_id: unit.id,
                            asset_type: unit.asset_type,
                            space_id: unit.space_id,
                            slot: unit.slot,
                            prompt: unit.prompt_text.clone(),
                            config: wf.config_for(unit.asset_type.step()),
                            mode }
    }

    /// Unidades de `asset_type` cuyo espacio sigue activo.
    pub(crate) fn active_units(&self, workflow_id: Uuid, asset_type: AssetType, spaces: &[Space])
                               -> Result<Vec<GenerationUnit>, CoreEngineError> {
        Ok(self.repo
               .list_units(workflow_id, asset_type)?
               .into_iter()
               .filter(|u| spaces.iter().any(|s| s.id == u.space_id))
               .collect())
    }
}
