//! Dispatcher de acciones: Router (fase reportada) → Guard (fase persistida)
//! → handler del endpoint.
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use plan_core::{endpoint_guard, route, ActionType, CoreEngineError, Endpoint, EventStore, GenerationMode,
                StageJobRequest, UnitRepository, WorkflowRepository};
use plan_domain::{AssetType, JobType, Phase, StepOutput, UnitStatus, Workflow};

use crate::advance::AdvanceOutcome;
use crate::engine::WorkflowEngine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub workflow_id: Uuid,
    pub action: ActionType,
    pub phase_at_click: Phase,
    #[serde(default)]
    pub extra_params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusReport {
    pub phase: Phase,
    pub step: u32,
    /// Conteo de unidades por estado (vacío en steps sin unidades).
    pub units: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "endpoint", rename_all = "kebab-case")]
pub enum EndpointResponse {
    StageJobStarted {
        step: u32,
        phase: Phase,
        job_id: Option<String>,
    },
    CameraPlan {
        phase: Phase,
        cameras: u32,
        confirmed: bool,
    },
    Advanced(AdvanceOutcome),
    BatchStarted {
        asset_type: AssetType,
        phase: Phase,
        dispatched: u32,
        failed: Vec<Uuid>,
    },
    JobStatus(JobStatusReport),
    NoAction {
        phase: Phase,
    },
}

fn param_u32(payload: &Value, name: &str) -> Result<Option<u32>, CoreEngineError> {
    match payload.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(Some)
                    .ok_or_else(|| CoreEngineError::Validation(format!("{name} must be a non-negative integer"))),
    }
}

impl<R, E> WorkflowEngine<R, E>
    where R: WorkflowRepository + UnitRepository,
          E: EventStore
{
    /// Valida y ejecuta la acción pedida desde el cliente.
    pub async fn dispatch(&self, request: ActionRequest) -> Result<EndpointResponse, CoreEngineError> {
        let (endpoint, payload) =
            route(request.phase_at_click, request.action, request.workflow_id, &request.extra_params).into_result()?;
        let wf = self.repo.get_workflow(request.workflow_id)?;
        let Some(endpoint) = endpoint else {
            return Ok(EndpointResponse::NoAction { phase: wf.phase });
        };

        // Un continue viejo se responde como outdated, no como fase inválida.
        if endpoint == Endpoint::ContinueToStep {
            let from_step = param_u32(&payload, "from_step")?.unwrap_or(request.phase_at_click.step());
            if from_step < wf.current_step {
                return self.advance(wf.id, from_step).map(EndpointResponse::Advanced);
            }
        }
        endpoint_guard().check(endpoint, wf.phase)?;

        match endpoint {
            Endpoint::RunSpaceAnalysis | Endpoint::RunTopDown3d | Endpoint::RunStyle | Endpoint::RunDetectSpaces => {
                self.start_stage_job(&wf, payload).await
            }
            Endpoint::ConfirmCameraPlan => self.confirm_camera_plan(&wf, &payload),
            Endpoint::ContinueToStep => {
                let from_step = param_u32(&payload, "from_step")?.unwrap_or(wf.current_step);
                self.advance(wf.id, from_step).map(EndpointResponse::Advanced)
            }
            Endpoint::RunBatchRenders | Endpoint::RunBatchPanoramas | Endpoint::RunBatchMerge => {
                self.run_batch(&wf).await
            }
            Endpoint::JobStatus => self.job_status(&wf).map(EndpointResponse::JobStatus),
            Endpoint::RejectAsset | Endpoint::RecordResult | Endpoint::ApproveAsset => {
                Err(CoreEngineError::Validation(format!("endpoint {endpoint} is not routed from actions")))
            }
        }
    }

    fn ensure_enabled(&self, wf: &Workflow) -> Result<(), CoreEngineError> {
        if wf.enabled {
            Ok(())
        } else {
            Err(CoreEngineError::WorkflowPaused(wf.id))
        }
    }

    async fn start_stage_job(&self, wf: &Workflow, params: Value) -> Result<EndpointResponse, CoreEngineError> {
        self.ensure_enabled(wf)?;
        let step = wf.phase.step();
        let running = Phase::running_for_step(step)
            .ok_or_else(|| CoreEngineError::Internal(format!("no running phase for step {step}")))?;
        let request = StageJobRequest { correlation_id: Uuid::new_v4(),
                                        workflow_id: wf.id,
                                        step,
                                        config: wf.config_for(step),
                                        params };
        match self.collaborators.generator.start_stage_job(&request).await {
            Ok(receipt) => {
                let saved = self.move_phase(wf, running, step)?;
                Ok(EndpointResponse::StageJobStarted { step,
                                                       phase: saved.phase,
                                                       job_id: receipt.job_id })
            }
            Err(e) => {
                let message = e.to_string();
                error!("stage job for step {step} of {} failed: {message}", wf.id);
                let mut next = wf.clone();
                next.last_error = Some(message.clone());
                self.repo.update_workflow(&next, wf.version)?;
                Err(CoreEngineError::GenerationDispatch { asset_id: wf.id,
                                                          message })
            }
        }
    }

    fn confirm_camera_plan(&self, wf: &Workflow, payload: &Value) -> Result<EndpointResponse, CoreEngineError> {
        let confirmed = payload.get("confirmed").and_then(Value::as_bool).unwrap_or(true);
        let cameras = match param_u32(payload, "cameras")? {
            Some(n) => n,
            None => {
                self.active_spaces(wf.id)?.len() as u32 * AssetType::Render.units_per_space() as u32
            }
        };
        if cameras == 0 {
            return Err(CoreEngineError::Validation("camera plan has no cameras".into()));
        }
        let phase = if confirmed { Phase::CameraPlanConfirmed } else { Phase::CameraPlanPending };
        let mut next = wf.clone();
        next.step_outputs.record(StepOutput::CameraPlan { cameras, confirmed });
        let saved = self.move_phase(&next, phase, wf.current_step)?;
        Ok(EndpointResponse::CameraPlan { phase: saved.phase,
                                          cameras,
                                          confirmed })
    }

    /// Despacha todas las unidades pendientes del step y pasa a la fase de
    /// ejecución. Los fallos de despacho quedan en la respuesta.
    async fn run_batch(&self, wf: &Workflow) -> Result<EndpointResponse, CoreEngineError> {
        self.ensure_enabled(wf)?;
        let step = wf.phase.step();
        let asset_type = AssetType::for_step(step)
            .ok_or_else(|| CoreEngineError::Internal(format!("step {step} has no generation units")))?;
        let spaces = self.active_spaces(wf.id)?;
        let pending: Vec<_> = self.active_units(wf.id, asset_type, &spaces)?
                                  .into_iter()
                                  .filter(|u| matches!(u.status, UnitStatus::Pending | UnitStatus::Planned))
                                  .collect();
        if pending.is_empty() {
            return Err(CoreEngineError::Validation(format!("no pending {asset_type} units to run")));
        }
        let running = Phase::running_for_step(step)
            .ok_or_else(|| CoreEngineError::Internal(format!("no running phase for step {step}")))?;
        let mut next = wf.clone();
        next.step_outputs.record(StepOutput::Batch { asset_type,
                                                     created: pending.len() as u32 });
        let saved_wf = self.move_phase(&next, running, step)?;

        let mut dispatched = 0u32;
        let mut failed = Vec::new();
        for unit in pending {
            let correlation_id = Uuid::new_v4();
            let mut claimed = unit.clone();
            claimed.status = UnitStatus::Running;
            claimed.job_type = JobType::Generate;
            claimed.last_dispatch_id = Some(correlation_id);
            claimed.last_error = None;
            let saved = self.repo.update_unit(&claimed, unit.version)?;
            let request = self.generation_request(&saved_wf, &saved, correlation_id, GenerationMode::Initial);
            match self.dispatch_unit(saved, request).await {
                Ok(_) => dispatched += 1,
                Err(CoreEngineError::GenerationDispatch { asset_id, .. }) => failed.push(asset_id),
                Err(e) => return Err(e),
            }
        }
        info!("batch {asset_type} for {}: {dispatched} dispatched, {} failed", wf.id, failed.len());
        Ok(EndpointResponse::BatchStarted { asset_type,
                                            phase: saved_wf.phase,
                                            dispatched,
                                            failed })
    }

    /// Estado de solo lectura del job en curso.
    pub fn job_status(&self, wf: &Workflow) -> Result<JobStatusReport, CoreEngineError> {
        let step = wf.phase.step();
        let mut units = BTreeMap::new();
        if let Some(asset_type) = AssetType::for_step(step) {
            for unit in self.repo.list_units(wf.id, asset_type)? {
                *units.entry(unit.status.as_str().to_string()).or_insert(0) += 1;
            }
        }
        Ok(JobStatusReport { phase: wf.phase,
                             step,
                             units })
    }
}
