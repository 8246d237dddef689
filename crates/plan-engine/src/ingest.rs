//! Ingesta de resultados: salidas de generación, reportes de QA,
//! aprobación humana, resultados de jobs de step y banderas de espacios.
use log::{debug, info, warn};
use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plan_core::{endpoint_guard, CoreEngineError, Endpoint, EventStore, UnitRepository, WorkflowEventKind,
                WorkflowRepository};
use plan_domain::{GenerationUnit, Phase, QaStatus, QualityReport, Space, StepOutput, UnitStatus, Workflow};

use crate::engine::WorkflowEngine;

/// Resultado que devuelve el Generator para una unidad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub asset_id: Uuid,
    /// Si viene, debe coincidir con el último despacho de la unidad.
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    pub output_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceDraft {
    pub name: String,
    pub space_type: String,
}

impl<R, E> WorkflowEngine<R, E>
    where R: WorkflowRepository + UnitRepository,
          E: EventStore
{
    fn guarded_unit(&self, asset_id: Uuid, endpoint: Endpoint) -> Result<(Workflow, GenerationUnit), CoreEngineError> {
        let unit = self.repo.get_unit(asset_id)?;
        let wf = self.repo.get_workflow(unit.workflow_id)?;
        endpoint_guard().check(endpoint, wf.phase)?;
        Ok((wf, unit))
    }

    /// Guarda la salida producida. La salida previa se reemplaza recién acá,
    /// nunca antes (una edición en vuelo conserva la imagen aceptada).
    pub fn record_output(&self, result: &GenerationResult) -> Result<GenerationUnit, CoreEngineError> {
        let output_ref = result.output_ref.trim();
        if output_ref.is_empty() {
            return Err(CoreEngineError::Validation("output_ref is empty".into()));
        }
        let (wf, unit) = self.guarded_unit(result.asset_id, Endpoint::RecordResult)?;
        if let (Some(got), Some(expected)) = (result.correlation_id, unit.last_dispatch_id) {
            if got != expected {
                warn!("stale result for {}: correlation {got} != {expected}", unit.id);
                return Err(CoreEngineError::Validation(format!("stale result for {} (correlation {got})", unit.id)));
            }
        }
        let mut next = unit.clone();
        next.output_ref = Some(output_ref.to_string());
        next.status = UnitStatus::Completed;
        next.edit_source_ref = None;
        next.correction_text = None;
        next.last_error = None;
        let saved = self.repo.update_unit(&next, unit.version)?;
        self.emit(wf.id,
                  WorkflowEventKind::OutputRecorded { asset_id: saved.id,
                                                      output_ref: output_ref.to_string() })?;
        debug!("output recorded for {} {}", saved.asset_type, saved.id);
        self.enter_review_if_done(&wf, &saved)?;
        Ok(saved)
    }

    /// Cuando todas las unidades activas del step en curso terminaron, el
    /// workflow pasa a la fase de revisión del step.
    fn enter_review_if_done(&self, wf: &Workflow, unit: &GenerationUnit) -> Result<(), CoreEngineError> {
        let step = unit.asset_type.step();
        if Phase::running_for_step(step) != Some(wf.phase) {
            return Ok(());
        }
        let spaces = self.active_spaces(wf.id)?;
        let units = self.active_units(wf.id, unit.asset_type, &spaces)?;
        if units.iter().all(|u| u.status == UnitStatus::Completed) {
            if let Some(review) = Phase::review_for_step(step) {
                let current = self.repo.get_workflow(wf.id)?;
                if current.phase == wf.phase {
                    self.move_phase(&current, review, step)?;
                }
            }
        }
        Ok(())
    }

    /// Parse-then-validate del reporte de QA y registro de la decisión.
    pub fn record_qa(&self, asset_id: Uuid, raw_report: &serde_json::Value) -> Result<GenerationUnit, CoreEngineError> {
        let report = QualityReport::parse(raw_report)?;
        let (wf, unit) = self.guarded_unit(asset_id, Endpoint::RecordResult)?;
        let decision = report.decision();
        let mut next = unit.clone();
        next.qa_status = QaStatus::from(decision);
        next.qa_report = Some(report);
        next.pre_rejection_qa_status = None;
        let saved = self.repo.update_unit(&next, unit.version)?;
        self.emit(wf.id,
                  WorkflowEventKind::QaRecorded { asset_id: saved.id,
                                                  decision })?;
        Ok(saved)
    }

    /// Aprobación humana: fija `locked_approved`.
    pub fn approve(&self, asset_id: Uuid) -> Result<GenerationUnit, CoreEngineError> {
        self.set_locked(asset_id, true)
    }

    pub fn unlock(&self, asset_id: Uuid) -> Result<GenerationUnit, CoreEngineError> {
        self.set_locked(asset_id, false)
    }

    fn set_locked(&self, asset_id: Uuid, locked: bool) -> Result<GenerationUnit, CoreEngineError> {
        let (wf, unit) = self.guarded_unit(asset_id, Endpoint::ApproveAsset)?;
        if locked && (unit.status != UnitStatus::Completed || !unit.has_output()) {
            return Err(CoreEngineError::Validation(format!("{} {} has no completed output to approve ({})",
                                                           unit.asset_type,
                                                           unit.id,
                                                           unit.status.as_str())));
        }
        if unit.locked_approved == locked {
            return Ok(unit);
        }
        let mut next = unit.clone();
        next.locked_approved = locked;
        if locked {
            next.qa_status = QaStatus::Approved;
        }
        let saved = self.repo.update_unit(&next, unit.version)?;
        self.emit(wf.id,
                  WorkflowEventKind::UnitApproved { asset_id: saved.id,
                                                    locked })?;
        Ok(saved)
    }

    /// Pausa o reanuda. Pausar no retira jobs ya despachados.
    pub fn set_enabled(&self, workflow_id: Uuid, enabled: bool) -> Result<Workflow, CoreEngineError> {
        let wf = self.repo.get_workflow(workflow_id)?;
        if wf.enabled == enabled {
            return Ok(wf);
        }
        let mut next = wf.clone();
        next.enabled = enabled;
        let saved = self.repo.update_workflow(&next, wf.version)?;
        self.emit(workflow_id, WorkflowEventKind::EnabledChanged { enabled })?;
        info!("workflow {workflow_id} {}", if enabled { "resumed" } else { "paused" });
        Ok(saved)
    }

    /// Cierra el job de un step sin unidades (0–3): registra la salida, da de
    /// alta los espacios detectados y pasa a la fase de revisión.
    pub fn complete_stage_job(&self, workflow_id: Uuid, output: StepOutput, spaces: &[SpaceDraft])
                              -> Result<Workflow, CoreEngineError> {
        let wf = self.repo.get_workflow(workflow_id)?;
        let step = output.step();
        if Phase::running_for_step(step) != Some(wf.phase) || step > 3 {
            return Err(CoreEngineError::Validation(format!("no stage job for step {step} running in phase {}",
                                                           wf.phase)));
        }
        if !spaces.is_empty() && !matches!(output, StepOutput::SpaceAnalysis { .. } | StepOutput::SpaceDetection { .. }) {
            return Err(CoreEngineError::Validation(format!("step {step} does not create spaces")));
        }

        let mut known: HashSet<String> = self.repo
                                             .list_spaces(workflow_id)?
                                             .iter()
                                             .map(|s| space_key(&s.name))
                                             .collect();
        let mut added = 0;
        for draft in spaces {
            // también deduplica dentro del mismo reporte
            if !known.insert(space_key(&draft.name)) {
                continue;
            }
            let space = Space::new(workflow_id, draft.name.trim(), draft.space_type.clone())?;
            self.repo.insert_space(&space)?;
            added += 1;
        }
        if added > 0 {
            info!("workflow {workflow_id}: {added} spaces registered");
        }

        let review = Phase::review_for_step(step)
            .ok_or_else(|| CoreEngineError::Internal(format!("no review phase for step {step}")))?;
        let mut next = wf.clone();
        next.step_outputs.record(output);
        next.last_error = None;
        self.move_phase(&next, review, step)
    }

    /// Marca el workflow como fallido (terminal).
    pub fn fail_workflow(&self, workflow_id: Uuid, error: impl Into<String>) -> Result<Workflow, CoreEngineError> {
        let wf = self.repo.get_workflow(workflow_id)?;
        if wf.is_terminal() {
            return Err(CoreEngineError::Validation(format!("workflow {workflow_id} is already {}", wf.phase)));
        }
        let mut next = wf.clone();
        next.last_error = Some(error.into());
        self.move_phase(&next, Phase::Failed, wf.current_step)
    }

    pub fn set_space_flags(&self, space_id: Uuid, include_in_generation: bool, is_excluded: bool)
                           -> Result<Space, CoreEngineError> {
        self.repo.set_space_flags(space_id, include_in_generation, is_excluded)
    }
}

/// Clave de deduplicación de espacios: nombre sin espacios extremos, en minúsculas.
fn space_key(name: &str) -> String {
    name.trim().to_lowercase()
}
