//! Stage Advancer.
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use plan_core::{BlockedReason, CoreEngineError, EventStore, UnitRepository, WorkflowEventKind, WorkflowRepository};
use plan_domain::{AssetType, GenerationUnit, Phase, UnitKey, FINAL_STEP};

use crate::engine::WorkflowEngine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_taken: Option<String>,
    pub new_phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<BlockedReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<u32>,
    pub active_spaces: u32,
    pub units_created: u32,
    /// Step persistido al responder.
    pub current_step: u32,
    /// Sólo en bloqueos por `outdated_step`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_step: Option<u32>,
}

impl AdvanceOutcome {
    fn blocked(reason: BlockedReason, phase: Phase, current_step: u32) -> Self {
        Self { success: false,
               action_taken: None,
               new_phase: phase,
               blocked_reason: Some(reason),
               approved: None,
               required: None,
               active_spaces: 0,
               units_created: 0,
               current_step,
               from_step: None }
    }

    /// Error de la taxonomía equivalente a un avance bloqueado.
    pub fn to_error(&self, workflow_id: Uuid) -> Option<CoreEngineError> {
        match self.blocked_reason? {
            BlockedReason::OutdatedStep => {
                Some(CoreEngineError::OutdatedTransition { from_step: self.from_step.unwrap_or_default(),
                                                           current_step: self.current_step })
            }
            BlockedReason::ApprovalIncomplete => {
                Some(CoreEngineError::ApprovalIncomplete { approved: self.approved.unwrap_or_default(),
                                                           required: self.required.unwrap_or_default() })
            }
            BlockedReason::Paused => Some(CoreEngineError::WorkflowPaused(workflow_id)),
        }
    }
}

fn action_label(next_step: u32, next_phase: Phase, created: u32) -> String {
    match AssetType::for_step(next_step) {
        Some(AssetType::Render) => format!("initialized_renders_{created}"),
        Some(AssetType::Panorama) => format!("initialized_panoramas_{created}"),
        Some(AssetType::Final360) => format!("initialized_merges_{created}"),
        None if next_step == FINAL_STEP => "completed".to_string(),
        None => format!("advanced_to_{next_phase}"),
    }
}

impl<R, E> WorkflowEngine<R, E>
    where R: WorkflowRepository + UnitRepository,
          E: EventStore
{
    /// Avanza el workflow desde `from_step` al step siguiente.
    ///
    /// Un `from_step` viejo se rechaza sin tocar nada; un workflow pausado no
    /// crea trabajo; en steps con aprobación obligatoria todas las unidades
    /// requeridas deben estar `locked_approved`. Las unidades del step
    /// siguiente se crean sólo para las claves que faltan.
    pub fn advance(&self, workflow_id: Uuid, from_step: u32) -> Result<AdvanceOutcome, CoreEngineError> {
        let wf = self.repo.get_workflow(workflow_id)?;

        if from_step < wf.current_step {
            info!("advance({workflow_id}, {from_step}) outdated: current_step is {}", wf.current_step);
            let mut outcome = AdvanceOutcome::blocked(BlockedReason::OutdatedStep, wf.phase, wf.current_step);
            outcome.from_step = Some(from_step);
            return Ok(outcome);
        }
        if !wf.enabled {
            info!("advance({workflow_id}, {from_step}) skipped: workflow paused");
            self.emit(workflow_id,
                      WorkflowEventKind::AdvanceBlocked { from_step,
                                                          reason: BlockedReason::Paused,
                                                          approved: None,
                                                          required: None })?;
            return Ok(AdvanceOutcome::blocked(BlockedReason::Paused, wf.phase, wf.current_step));
        }
        if from_step > wf.current_step {
            return Err(CoreEngineError::Validation(format!("from_step {from_step} is ahead of current_step {}",
                                                           wf.current_step)));
        }
        if wf.is_terminal() {
            return Err(CoreEngineError::Validation(format!("workflow {workflow_id} is already {}", wf.phase)));
        }

        let spaces = self.active_spaces(workflow_id)?;
        let active = spaces.len() as u32;

        if let Some(gated) = AssetType::for_step(from_step) {
            let required = active * gated.units_per_space() as u32;
            if required == 0 {
                return Err(CoreEngineError::Validation(format!("workflow {workflow_id} has no active spaces")));
            }
            let approved = self.active_units(workflow_id, gated, &spaces)?
                               .iter()
                               .filter(|u| u.locked_approved)
                               .count() as u32;
            if approved < required {
                info!("advance({workflow_id}, {from_step}) blocked: {approved}/{required} approved");
                self.emit(workflow_id,
                          WorkflowEventKind::AdvanceBlocked { from_step,
                                                              reason: BlockedReason::ApprovalIncomplete,
                                                              approved: Some(approved),
                                                              required: Some(required) })?;
                let mut outcome =
                    AdvanceOutcome::blocked(BlockedReason::ApprovalIncomplete, wf.phase, wf.current_step);
                outcome.approved = Some(approved);
                outcome.required = Some(required);
                outcome.active_spaces = active;
                return Ok(outcome);
            }
        }

        let next_step = from_step + 1;
        let next_phase = Phase::entry_for_step(next_step)
            .ok_or_else(|| CoreEngineError::Internal(format!("no entry phase for step {next_step}")))?;

        let mut created = 0u32;
        let mut initialized = None;
        if let Some(next_type) = AssetType::for_step(next_step) {
            let existing: HashSet<UnitKey> = self.repo
                                                 .list_units(workflow_id, next_type)?
                                                 .iter()
                                                 .map(GenerationUnit::key)
                                                 .collect();
            let missing: Vec<GenerationUnit> = spaces.iter()
                                                     .flat_map(|s| {
                                                         next_type.slots().iter().map(move |slot| UnitKey { space_id: s.id,
                                                                                                          asset_type: next_type,
                                                                                                          slot: *slot })
                                                     })
                                                     .filter(|k| !existing.contains(k))
                                                     .map(|k| GenerationUnit::new(workflow_id, k))
                                                     .collect();
            created = self.repo.insert_units(&missing)? as u32;
            debug!("advance({workflow_id}): {} {} keys existed, {} created",
                   existing.len(), next_type, created);
            initialized = Some(WorkflowEventKind::UnitsInitialized { asset_type: next_type,
                                                                     created,
                                                                     existing: existing.len() as u32 });
        }

        let saved = match self.move_phase(&wf, next_phase, next_step) {
            Ok(saved) => {
                if let Some(event) = initialized {
                    self.emit(workflow_id, event)?;
                }
                saved
            }
            // Otra request concurrente ya dejó el workflow en el mismo destino
            // y registró sus eventos.
            Err(CoreEngineError::ConcurrentModification { .. }) => {
                let current = self.repo.get_workflow(workflow_id)?;
                if current.current_step == next_step && current.phase == next_phase {
                    current
                } else {
                    return Err(CoreEngineError::ConcurrentModification { entity: "workflow".into(),
                                                                         id: workflow_id,
                                                                         expected: wf.version });
                }
            }
            Err(e) => return Err(e),
        };

        let action = action_label(next_step, next_phase, created);
        info!("advance({workflow_id}, {from_step}) -> {next_phase}: {action}");
        Ok(AdvanceOutcome { success: true,
                            action_taken: Some(action),
                            new_phase: saved.phase,
                            blocked_reason: None,
                            approved: None,
                            required: None,
                            active_spaces: active,
                            units_created: created,
                            current_step: saved.current_step,
                            from_step: None })
    }
}
