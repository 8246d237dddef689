//! Motor de rechazos: edición dirigida o reintento completo con aprendizaje
//! acotado, con presupuesto fijo de intentos.
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use uuid::Uuid;

use plan_core::constants::MAX_ATTEMPTS;
use plan_core::{AnalysisRequest, CoreEngineError, EventStore, GenerationMode, PromptImprovementRequest, UnitRepository,
                WorkflowEventKind, WorkflowRepository};
use plan_core::{endpoint_guard, Endpoint};
use plan_domain::{AssetType, GenerationUnit, JobType, QaStatus, RejectionAnalysis, RejectionEvent, RejectionPath,
                  UnitStatus, Workflow};
use plan_policies::{select_path, PatchDecision, PatchInputs, PathInput, RetryPatchPolicy};

use crate::engine::WorkflowEngine;

#[derive(Debug, Clone, Default)]
pub struct RejectRequest {
    pub asset_type: Option<AssetType>,
    pub asset_id: Uuid,
    pub notes: Option<String>,
    pub category: Option<String>,
    pub is_post_approval: bool,
}

impl RejectRequest {
    pub fn new(asset_type: AssetType, asset_id: Uuid) -> Self {
        Self { asset_type: Some(asset_type),
               asset_id,
               ..Default::default() }
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn post_approval(mut self) -> Self {
        self.is_post_approval = true;
        self
    }
}

/// Cuál de los tres caminos se tomó, con el conteo de intentos vigente.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RejectOutcome {
    Inpaint {
        inpaint_triggered: bool,
        asset_id: Uuid,
        attempt_count: u32,
        job_id: Option<String>,
    },
    Retry {
        retry_triggered: bool,
        asset_id: Uuid,
        attempt_count: u32,
        max_attempts: u32,
        learning_applied: bool,
        root_cause: Option<String>,
        job_id: Option<String>,
    },
    Blocked {
        blocked_for_human: bool,
        asset_id: Uuid,
        attempt_count: u32,
        max_attempts: u32,
        rejection_history: Vec<RejectionEvent>,
    },
}

impl RejectOutcome {
    pub fn attempt_count(&self) -> u32 {
        match self {
            RejectOutcome::Inpaint { attempt_count, .. }
            | RejectOutcome::Retry { attempt_count, .. }
            | RejectOutcome::Blocked { attempt_count, .. } => *attempt_count,
        }
    }

    pub fn path(&self) -> RejectionPath {
        match self {
            RejectOutcome::Inpaint { .. } => RejectionPath::TargetedEdit,
            RejectOutcome::Retry { .. } => RejectionPath::FullRetry,
            RejectOutcome::Blocked { .. } => RejectionPath::Exhausted,
        }
    }

    pub fn to_error(&self) -> Option<CoreEngineError> {
        match self {
            RejectOutcome::Blocked { asset_id,
                                     attempt_count,
                                     max_attempts,
                                     .. } => Some(CoreEngineError::RetryBudgetExhausted { asset_id: *asset_id,
                                                                                          attempt_count: *attempt_count,
                                                                                          max_attempts: *max_attempts }),
            _ => None,
        }
    }
}

fn clean(text: Option<&str>) -> Option<String> {
    text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

impl<R, E> WorkflowEngine<R, E>
    where R: WorkflowRepository + UnitRepository,
          E: EventStore
{
    /// Procesa el rechazo de una unidad de generación.
    pub async fn reject(&self, request: RejectRequest) -> Result<RejectOutcome, CoreEngineError> {
        let unit = self.repo.get_unit(request.asset_id)?;
        if let Some(expected) = request.asset_type {
            if unit.asset_type != expected {
                return Err(CoreEngineError::Validation(format!("asset {} is a {}, not a {}",
                                                               unit.id, unit.asset_type, expected)));
            }
        }
        let wf = self.repo.get_workflow(unit.workflow_id)?;
        endpoint_guard().check(Endpoint::RejectAsset, wf.phase)?;

        let notes = clean(request.notes.as_deref());
        let category = clean(request.category.as_deref());
        let path = select_path(&PathInput::from_unit(&unit, request.is_post_approval, notes.as_deref()));
        info!("reject {} {} (attempt {}): {:?}", unit.asset_type, unit.id, unit.attempt_count, path);

        match path {
            RejectionPath::TargetedEdit => self.targeted_edit(&wf, unit, notes, category).await,
            RejectionPath::Exhausted => self.exhaust(unit, notes, category),
            RejectionPath::FullRetry => self.full_retry(&wf, unit, notes, category).await,
        }
    }

    async fn targeted_edit(&self, wf: &Workflow, unit: GenerationUnit, notes: Option<String>,
                           category: Option<String>)
                           -> Result<RejectOutcome, CoreEngineError> {
        let source_ref = unit.output_ref
                             .clone()
                             .ok_or_else(|| CoreEngineError::Internal(format!("unit {} has no output", unit.id)))?;
        let correction = notes.clone().unwrap_or_default();
        let correlation_id = Uuid::new_v4();

        let mut next = unit.clone();
        next.rejection_history.push(RejectionEvent { attempt: unit.attempt_count,
                                                     notes,
                                                     category,
                                                     path: RejectionPath::TargetedEdit,
                                                     analysis: None,
                                                     retry_patch: None,
                                                     learning_applied: false,
                                                     qa_snapshot: unit.qa_report.clone(),
                                                     rejected_at: Utc::now() });
        next.status = UnitStatus::Editing;
        next.job_type = JobType::EditInpaint;
        next.edit_source_ref = Some(source_ref.clone());
        next.correction_text = Some(correction.clone());
        next.pre_rejection_qa_status = Some(unit.qa_status);
        next.qa_status = QaStatus::Pending;
        next.locked_approved = false;
        next.last_dispatch_id = Some(correlation_id);
        next.last_error = None;
        let saved = self.repo.update_unit(&next, unit.version)?;

        self.emit(wf.id,
                  WorkflowEventKind::AssetRejected { asset_id: unit.id,
                                                     attempt: unit.attempt_count,
                                                     path: RejectionPath::TargetedEdit,
                                                     learning_applied: false })?;
        self.emit(wf.id,
                  WorkflowEventKind::EditRequested { asset_id: unit.id,
                                                     source_ref: source_ref.clone() })?;

        let source_url = self.collaborators.signed_url(&source_ref);
        let request = self.generation_request(wf,
                                              &saved,
                                              correlation_id,
                                              GenerationMode::Edit { source_ref,
                                                                     source_url,
                                                                     correction });
        let receipt = self.dispatch_unit(saved.clone(), request).await?;
        Ok(RejectOutcome::Inpaint { inpaint_triggered: true,
                                    asset_id: saved.id,
                                    attempt_count: saved.attempt_count,
                                    job_id: receipt.job_id })
    }

    fn exhaust(&self, unit: GenerationUnit, notes: Option<String>, category: Option<String>)
               -> Result<RejectOutcome, CoreEngineError> {
        let mut next = unit.clone();
        next.rejection_history.push(RejectionEvent { attempt: unit.attempt_count,
                                                     notes,
                                                     category,
                                                     path: RejectionPath::Exhausted,
                                                     analysis: None,
                                                     retry_patch: None,
                                                     learning_applied: false,
                                                     qa_snapshot: unit.qa_report.clone(),
                                                     rejected_at: Utc::now() });
        next.status = UnitStatus::BlockedForHuman;
        next.qa_status = QaStatus::Rejected;
        next.locked_approved = false;
        let saved = self.repo.update_unit(&next, unit.version)?;

        self.emit(unit.workflow_id,
                  WorkflowEventKind::AssetRejected { asset_id: unit.id,
                                                     attempt: unit.attempt_count,
                                                     path: RejectionPath::Exhausted,
                                                     learning_applied: false })?;
        self.emit(unit.workflow_id,
                  WorkflowEventKind::RetryExhausted { asset_id: unit.id,
                                                      attempt_count: saved.attempt_count })?;
        warn!("{} {} blocked for human after {} attempts ({} rejections)",
              saved.asset_type,
              saved.id,
              saved.attempt_count,
              saved.rejection_history.len());
        Ok(RejectOutcome::Blocked { blocked_for_human: true,
                                    asset_id: saved.id,
                                    attempt_count: saved.attempt_count,
                                    max_attempts: MAX_ATTEMPTS,
                                    rejection_history: saved.rejection_history })
    }

    async fn analyze(&self, wf: &Workflow, unit: &GenerationUnit, notes: Option<&str>, category: Option<&str>)
                     -> Option<RejectionAnalysis> {
        let space = match self.repo.list_spaces(wf.id) {
            Ok(spaces) => spaces.into_iter().find(|s| s.id == unit.space_id),
            Err(e) => {
                warn!("could not load spaces for analysis of {}: {e}", unit.id);
                None
            }
        };
        let request = AnalysisRequest { asset_id: unit.id,
                                        asset_type: unit.asset_type,
                                        step: unit.asset_type.step(),
                                        space_name: space.as_ref().map(|s| s.name.clone()),
                                        space_type: space.map(|s| s.space_type),
                                        rejection_notes: notes.map(str::to_string),
                                        rejection_category: category.map(str::to_string),
                                        prior_qa: unit.qa_report.clone(),
                                        output_url: unit.output_ref
                                                        .as_deref()
                                                        .and_then(|r| self.collaborators.signed_url(r)) };
        match self.collaborators.analyzer.analyze(&request).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("rejection analysis unavailable for {}: {e}", unit.id);
                None
            }
        }
    }

    async fn improve_prompt(&self, unit: &GenerationUnit, analysis: Option<&RejectionAnalysis>,
                            category: Option<&str>)
                            -> Option<String> {
        let previous = unit.prompt_text.clone()?;
        let request = PromptImprovementRequest { asset_id: unit.id,
                                                 asset_type: unit.asset_type,
                                                 previous_prompt: previous.clone(),
                                                 analysis: analysis.cloned(),
                                                 rejection_category: category.map(str::to_string) };
        match self.collaborators.prompts.improve(&request).await {
            Ok(improved) if !improved.trim().is_empty() => Some(improved),
            Ok(_) => Some(previous),
            Err(e) => {
                warn!("prompt improvement unavailable for {}: {e}", unit.id);
                Some(previous)
            }
        }
    }

    async fn full_retry(&self, wf: &Workflow, unit: GenerationUnit, notes: Option<String>,
                        category: Option<String>)
                        -> Result<RejectOutcome, CoreEngineError> {
        let new_attempt = unit.attempt_count + 1;

        let analysis = self.analyze(wf, &unit, notes.as_deref(), category.as_deref()).await;
        let prompt = self.improve_prompt(&unit, analysis.as_ref(), category.as_deref()).await;
        let prompt_changed = prompt.is_some() && prompt != unit.prompt_text;

        let decision = self.patch_policy.build(&PatchInputs { analysis: analysis.as_ref(),
                                                              prior_qa: unit.qa_report.as_ref(),
                                                              human_category: category.as_deref(),
                                                              seed: rand::random::<u32>() });
        let learning_applied = decision.learning_applied() || prompt_changed;
        let root_cause = analysis.as_ref().and_then(|a| a.root_cause_summary.clone());
        let PatchDecision { patch,
                            policy_id,
                            params_hash,
                            ignored,
                            .. } = decision;
        let correlation_id = Uuid::new_v4();

        let mut next = unit.clone();
        next.rejection_history.push(RejectionEvent { attempt: new_attempt,
                                                     notes,
                                                     category,
                                                     path: RejectionPath::FullRetry,
                                                     analysis,
                                                     retry_patch: Some(patch.clone()),
                                                     learning_applied,
                                                     qa_snapshot: unit.qa_report.clone(),
                                                     rejected_at: Utc::now() });
        next.status = UnitStatus::Retrying;
        next.job_type = JobType::Retry;
        next.qa_status = QaStatus::Pending;
        next.qa_report = None;
        next.pre_rejection_qa_status = None;
        next.locked_approved = false;
        next.attempt_count = new_attempt;
        next.output_ref = None;
        next.edit_source_ref = None;
        next.correction_text = None;
        if prompt_changed {
            next.prompt_text = prompt;
        }
        next.seed = Some(patch.seed);
        next.retry_patch = Some(patch.clone());
        next.last_dispatch_id = Some(correlation_id);
        next.last_error = None;
        // El intento queda consumido desde acá, aunque el despacho falle.
        let saved = self.repo.update_unit(&next, unit.version)?;

        self.emit(wf.id,
                  WorkflowEventKind::AssetRejected { asset_id: unit.id,
                                                     attempt: new_attempt,
                                                     path: RejectionPath::FullRetry,
                                                     learning_applied })?;
        self.emit(wf.id,
                  WorkflowEventKind::RetryStarted { asset_id: unit.id,
                                                    attempt: new_attempt,
                                                    root_cause: root_cause.clone(),
                                                    categories: patch.categories()
                                                                     .iter()
                                                                     .map(|c| c.as_str().to_string())
                                                                     .collect(),
                                                    policy_id,
                                                    params_hash,
                                                    ignored })?;
        info!("retry {new_attempt}/{MAX_ATTEMPTS} for {} {}: {}",
              unit.asset_type,
              unit.id,
              root_cause.as_deref().unwrap_or("no analysis"));

        let request = self.generation_request(wf,
                                              &saved,
                                              correlation_id,
                                              GenerationMode::Retry { attempt: new_attempt,
                                                                      patch });
        let receipt = self.dispatch_unit(saved.clone(), request).await?;
        Ok(RejectOutcome::Retry { retry_triggered: true,
                                  asset_id: saved.id,
                                  attempt_count: new_attempt,
                                  max_attempts: MAX_ATTEMPTS,
                                  learning_applied,
                                  root_cause,
                                  job_id: receipt.job_id })
    }
}
