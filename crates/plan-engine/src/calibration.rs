//! Calibration Store: acuerdo entre la decisión automática de QA y la
//! revisión humana, por (owner, project, step, category).
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use plan_core::{CalibrationRepository, CoreEngineError, EventStore, WorkflowEventKind};
use plan_domain::{CalibrationKey, CalibrationOutcome, CalibrationStat, HumanVote, QaDecision};
use plan_policies::{calibration_weight, classify_vote, normalize_category};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationVote {
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub step: u32,
    pub category: String,
    pub ai_decision: QaDecision,
    pub human_vote: HumanVote,
    #[serde(default)]
    pub human_score: Option<f32>,
    /// Si viene, el registro queda también en el log del workflow.
    #[serde(default)]
    pub workflow_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationRecord {
    pub outcome: CalibrationOutcome,
    pub weight: u64,
    pub stat: CalibrationStat,
}

pub struct CalibrationService<C, E>
    where C: CalibrationRepository,
          E: EventStore
{
    repo: Arc<C>,
    events: Arc<E>,
}

impl<C, E> CalibrationService<C, E>
    where C: CalibrationRepository,
          E: EventStore
{
    pub fn new(repo: Arc<C>, events: Arc<E>) -> Self {
        Self { repo, events }
    }

    /// Clasifica el voto, calcula el peso y suma al contador (upsert). Los
    /// contadores nunca bajan.
    pub fn record(&self, vote: &CalibrationVote) -> Result<CalibrationRecord, CoreEngineError> {
        let raw = vote.category.trim();
        if raw.is_empty() {
            return Err(CoreEngineError::Validation("calibration category is empty".into()));
        }
        if let Some(score) = vote.human_score {
            if !(0.0..=100.0).contains(&score) {
                return Err(CoreEngineError::Validation(format!("human_score out of range: {score}")));
            }
        }
        // Categorías de la tabla se guardan en forma canónica; el resto tal cual.
        let category = normalize_category(raw).map(|c| c.as_str().to_string())
                                              .unwrap_or_else(|| raw.to_ascii_lowercase());
        let key = CalibrationKey { owner_id: vote.owner_id,
                                   project_id: vote.project_id,
                                   step: vote.step,
                                   category: category.clone() };
        let outcome = classify_vote(vote.ai_decision, vote.human_vote);
        let weight = calibration_weight(vote.ai_decision, vote.human_score);
        let stat = self.repo.increment(&key, outcome, weight)?;
        info!("calibration {}/{} step {} {}: {} +{}",
              key.owner_id,
              key.project_id,
              key.step,
              key.category,
              outcome.counter_name(),
              weight);
        if let Some(workflow_id) = vote.workflow_id {
            self.events.append_kind(workflow_id,
                                    WorkflowEventKind::CalibrationRecorded { category,
                                                                             outcome,
                                                                             weight })?;
        }
        Ok(CalibrationRecord { outcome, weight, stat })
    }

    pub fn stats(&self, owner_id: Uuid, project_id: Uuid) -> Result<Vec<CalibrationStat>, CoreEngineError> {
        self.repo.list_for_project(owner_id, project_id)
    }
}
