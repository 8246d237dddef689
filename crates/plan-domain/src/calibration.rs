// calibration.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::DomainError;

/// Voto del revisor humano sobre la decisión de la IA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanVote {
    Agree,
    Disagree,
}

impl FromStr for HumanVote {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agree" => Ok(HumanVote::Agree),
            "disagree" => Ok(HumanVote::Disagree),
            other => Err(DomainError::UnknownValue { kind: "human_vote", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationOutcome {
    ConfirmedCorrect,
    FalseReject,
    FalseApprove,
}

impl CalibrationOutcome {
    /// Nombre de la columna/contador asociado.
    pub fn counter_name(&self) -> &'static str {
        match self {
            CalibrationOutcome::ConfirmedCorrect => "confirmed_correct_count",
            CalibrationOutcome::FalseReject => "false_reject_count",
            CalibrationOutcome::FalseApprove => "false_approve_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalibrationKey {
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub step: u32,
    pub category: String,
}

/// Contadores acumulados por (owner, project, step, category). Nunca decrecen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationStat {
    pub key: CalibrationKey,
    pub false_reject_count: u64,
    pub false_approve_count: u64,
    pub confirmed_correct_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl CalibrationStat {
    /// Fila nueva con el contador del outcome inicializado al peso.
    pub fn seeded(key: CalibrationKey, outcome: CalibrationOutcome, weight: u64) -> Self {
        let mut stat = CalibrationStat { key,
                                         false_reject_count: 0,
                                         false_approve_count: 0,
                                         confirmed_correct_count: 0,
                                         updated_at: Utc::now() };
        stat.apply(outcome, weight);
        stat
    }

    pub fn apply(&mut self, outcome: CalibrationOutcome, weight: u64) {
        let counter = match outcome {
            CalibrationOutcome::ConfirmedCorrect => &mut self.confirmed_correct_count,
            CalibrationOutcome::FalseReject => &mut self.false_reject_count,
            CalibrationOutcome::FalseApprove => &mut self.false_approve_count,
        };
        *counter = counter.saturating_add(weight);
        self.updated_at = Utc::now();
    }

    pub fn count(&self, outcome: CalibrationOutcome) -> u64 {
        match outcome {
            CalibrationOutcome::ConfirmedCorrect => self.confirmed_correct_count,
            CalibrationOutcome::FalseReject => self.false_reject_count,
            CalibrationOutcome::FalseApprove => self.false_approve_count,
        }
    }

    pub fn total(&self) -> u64 {
        self.confirmed_correct_count + self.false_reject_count + self.false_approve_count
    }
}
