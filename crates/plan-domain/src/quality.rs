// quality.rs
//! Reporte estructurado de calidad (QA) con esquema versionado.
//!
//! El reporte llega como JSON desde el servicio de evaluación visual. Se
//! parsea y valida en el borde (`QualityReport::parse`); el resto del sistema
//! sólo ve la forma tipada. El discriminante `schema` fija la versión.
use serde::{Deserialize, Serialize};

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QaDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    /// Sólo estas severidades alimentan el patch de reintento.
    pub fn is_severe(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Major)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaIssue {
    pub category: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReportV1 {
    pub decision: QaDecision,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub issues: Vec<QaIssue>,
    #[serde(default)]
    pub structural_violation: bool,
    #[serde(default)]
    pub room_type_violation: bool,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema")]
pub enum QualityReport {
    #[serde(rename = "qa.v1")]
    V1(QualityReportV1),
}

impl QualityReport {
    /// Parse-then-validate de un reporte recibido como JSON arbitrario.
    pub fn parse(value: &serde_json::Value) -> Result<Self, DomainError> {
        let schema = value.get("schema").and_then(|s| s.as_str()).unwrap_or_default();
        if schema != "qa.v1" {
            return Err(DomainError::UnsupportedSchema { kind: "quality_report",
                                                        version: schema.to_string() });
        }
        let report: QualityReport = serde_json::from_value(value.clone())?;
        report.validate()?;
        Ok(report)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            QualityReport::V1(r) => {
                if let Some(score) = r.score {
                    if !(0.0..=100.0).contains(&score) {
                        return Err(DomainError::ValidationError(format!("score fuera de rango: {score}")));
                    }
                }
                if r.issues.iter().any(|i| i.category.trim().is_empty()) {
                    return Err(DomainError::ValidationError("issue sin categoría".into()));
                }
                Ok(())
            }
        }
    }

    pub fn decision(&self) -> QaDecision {
        match self {
            QualityReport::V1(r) => r.decision,
        }
    }

    pub fn score(&self) -> Option<f32> {
        match self {
            QualityReport::V1(r) => r.score,
        }
    }

    pub fn issues(&self) -> &[QaIssue] {
        match self {
            QualityReport::V1(r) => &r.issues,
        }
    }

    pub fn structural_violation(&self) -> bool {
        match self {
            QualityReport::V1(r) => r.structural_violation,
        }
    }

    pub fn room_type_violation(&self) -> bool {
        match self {
            QualityReport::V1(r) => r.room_type_violation,
        }
    }

    /// Categorías de los issues críticos/mayores, en orden de aparición.
    pub fn severe_issue_categories(&self) -> Vec<&str> {
        self.issues()
            .iter()
            .filter(|i| i.severity.is_severe())
            .map(|i| i.category.as_str())
            .collect()
    }
}
