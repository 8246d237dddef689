//! Patch de reintento acotado.
//!
//! Orden de llenado, sin repetir clave: categorías del análisis, hasta
//! `max_learned` restricciones aprendidas (truncadas), categorías de issues
//! críticos/mayores del QA previo, banderas de violación estructural o de tipo
//! de ambiente (que además piden bajar creatividad) y la categoría del
//! revisor. El tamaño queda acotado por la tabla de categorías más
//! `max_learned`, sin importar cuántos reintentos haya.
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use plan_core::constants::{LEARNED_CONSTRAINT_MAX_CHARS, MAX_LEARNED_CONSTRAINTS};
use plan_core::hashing::hash_value;
use plan_domain::{FailureCategory, PatchEntry, PatchKey, QualityReport, RejectionAnalysis, RetryPatch};

use crate::categories::{instruction_for, normalize_category};

/// Entradas crudas para construir el patch.
#[derive(Debug, Clone, Copy)]
pub struct PatchInputs<'a> {
    pub analysis: Option<&'a RejectionAnalysis>,
    pub prior_qa: Option<&'a QualityReport>,
    pub human_category: Option<&'a str>,
    pub seed: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatchParams {
    pub max_learned: usize,
    pub learned_max_chars: usize,
}

impl Default for PatchParams {
    fn default() -> Self {
        Self { max_learned: MAX_LEARNED_CONSTRAINTS,
               learned_max_chars: LEARNED_CONSTRAINT_MAX_CHARS }
    }
}

/// De dónde salió cada entrada del patch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Analysis,
    Learned,
    QualityReport,
    ViolationFlag,
    Reviewer,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PatchDecision {
    pub patch: RetryPatch,
    pub policy_id: String,
    pub params_hash: String,
    /// Fuente de cada entrada, alineada con `patch.entries`.
    pub sources: Vec<EntrySource>,
    /// Categorías recibidas que no están en la tabla y se descartaron.
    pub ignored: Vec<String>,
}

impl PatchDecision {
    /// Hubo aprendizaje: el análisis aportó al menos una entrada.
    pub fn learning_applied(&self) -> bool {
        self.sources
            .iter()
            .any(|s| matches!(s, EntrySource::Analysis | EntrySource::Learned))
    }
}

pub trait RetryPatchPolicy {
    fn id(&self) -> &'static str;
    fn build(&self, inputs: &PatchInputs<'_>) -> PatchDecision;
}

pub struct BoundedPatchPolicy {
    params: PatchParams,
}

impl BoundedPatchPolicy {
    pub fn new(params: PatchParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PatchParams {
        &self.params
    }
}

impl Default for BoundedPatchPolicy {
    fn default() -> Self {
        Self::new(PatchParams::default())
    }
}

struct Builder {
    seen: HashSet<PatchKey>,
    entries: Vec<PatchEntry>,
    sources: Vec<EntrySource>,
    ignored: Vec<String>,
}

impl Builder {
    fn push(&mut self, key: PatchKey, instruction: String, source: EntrySource) -> bool {
        if !self.seen.insert(key) {
            return false;
        }
        self.entries.push(PatchEntry { key, instruction });
        self.sources.push(source);
        true
    }

    fn push_category(&mut self, category: FailureCategory, source: EntrySource) {
        self.push(PatchKey::Category(category), instruction_for(category).to_string(), source);
    }

    fn push_raw(&mut self, raw: &str, source: EntrySource) {
        match normalize_category(raw) {
            Some(category) => self.push_category(category, source),
            None => {
                if !raw.trim().is_empty() {
                    self.ignored.push(raw.trim().to_string());
                }
            }
        }
    }
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

impl RetryPatchPolicy for BoundedPatchPolicy {
    fn id(&self) -> &'static str {
        "bounded_patch"
    }

    fn build(&self, inputs: &PatchInputs<'_>) -> PatchDecision {
        let mut b = Builder { seen: HashSet::new(),
                              entries: Vec::new(),
                              sources: Vec::new(),
                              ignored: Vec::new() };
        let mut reduce_creativity = false;

        if let Some(analysis) = inputs.analysis {
            for raw in &analysis.failure_categories {
                b.push_raw(raw, EntrySource::Analysis);
            }
            let mut learned_texts: HashSet<String> = HashSet::new();
            let learned = analysis.constraints_to_add
                                  .iter()
                                  .map(|c| cap_chars(c.trim(), self.params.learned_max_chars))
                                  .filter(|c| !c.is_empty())
                                  .filter(|c| learned_texts.insert(c.to_lowercase()))
                                  .take(self.params.max_learned);
            for (idx, text) in learned.enumerate() {
                b.push(PatchKey::Learned(idx as u8), text, EntrySource::Learned);
            }
        }

        if let Some(report) = inputs.prior_qa {
            for raw in report.severe_issue_categories() {
                b.push_raw(raw, EntrySource::QualityReport);
            }
            if report.structural_violation() {
                reduce_creativity = true;
                b.push_category(FailureCategory::StructuralChange, EntrySource::ViolationFlag);
            }
            if report.room_type_violation() {
                reduce_creativity = true;
                b.push_category(FailureCategory::WrongRoom, EntrySource::ViolationFlag);
            }
        }

        if let Some(raw) = inputs.human_category {
            b.push_raw(raw, EntrySource::Reviewer);
        }

        debug!("retry patch: {} entries, {} ignored categories, reduce_creativity={}",
               b.entries.len(),
               b.ignored.len(),
               reduce_creativity);
        PatchDecision { patch: RetryPatch { entries: b.entries,
                                            reduce_creativity,
                                            seed: inputs.seed },
                        policy_id: self.id().to_string(),
                        params_hash: params_hash(&self.params),
                        sources: b.sources,
                        ignored: b.ignored }
    }
}

/// Hash canónico de los parámetros de la política.
pub fn params_hash(params: &PatchParams) -> String {
    let value = serde_json::json!({ "max_learned": params.max_learned,
                                    "learned_max_chars": params.learned_max_chars });
    hash_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_domain::{QaDecision, QaIssue, QualityReportV1, Severity};

    fn report(issues: Vec<(&str, Severity)>, structural: bool, room: bool) -> QualityReport {
        QualityReport::V1(QualityReportV1 { decision: QaDecision::Rejected,
                                            score: Some(55.0),
                                            issues: issues.into_iter()
                                                          .map(|(c, s)| QaIssue { category: c.into(),
                                                                                  severity: s,
                                                                                  description: String::new() })
                                                          .collect(),
                                            structural_violation: structural,
                                            room_type_violation: room,
                                            summary: None })
    }

    #[test]
    fn fill_order_and_dedup() {
        let analysis = RejectionAnalysis { failure_categories: vec!["extra_furniture".into(), "seam".into()],
                                           constraints_to_add: vec!["keep the sofa".into(),
                                                                    "keep the sofa".into(),
                                                                    "no rugs".into(),
                                                                    "third one".into()],
                                           ..Default::default() };
        let qa = report(vec![("extra_furniture", Severity::Critical),
                             ("flooring", Severity::Major),
                             ("perspective", Severity::Minor)],
                        true,
                        false);
        let d = BoundedPatchPolicy::default().build(&PatchInputs { analysis: Some(&analysis),
                                                                   prior_qa: Some(&qa),
                                                                   human_category: Some("Seam Artifact"),
                                                                   seed: 42 });
        let keys: Vec<PatchKey> = d.patch.entries.iter().map(|e| e.key).collect();
        assert_eq!(keys,
                   vec![PatchKey::Category(FailureCategory::ExtraFurniture),
                        PatchKey::Category(FailureCategory::SeamArtifact),
                        PatchKey::Learned(0),
                        PatchKey::Learned(1),
                        PatchKey::Category(FailureCategory::FlooringMismatch),
                        PatchKey::Category(FailureCategory::StructuralChange)]);
        assert_eq!(d.patch.instructions()[3], "no rugs");
        assert!(d.patch.reduce_creativity);
        assert_eq!(d.patch.seed, 42);
        assert!(d.learning_applied());
        assert_eq!(d.sources.len(), d.patch.entries.len());
    }

    #[test]
    fn reviewer_category_alone_is_not_learning() {
        let d = BoundedPatchPolicy::default().build(&PatchInputs { analysis: None,
                                                                   prior_qa: None,
                                                                   human_category: Some("wrong_room"),
                                                                   seed: 1 });
        assert_eq!(d.patch.categories(), vec![FailureCategory::WrongRoom]);
        assert!(!d.patch.reduce_creativity);
        assert!(!d.learning_applied());
    }

    #[test]
    fn unknown_categories_are_reported_not_injected() {
        let analysis = RejectionAnalysis { failure_categories: vec!["the lighting feels off somehow".into()],
                                           ..Default::default() };
        let d = BoundedPatchPolicy::default().build(&PatchInputs { analysis: Some(&analysis),
                                                                   prior_qa: None,
                                                                   human_category: None,
                                                                   seed: 1 });
        assert!(d.patch.is_empty());
        assert_eq!(d.ignored, vec!["the lighting feels off somehow".to_string()]);
    }

    #[test]
    fn learned_constraints_are_length_capped() {
        let long = "x".repeat(500);
        let analysis = RejectionAnalysis { constraints_to_add: vec![long],
                                           ..Default::default() };
        let d = BoundedPatchPolicy::default().build(&PatchInputs { analysis: Some(&analysis),
                                                                   prior_qa: None,
                                                                   human_category: None,
                                                                   seed: 1 });
        assert_eq!(d.patch.entries[0].instruction.chars().count(), LEARNED_CONSTRAINT_MAX_CHARS);
    }

    #[test]
    fn params_hash_is_stable() {
        let a = params_hash(&PatchParams::default());
        assert_eq!(a, params_hash(&PatchParams::default()));
        assert_ne!(a, params_hash(&PatchParams { max_learned: 3, ..PatchParams::default() }));
    }
}
