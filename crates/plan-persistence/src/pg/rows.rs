//! Filas Diesel y su conversión a/desde los tipos de dominio. Los enums se
//! guardan como texto estable (`as_str`) y las estructuras anidadas como
//! JSONB.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use plan_domain::{CalibrationKey, CalibrationStat, GenerationUnit, Space, StepOutputs, Workflow};

use crate::error::PersistenceError;
use crate::schema::{calibration_stats, generation_units, spaces, workflows};

fn to_i64(v: u64, field: &str) -> Result<i64, PersistenceError> {
    i64::try_from(v).map_err(|_| PersistenceError::InvalidRow(format!("{field} out of range: {v}")))
}

fn to_u64(v: i64, field: &str) -> Result<u64, PersistenceError> {
    u64::try_from(v).map_err(|_| PersistenceError::InvalidRow(format!("{field} negative: {v}")))
}

fn to_u32(v: i32, field: &str) -> Result<u32, PersistenceError> {
    u32::try_from(v).map_err(|_| PersistenceError::InvalidRow(format!("{field} negative: {v}")))
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug)]
#[diesel(table_name = workflows)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub current_step: i32,
    pub phase: String,
    pub enabled: bool,
    pub step_config: Value,
    pub step_outputs: Value,
    pub last_error: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    pub fn from_domain(wf: &Workflow) -> Result<Self, PersistenceError> {
        Ok(Self { id: wf.id,
                  owner_id: wf.owner_id,
                  project_id: wf.project_id,
                  current_step: wf.current_step as i32,
                  phase: wf.phase.as_str().to_string(),
                  enabled: wf.enabled,
                  step_config: serde_json::to_value(&wf.step_config)?,
                  step_outputs: serde_json::to_value(&wf.step_outputs)?,
                  last_error: wf.last_error.clone(),
                  version: to_i64(wf.version, "version")?,
                  created_at: wf.created_at,
                  updated_at: wf.updated_at })
    }

    pub fn into_domain(self) -> Result<Workflow, PersistenceError> {
        Ok(Workflow { id: self.id,
                      owner_id: self.owner_id,
                      project_id: self.project_id,
                      current_step: to_u32(self.current_step, "current_step")?,
                      phase: self.phase.parse()?,
                      enabled: self.enabled,
                      step_config: serde_json::from_value(self.step_config)?,
                      step_outputs: StepOutputs::parse(&self.step_outputs)?,
                      last_error: self.last_error,
                      version: to_u64(self.version, "version")?,
                      created_at: self.created_at,
                      updated_at: self.updated_at })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = spaces)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SpaceRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub space_type: String,
    pub include_in_generation: bool,
    pub is_excluded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Space> for SpaceRow {
    fn from(s: &Space) -> Self {
        Self { id: s.id,
               workflow_id: s.workflow_id,
               name: s.name.clone(),
               space_type: s.space_type.clone(),
               include_in_generation: s.include_in_generation,
               is_excluded: s.is_excluded,
               created_at: s.created_at }
    }
}

impl From<SpaceRow> for Space {
    fn from(r: SpaceRow) -> Self {
        Space { id: r.id,
                workflow_id: r.workflow_id,
                name: r.name,
                space_type: r.space_type,
                include_in_generation: r.include_in_generation,
                is_excluded: r.is_excluded,
                created_at: r.created_at }
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug)]
#[diesel(table_name = generation_units)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct UnitRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub space_id: Uuid,
    pub asset_type: String,
    pub slot: String,
    pub status: String,
    pub job_type: String,
    pub attempt_count: i32,
    pub locked_approved: bool,
    pub qa_status: String,
    pub pre_rejection_qa_status: Option<String>,
    pub qa_report: Option<Value>,
    pub prompt_text: Option<String>,
    pub output_ref: Option<String>,
    pub edit_source_ref: Option<String>,
    pub correction_text: Option<String>,
    pub seed: Option<i64>,
    pub retry_patch: Option<Value>,
    pub rejection_history: Value,
    pub last_dispatch_id: Option<Uuid>,
    pub last_error: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnitRow {
    pub fn from_domain(u: &GenerationUnit) -> Result<Self, PersistenceError> {
        Ok(Self { id: u.id,
                  workflow_id: u.workflow_id,
                  space_id: u.space_id,
                  asset_type: u.asset_type.as_str().to_string(),
                  slot: u.slot.as_str().to_string(),
                  status: u.status.as_str().to_string(),
                  job_type: u.job_type.as_str().to_string(),
                  attempt_count: u.attempt_count as i32,
                  locked_approved: u.locked_approved,
                  qa_status: u.qa_status.as_str().to_string(),
                  pre_rejection_qa_status: u.pre_rejection_qa_status.map(|s| s.as_str().to_string()),
                  qa_report: u.qa_report.as_ref().map(serde_json::to_value).transpose()?,
                  prompt_text: u.prompt_text.clone(),
                  output_ref: u.output_ref.clone(),
                  edit_source_ref: u.edit_source_ref.clone(),
                  correction_text: u.correction_text.clone(),
                  seed: u.seed.map(i64::from),
                  retry_patch: u.retry_patch.as_ref().map(serde_json::to_value).transpose()?,
                  rejection_history: serde_json::to_value(&u.rejection_history)?,
                  last_dispatch_id: u.last_dispatch_id,
                  last_error: u.last_error.clone(),
                  version: to_i64(u.version, "version")?,
                  created_at: u.created_at,
                  updated_at: u.updated_at })
    }

    pub fn into_domain(self) -> Result<GenerationUnit, PersistenceError> {
        let seed = self.seed
                       .map(|s| u32::try_from(s).map_err(|_| PersistenceError::InvalidRow(format!("seed out of range: {s}"))))
                       .transpose()?;
        Ok(GenerationUnit { id: self.id,
                            workflow_id: self.workflow_id,
                            space_id: self.space_id,
                            asset_type: self.asset_type.parse()?,
                            slot: self.slot.parse()?,
                            status: self.status.parse()?,
                            job_type: self.job_type.parse()?,
                            attempt_count: to_u32(self.attempt_count, "attempt_count")?,
                            locked_approved: self.locked_approved,
                            qa_status: self.qa_status.parse()?,
                            pre_rejection_qa_status: self.pre_rejection_qa_status.map(|s| s.parse()).transpose()?,
                            qa_report: self.qa_report.map(serde_json::from_value).transpose()?,
                            prompt_text: self.prompt_text,
                            output_ref: self.output_ref,
                            edit_source_ref: self.edit_source_ref,
                            correction_text: self.correction_text,
                            seed,
                            retry_patch: self.retry_patch.map(serde_json::from_value).transpose()?,
                            rejection_history: serde_json::from_value(self.rejection_history)?,
                            last_dispatch_id: self.last_dispatch_id,
                            last_error: self.last_error,
                            version: to_u64(self.version, "version")?,
                            created_at: self.created_at,
                            updated_at: self.updated_at })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = calibration_stats)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CalibrationRow {
    pub owner_id: Uuid,
    pub project_id: Uuid,
    pub step: i32,
    pub category: String,
    pub false_reject_count: i64,
    pub false_approve_count: i64,
    pub confirmed_correct_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl CalibrationRow {
    pub fn into_domain(self) -> Result<CalibrationStat, PersistenceError> {
        Ok(CalibrationStat { key: CalibrationKey { owner_id: self.owner_id,
                                                   project_id: self.project_id,
                                                   step: to_u32(self.step, "step")?,
                                                   category: self.category },
                             false_reject_count: to_u64(self.false_reject_count, "false_reject_count")?,
                             false_approve_count: to_u64(self.false_approve_count, "false_approve_count")?,
                             confirmed_correct_count: to_u64(self.confirmed_correct_count, "confirmed_correct_count")?,
                             updated_at: self.updated_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_domain::{AssetType, CameraSlot, Phase, UnitKey};

    #[test]
    fn workflow_row_roundtrip() {
        let mut wf = Workflow::new(Uuid::new_v4(), Uuid::new_v4());
        wf.phase = Phase::StyleReview;
        wf.current_step = 2;
        wf.version = 7;
        let row = WorkflowRow::from_domain(&wf).unwrap();
        assert_eq!(row.phase, "style_review");
        assert_eq!(row.into_domain().unwrap(), wf);
    }

    #[test]
    fn unit_row_keeps_optional_fields() {
        let mut u = GenerationUnit::new(Uuid::new_v4(),
                                        UnitKey { space_id: Uuid::new_v4(),
                                                  asset_type: AssetType::Panorama,
                                                  slot: CameraSlot::B });
        u.seed = Some(u32::MAX);
        u.output_ref = Some("outputs/p.png".into());
        let row = UnitRow::from_domain(&u).unwrap();
        assert_eq!(row.asset_type, "panorama");
        assert_eq!(row.seed, Some(u32::MAX as i64));
        assert_eq!(row.into_domain().unwrap(), u);
    }

    #[test]
    fn unknown_status_text_is_invalid_row() {
        let u = GenerationUnit::new(Uuid::new_v4(),
                                    UnitKey { space_id: Uuid::new_v4(),
                                              asset_type: AssetType::Render,
                                              slot: CameraSlot::A });
        let mut row = UnitRow::from_domain(&u).unwrap();
        row.status = "done".into();
        assert!(matches!(row.into_domain(), Err(PersistenceError::InvalidRow(_))));
    }
}
