//! Repositorios en memoria (DashMap). Mismas garantías que los de Postgres:
//! escritura condicional por versión y unicidad de clave de unidad.
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use uuid::Uuid;

use plan_domain::{AssetType, CalibrationKey, CalibrationOutcome, CalibrationStat, GenerationUnit, Space, UnitKey,
                  Workflow};

use super::types::{CalibrationRepository, UnitRepository, WorkflowRepository};
use crate::errors::CoreEngineError;

#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: DashMap<Uuid, Workflow>,
    spaces: DashMap<Uuid, Space>,
    units: DashMap<Uuid, GenerationUnit>,
    unit_keys: DashMap<(Uuid, UnitKey), Uuid>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflict(entity: &str, id: Uuid, expected: u64) -> CoreEngineError {
    CoreEngineError::ConcurrentModification { entity: entity.to_string(),
                                              id,
                                              expected }
}

impl WorkflowRepository for InMemoryWorkflowRepository {
    fn insert_workflow(&self, workflow: &Workflow) -> Result<(), CoreEngineError> {
        match self.workflows.entry(workflow.id) {
            Entry::Occupied(_) => Err(CoreEngineError::StorageError(format!("workflow {} already exists", workflow.id))),
            Entry::Vacant(v) => {
                v.insert(workflow.clone());
                Ok(())
            }
        }
    }

    fn get_workflow(&self, id: Uuid) -> Result<Workflow, CoreEngineError> {
        self.workflows
            .get(&id)
            .map(|w| w.value().clone())
            .ok_or_else(|| CoreEngineError::NotFound(format!("workflow {id}")))
    }

    fn update_workflow(&self, workflow: &Workflow, expected_version: u64) -> Result<Workflow, CoreEngineError> {
        let mut current = self.workflows
                              .get_mut(&workflow.id)
                              .ok_or_else(|| CoreEngineError::NotFound(format!("workflow {}", workflow.id)))?;
        if current.version != expected_version {
            return Err(conflict("workflow", workflow.id, expected_version));
        }
        let mut next = workflow.clone();
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        *current = next.clone();
        Ok(next)
    }

    fn insert_space(&self, space: &Space) -> Result<(), CoreEngineError> {
        if !self.workflows.contains_key(&space.workflow_id) {
            return Err(CoreEngineError::NotFound(format!("workflow {}", space.workflow_id)));
        }
        self.spaces.insert(space.id, space.clone());
        Ok(())
    }

    fn list_spaces(&self, workflow_id: Uuid) -> Result<Vec<Space>, CoreEngineError> {
        let mut spaces: Vec<Space> = self.spaces
                                         .iter()
                                         .filter(|s| s.workflow_id == workflow_id)
                                         .map(|s| s.value().clone())
                                         .collect();
        spaces.sort_by_key(|s| (s.created_at, s.id));
        Ok(spaces)
    }

    fn set_space_flags(&self, space_id: Uuid, include_in_generation: bool, is_excluded: bool)
                       -> Result<Space, CoreEngineError> {
        let mut space = self.spaces
                            .get_mut(&space_id)
                            .ok_or_else(|| CoreEngineError::NotFound(format!("space {space_id}")))?;
        space.include_in_generation = include_in_generation;
        space.is_excluded = is_excluded;
        Ok(space.value().clone())
    }
}

impl UnitRepository for InMemoryWorkflowRepository {
    fn get_unit(&self, id: Uuid) -> Result<GenerationUnit, CoreEngineError> {
        self.units
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or_else(|| CoreEngineError::NotFound(format!("generation unit {id}")))
    }

    fn list_units(&self, workflow_id: Uuid, asset_type: AssetType) -> Result<Vec<GenerationUnit>, CoreEngineError> {
        let mut units: Vec<GenerationUnit> = self.units
                                                 .iter()
                                                 .filter(|u| u.workflow_id == workflow_id && u.asset_type == asset_type)
                                                 .map(|u| u.value().clone())
                                                 .collect();
        units.sort_by_key(|u| (u.created_at, u.key()));
        Ok(units)
    }

    fn insert_units(&self, units: &[GenerationUnit]) -> Result<usize, CoreEngineError> {
        let mut inserted = 0;
        for unit in units {
            // La reserva de la clave es el punto atómico; un duplicado se omite.
            match self.unit_keys.entry((unit.workflow_id, unit.key())) {
                Entry::Occupied(_) => debug!("unit key {:?} already present, skipping", unit.key()),
                Entry::Vacant(v) => {
                    v.insert(unit.id);
                    self.units.insert(unit.id, unit.clone());
                    inserted += 1;
                }
            }
        }
        Ok(inserted)
    }

    fn update_unit(&self, unit: &GenerationUnit, expected_version: u64) -> Result<GenerationUnit, CoreEngineError> {
        let mut current = self.units
                              .get_mut(&unit.id)
                              .ok_or_else(|| CoreEngineError::NotFound(format!("generation unit {}", unit.id)))?;
        if current.version != expected_version {
            return Err(conflict("generation_unit", unit.id, expected_version));
        }
        let mut next = unit.clone();
        next.version = expected_version + 1;
        next.updated_at = Utc::now();
        *current = next.clone();
        Ok(next)
    }
}

#[derive(Default)]
pub struct InMemoryCalibrationRepository {
    stats: DashMap<CalibrationKey, CalibrationStat>,
}

impl InMemoryCalibrationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalibrationRepository for InMemoryCalibrationRepository {
    fn increment(&self, key: &CalibrationKey, outcome: CalibrationOutcome, weight: u64)
                 -> Result<CalibrationStat, CoreEngineError> {
        let stat = match self.stats.entry(key.clone()) {
            Entry::Occupied(mut o) => {
                o.get_mut().apply(outcome, weight);
                o.get().clone()
            }
            Entry::Vacant(v) => v.insert(CalibrationStat::seeded(key.clone(), outcome, weight)).value().clone(),
        };
        Ok(stat)
    }

    fn get(&self, key: &CalibrationKey) -> Result<Option<CalibrationStat>, CoreEngineError> {
        Ok(self.stats.get(key).map(|s| s.value().clone()))
    }

    fn list_for_project(&self, owner_id: Uuid, project_id: Uuid) -> Result<Vec<CalibrationStat>, CoreEngineError> {
        let mut stats: Vec<CalibrationStat> = self.stats
                                                  .iter()
                                                  .filter(|s| s.key.owner_id == owner_id && s.key.project_id == project_id)
                                                  .map(|s| s.value().clone())
                                                  .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan_domain::CameraSlot;

    fn repo_with_workflow() -> (InMemoryWorkflowRepository, Workflow) {
        let repo = InMemoryWorkflowRepository::new();
        let wf = Workflow::new(Uuid::new_v4(), Uuid::new_v4());
        repo.insert_workflow(&wf).unwrap();
        (repo, wf)
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let (repo, wf) = repo_with_workflow();
        let saved = repo.update_workflow(&wf, 0).unwrap();
        assert_eq!(saved.version, 1);
        let err = repo.update_workflow(&wf, 0).unwrap_err();
        assert!(matches!(err, CoreEngineError::ConcurrentModification { expected: 0, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn duplicate_unit_keys_are_skipped() {
        let (repo, wf) = repo_with_workflow();
        let key = UnitKey { space_id: Uuid::new_v4(),
                            asset_type: AssetType::Render,
                            slot: CameraSlot::A };
        let first = GenerationUnit::new(wf.id, key);
        let dup = GenerationUnit::new(wf.id, key);
        assert_eq!(repo.insert_units(&[first, dup]).unwrap(), 1);
        assert_eq!(repo.list_units(wf.id, AssetType::Render).unwrap().len(), 1);
        assert!(repo.list_units(wf.id, AssetType::Panorama).unwrap().is_empty());
    }

    #[test]
    fn calibration_increment_accumulates() {
        let repo = InMemoryCalibrationRepository::new();
        let key = CalibrationKey { owner_id: Uuid::new_v4(),
                                   project_id: Uuid::new_v4(),
                                   step: 4,
                                   category: "wrong_room".into() };
        repo.increment(&key, CalibrationOutcome::FalseApprove, 2).unwrap();
        let stat = repo.increment(&key, CalibrationOutcome::FalseApprove, 1).unwrap();
        assert_eq!(stat.false_approve_count, 3);
        assert_eq!(repo.list_for_project(key.owner_id, key.project_id).unwrap().len(), 1);
        assert!(repo.get(&CalibrationKey { step: 5, ..key.clone() }).unwrap().is_none());
    }
}
