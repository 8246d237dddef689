use chrono::Utc;
use diesel::prelude::*;
use log::debug;
use uuid::Uuid;

use plan_core::{CoreEngineError, UnitRepository, WorkflowRepository};
use plan_domain::{AssetType, GenerationUnit, Space, Workflow};

use super::rows::{SpaceRow, UnitRow, WorkflowRow};
use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{generation_units, spaces, workflows};

/// Workflows, espacios y unidades de generación sobre Postgres.
pub struct PgWorkflowRepository<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgWorkflowRepository<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

fn conflict(entity: &str, id: Uuid, expected: u64) -> CoreEngineError {
    CoreEngineError::ConcurrentModification { entity: entity.to_string(),
                                              id,
                                              expected }
}

fn not_found(entity: &str, id: Uuid) -> impl Fn(PersistenceError) -> CoreEngineError + '_ {
    move |e| match e {
        PersistenceError::NotFound => CoreEngineError::NotFound(format!("{entity} {id}")),
        other => other.into(),
    }
}

impl<P: ConnectionProvider> WorkflowRepository for PgWorkflowRepository<P> {
    fn insert_workflow(&self, workflow: &Workflow) -> Result<(), CoreEngineError> {
        let row = WorkflowRow::from_domain(workflow)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(workflows::table).values(&row)
                                                 .execute(&mut conn)
                                                 .map_err(PersistenceError::from)
        })?;
        Ok(())
    }

    fn get_workflow(&self, id: Uuid) -> Result<Workflow, CoreEngineError> {
        let row: WorkflowRow = with_retry(|| {
                                   let mut conn = self.provider.connection()?;
                                   workflows::table.find(id)
                                                   .select(WorkflowRow::as_select())
                                                   .first(&mut conn)
                                                   .map_err(PersistenceError::from)
                               }).map_err(not_found("workflow", id))?;
        Ok(row.into_domain()?)
    }

    fn update_workflow(&self, workflow: &Workflow, expected_version: u64) -> Result<Workflow, CoreEngineError> {
        let mut row = WorkflowRow::from_domain(workflow)?;
        row.version = i64::try_from(expected_version + 1).map_err(|_| CoreEngineError::Internal("version overflow".into()))?;
        row.updated_at = Utc::now();
        let expected = expected_version as i64;
        let updated: Option<WorkflowRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(workflows::table.filter(workflows::id.eq(workflow.id))
                                           .filter(workflows::version.eq(expected)))
                .set(&row)
                .returning(WorkflowRow::as_returning())
                .get_result(&mut conn)
                .optional()
                .map_err(PersistenceError::from)
        })?;
        match updated {
            Some(saved) => Ok(saved.into_domain()?),
            None => {
                // distingue fila inexistente de versión vieja
                self.get_workflow(workflow.id)?;
                debug!("update_workflow conflict id={} expected={expected_version}", workflow.id);
                Err(conflict("workflow", workflow.id, expected_version))
            }
        }
    }

    fn insert_space(&self, space: &Space) -> Result<(), CoreEngineError> {
        let row = SpaceRow::from(space);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(spaces::table).values(&row)
                                              .execute(&mut conn)
                                              .map_err(PersistenceError::from)
        })?;
        Ok(())
    }

    fn list_spaces(&self, workflow_id: Uuid) -> Result<Vec<Space>, CoreEngineError> {
        let rows: Vec<SpaceRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            spaces::table.filter(spaces::workflow_id.eq(workflow_id))
                         .order((spaces::created_at.asc(), spaces::id.asc()))
                         .select(SpaceRow::as_select())
                         .load(&mut conn)
                         .map_err(PersistenceError::from)
        })?;
        Ok(rows.into_iter().map(Space::from).collect())
    }

    fn set_space_flags(&self, space_id: Uuid, include_in_generation: bool, is_excluded: bool)
                       -> Result<Space, CoreEngineError> {
        let row: SpaceRow = with_retry(|| {
                                let mut conn = self.provider.connection()?;
                                diesel::update(spaces::table.find(space_id))
                                    .set((spaces::include_in_generation.eq(include_in_generation),
                                          spaces::is_excluded.eq(is_excluded)))
                                    .returning(SpaceRow::as_returning())
                                    .get_result(&mut conn)
                                    .map_err(PersistenceError::from)
                            }).map_err(not_found("space", space_id))?;
        Ok(row.into())
    }
}

impl<P: ConnectionProvider> UnitRepository for PgWorkflowRepository<P> {
    fn get_unit(&self, id: Uuid) -> Result<GenerationUnit, CoreEngineError> {
        let row: UnitRow = with_retry(|| {
                               let mut conn = self.provider.connection()?;
                               generation_units::table.find(id)
                                                      .select(UnitRow::as_select())
                                                      .first(&mut conn)
                                                      .map_err(PersistenceError::from)
                           }).map_err(not_found("unit", id))?;
        Ok(row.into_domain()?)
    }

    fn list_units(&self, workflow_id: Uuid, asset_type: AssetType) -> Result<Vec<GenerationUnit>, CoreEngineError> {
        let rows: Vec<UnitRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            generation_units::table.filter(generation_units::workflow_id.eq(workflow_id))
                                   .filter(generation_units::asset_type.eq(asset_type.as_str()))
                                   .order((generation_units::created_at.asc(), generation_units::slot.asc()))
                                   .select(UnitRow::as_select())
                                   .load(&mut conn)
                                   .map_err(PersistenceError::from)
        })?;
        rows.into_iter()
            .map(|r| r.into_domain().map_err(CoreEngineError::from))
            .collect()
    }

    fn insert_units(&self, units: &[GenerationUnit]) -> Result<usize, CoreEngineError> {
        if units.is_empty() {
            return Ok(0);
        }
        let rows = units.iter().map(UnitRow::from_domain).collect::<Result<Vec<_>, _>>()?;
        let inserted = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(generation_units::table)
                .values(&rows)
                .on_conflict((generation_units::workflow_id,
                              generation_units::space_id,
                              generation_units::asset_type,
                              generation_units::slot))
                .do_nothing()
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        })?;
        debug!("insert_units requested={} inserted={inserted}", units.len());
        Ok(inserted)
    }

    fn update_unit(&self, unit: &GenerationUnit, expected_version: u64) -> Result<GenerationUnit, CoreEngineError> {
        let mut row = UnitRow::from_domain(unit)?;
        row.version = i64::try_from(expected_version + 1).map_err(|_| CoreEngineError::Internal("version overflow".into()))?;
        row.updated_at = Utc::now();
        let expected = expected_version as i64;
        let updated: Option<UnitRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(generation_units::table.filter(generation_units::id.eq(unit.id))
                                                  .filter(generation_units::version.eq(expected)))
                .set(&row)
                .returning(UnitRow::as_returning())
                .get_result(&mut conn)
                .optional()
                .map_err(PersistenceError::from)
        })?;
        match updated {
            Some(saved) => Ok(saved.into_domain()?),
            None => {
                self.get_unit(unit.id)?;
                debug!("update_unit conflict id={} expected={expected_version}", unit.id);
                Err(conflict("unit", unit.id, expected_version))
            }
        }
    }
}
