//! Contratos de almacenamiento del motor.
//!
//! Las escrituras de `Workflow` y `GenerationUnit` son condicionales: se
//! aplican sólo si la versión persistida coincide con `expected_version` y
//! devuelven el registro con la versión incrementada. Si no coincide:
//! `CoreEngineError::ConcurrentModification`.
use uuid::Uuid;

use plan_domain::{AssetType, CalibrationKey, CalibrationOutcome, CalibrationStat, GenerationUnit, Space, Workflow};

use crate::errors::CoreEngineError;

pub trait WorkflowRepository: Send + Sync {
    fn insert_workflow(&self, workflow: &Workflow) -> Result<(), CoreEngineError>;
    fn get_workflow(&self, id: Uuid) -> Result<Workflow, CoreEngineError>;
    fn update_workflow(&self, workflow: &Workflow, expected_version: u64) -> Result<Workflow, CoreEngineError>;

    fn insert_space(&self, space: &Space) -> Result<(), CoreEngineError>;
    fn list_spaces(&self, workflow_id: Uuid) -> Result<Vec<Space>, CoreEngineError>;
    fn set_space_flags(&self, space_id: Uuid, include_in_generation: bool, is_excluded: bool)
                       -> Result<Space, CoreEngineError>;
}

pub trait UnitRepository: Send + Sync {
    fn get_unit(&self, id: Uuid) -> Result<GenerationUnit, CoreEngineError>;
    fn list_units(&self, workflow_id: Uuid, asset_type: AssetType) -> Result<Vec<GenerationUnit>, CoreEngineError>;
    /// Inserta las unidades cuya clave no exista todavía; devuelve cuántas
    /// se insertaron.
    fn insert_units(&self, units: &[GenerationUnit]) -> Result<usize, CoreEngineError>;
    fn update_unit(&self, unit: &GenerationUnit, expected_version: u64) -> Result<GenerationUnit, CoreEngineError>;
}

pub trait CalibrationRepository: Send + Sync {
    /// Upsert atómico: suma `weight` al contador de `outcome`, creando la
    /// fila si no existe.
    fn increment(&self, key: &CalibrationKey, outcome: CalibrationOutcome, weight: u64)
                 -> Result<CalibrationStat, CoreEngineError>;
    fn get(&self, key: &CalibrationKey) -> Result<Option<CalibrationStat>, CoreEngineError>;
    fn list_for_project(&self, owner_id: Uuid, project_id: Uuid) -> Result<Vec<CalibrationStat>, CoreEngineError>;
}
