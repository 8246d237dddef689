// space.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DomainError;

/// Sub-unidad del workflow (un ambiente del plano). Se crea en el análisis
/// inicial; después sólo cambian las banderas de participación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub space_type: String,
    pub include_in_generation: bool,
    pub is_excluded: bool,
    pub created_at: DateTime<Utc>,
}

impl Space {
    pub fn new(workflow_id: Uuid, name: impl Into<String>, space_type: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError("Un espacio necesita nombre".to_string()));
        }
        Ok(Space { id: Uuid::new_v4(),
                   workflow_id,
                   name,
                   space_type: space_type.into(),
                   include_in_generation: true,
                   is_excluded: false,
                   created_at: Utc::now() })
    }

    /// Participa en los steps de generación.
    pub fn is_active(&self) -> bool {
        self.include_in_generation && !self.is_excluded
    }
}
