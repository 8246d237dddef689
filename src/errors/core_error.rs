use thiserror::Error;

use plan_adapters::ConfigError;
use plan_core::{CollaboratorError, CoreEngineError};
use plan_persistence::PersistenceError;

/// Errores de arranque y armado de la aplicación. Los errores de una
/// operación del motor viajan como `CoreEngineError`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Error de configuración: {0}")]
    Config(String),
    #[error("Error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Error de colaborador externo: {0}")]
    Collaborator(#[from] CollaboratorError),
    #[error("Error del motor: {0}")]
    Engine(#[from] CoreEngineError),
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_variant_format() {
        let err: CoreError = ConfigError::Missing("GENERATOR_URL").into();
        assert_eq!(err.to_string(), "Error de configuración: missing environment variable GENERATOR_URL");
    }

    #[test]
    fn test_engine_variant_from() {
        let err: CoreError = CoreEngineError::Validation("x".into()).into();
        assert_eq!(err.to_string(), "Error del motor: validation: x");
    }

    #[test]
    fn test_persistence_variant_from() {
        let err: CoreError = PersistenceError::NotFound.into();
        assert_eq!(err.to_string(), "Error de persistencia: not found");
    }
}
