// error.rs
use thiserror::Error;

/// Error del dominio de generación (validación de entidades y de blobs JSON).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Error de validación: {0}")]
    ValidationError(String),

    #[error("Valor desconocido para {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Versión de esquema no soportada para {kind}: {version}")]
    UnsupportedSchema { kind: &'static str, version: String },

    #[error("Error de serialización: {0}")]
    SerializationError(String),
}

// Conversión desde serde_json::Error a DomainError
impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_value_format() {
        let err = DomainError::UnknownValue { kind: "phase", value: "nope".into() };
        assert_eq!(err.to_string(), "Valor desconocido para phase: nope");
    }

    #[test]
    fn serde_error_is_mapped() {
        let raw: Result<u32, _> = serde_json::from_str("\"x\"");
        let err: DomainError = raw.unwrap_err().into();
        assert!(matches!(err, DomainError::SerializationError(_)));
    }
}
