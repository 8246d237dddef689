//! Errores de persistencia.
//! Mapea errores de Diesel / pool a variantes semánticas y de ahí a la
//! taxonomía del core.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use plan_core::CoreEngineError;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("unique violation: {0}")]
    UniqueViolation(String),
    #[error("check violation: {0}")]
    CheckViolation(String),
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),
    #[error("not found")]
    NotFound,
    #[error("serialization conflict (retryable)")]
    SerializationConflict,
    #[error("transient IO / connection pool error: {0}")]
    TransientIo(String),
    #[error("invalid row: {0}")]
    InvalidRow(String),
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("unknown database error: {0}")]
    Unknown(String),
}

/// Fragmentos de mensaje de Postgres que indican un fallo transitorio.
const TRANSIENT_MARKERS: &[&str] = &["deadlock detected",
                                     "could not serialize access",
                                     "connection closed",
                                     "connection refused",
                                     "timeout"];

impl PersistenceError {
    /// Errores transitorios: se reintenta la unidad de trabajo completa.
    pub fn is_retryable(&self) -> bool {
        match self {
            PersistenceError::SerializationConflict | PersistenceError::TransientIo(_) => true,
            PersistenceError::Unknown(msg) => {
                let lower = msg.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
            }
            _ => false,
        }
    }

    fn from_database(kind: DatabaseErrorKind, message: String) -> Self {
        match kind {
            DatabaseErrorKind::UniqueViolation => Self::UniqueViolation(message),
            DatabaseErrorKind::CheckViolation => Self::CheckViolation(message),
            DatabaseErrorKind::ForeignKeyViolation => Self::ForeignKeyViolation(message),
            DatabaseErrorKind::SerializationFailure => Self::SerializationConflict,
            DatabaseErrorKind::ClosedConnection => Self::TransientIo(message),
            other => Self::Unknown(format!("{other:?}: {message}")),
        }
    }
}

impl From<DieselError> for PersistenceError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => Self::NotFound,
            DieselError::DatabaseError(kind, info) => Self::from_database(kind, info.message().to_string()),
            DieselError::DeserializationError(e) => Self::InvalidRow(e.to_string()),
            DieselError::BrokenTransactionManager => Self::TransientIo("transaction manager is broken".into()),
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::InvalidRow(format!("json: {err}"))
    }
}

impl From<plan_domain::DomainError> for PersistenceError {
    fn from(err: plan_domain::DomainError) -> Self {
        PersistenceError::InvalidRow(err.to_string())
    }
}

impl From<PersistenceError> for CoreEngineError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound => CoreEngineError::NotFound("row".into()),
            PersistenceError::CheckViolation(msg) => CoreEngineError::Validation(msg),
            other => CoreEngineError::StorageError(other.to_string()),
        }
    }
}
