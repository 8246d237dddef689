//! Configuración central de la aplicación.
//! Carga `.env` una vez y agrega la configuración de servicios externos y la
//! de base de datos (opcional: sin `DATABASE_URL` se corre en memoria).
use plan_adapters::ServiceConfig;
use plan_persistence::{init_dotenv, DbConfig};

use crate::errors::CoreError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub services: ServiceConfig,
    /// `None` → repositorios en memoria.
    pub database: Option<DbConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, CoreError> {
        init_dotenv();
        let services = ServiceConfig::from_env()?;
        let database = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => Some(DbConfig::from_env()?),
            _ => None,
        };
        Ok(Self { services, database })
    }

    pub fn uses_database(&self) -> bool {
        self.database.is_some()
    }
}
