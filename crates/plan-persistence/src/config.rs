//! Configuración de conexión desde variables de entorno (`DATABASE_URL` y
//! tamaños opcionales del pool).

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;

use crate::error::PersistenceError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

fn pool_size(name: &str, default: u32) -> u32 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").map_err(|_| PersistenceError::Configuration("DATABASE_URL no definido".into()))?;
        Ok(Self { url,
                  min_connections: pool_size("DATABASE_MIN_CONNECTIONS", 2),
                  max_connections: pool_size("DATABASE_MAX_CONNECTIONS", 16) })
    }

    /// `None` si no hay base configurada (modo en memoria).
    pub fn from_env_optional() -> Option<Self> {
        Self::from_env().ok()
    }
}

pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
