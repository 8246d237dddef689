//! Constantes del motor core.
//!
//! `CONTRACT_VERSION` entra en el fingerprint de la tabla de fases: cambiarlo
//! (o cambiar la tabla) produce un fingerprint distinto en el siguiente
//! deploy.

/// Versión lógica de la tabla de fases + guard de endpoints.
pub const CONTRACT_VERSION: &str = "phases.v1";

/// Presupuesto fijo de reintentos completos por unidad de generación.
pub const MAX_ATTEMPTS: u32 = 5;

/// Máximo de restricciones aprendidas que entran a un patch de reintento.
pub const MAX_LEARNED_CONSTRAINTS: usize = 2;

/// Largo máximo (en caracteres) de cada restricción aprendida.
pub const LEARNED_CONSTRAINT_MAX_CHARS: usize = 160;

/// Debajo de este score humano, un desacuerdo sobre una aprobación pesa doble.
pub const STRONG_DISAGREEMENT_SCORE: f32 = 40.0;
