//! plan-policies: decisiones puras del motor de rechazos.
//!
//! Tabla canónica de categorías de falla, patch de reintento acotado,
//! selección edición/reintento y clasificación de calibración. Nada de esto
//! toca almacenamiento ni red.
pub mod calibration;
pub mod categories;
pub mod patch;
pub mod path;

pub use calibration::{calibration_weight, classify_vote};
pub use categories::{instruction_for, normalize_category};
pub use patch::{params_hash, BoundedPatchPolicy, EntrySource, PatchDecision, PatchInputs, PatchParams,
                RetryPatchPolicy};
pub use path::{select_path, PathInput};
