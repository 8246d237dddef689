// step_outputs.rs
//! Salidas por step del workflow, con discriminante `kind` y versión de
//! esquema. Reemplaza el blob JSON libre: se valida al entrar.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::unit::AssetType;
use crate::DomainError;

pub const STEP_OUTPUTS_SCHEMA: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
    SpaceAnalysis { space_count: u32 },
    TopDown3d { output_ref: String },
    Style { output_ref: String, style_name: Option<String> },
    SpaceDetection { detected: u32 },
    CameraPlan { cameras: u32, confirmed: bool },
    Batch { asset_type: AssetType, created: u32 },
}

impl StepOutput {
    /// Step al que puede pertenecer la salida.
    pub fn step(&self) -> u32 {
        match self {
            StepOutput::SpaceAnalysis { .. } => 0,
            StepOutput::TopDown3d { .. } => 1,
            StepOutput::Style { .. } => 2,
            StepOutput::SpaceDetection { .. } | StepOutput::CameraPlan { .. } => 3,
            StepOutput::Batch { asset_type, .. } => asset_type.step(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutputs {
    pub schema_version: u32,
    #[serde(default)]
    pub entries: BTreeMap<u32, StepOutput>,
}

impl Default for StepOutputs {
    fn default() -> Self {
        Self { schema_version: STEP_OUTPUTS_SCHEMA,
               entries: BTreeMap::new() }
    }
}

impl StepOutputs {
    pub fn parse(value: &serde_json::Value) -> Result<Self, DomainError> {
        let outputs: StepOutputs = serde_json::from_value(value.clone())?;
        if outputs.schema_version != STEP_OUTPUTS_SCHEMA {
            return Err(DomainError::UnsupportedSchema { kind: "step_outputs",
                                                        version: outputs.schema_version.to_string() });
        }
        for (step, output) in &outputs.entries {
            if output.step() != *step {
                return Err(DomainError::ValidationError(format!("salida de step {} registrada en step {}",
                                                                output.step(),
                                                                step)));
            }
        }
        Ok(outputs)
    }

    pub fn record(&mut self, output: StepOutput) {
        self.entries.insert(output.step(), output);
    }

    pub fn get(&self, step: u32) -> Option<&StepOutput> {
        self.entries.get(&step)
    }
}
