//! Contratos de los colaboradores externos: Generator, análisis de rechazos,
//! mejora de prompts y firma de URLs de storage.
//!
//! Son servicios de red; el motor los espera de forma síncrona dentro de cada
//! request. Análisis y prompts son best-effort; un fallo del Generator es
//! fatal para el intento.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use plan_domain::{AssetType, CameraSlot, QualityReport, RejectionAnalysis, RetryPatch, StepConfig};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("collaborator not configured: {0}")]
    NotConfigured(&'static str),
}

/// Acuse del Generator: el job quedó aceptado; el resultado llega después.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    #[serde(default)]
    pub job_id: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GenerationMode {
    Initial,
    Retry { attempt: u32, patch: RetryPatch },
    /// Edición dirigida sobre una salida existente.
    Edit { source_ref: String, source_url: Option<String>, correction: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub correlation_id: Uuid,
    pub workflow_id: Uuid,
    pub asset_id: Uuid,
    pub asset_type: AssetType,
    pub space_id: Uuid,
    pub slot: CameraSlot,
    pub prompt: Option<String>,
    pub config: StepConfig,
    #[serde(flatten)]
    pub mode: GenerationMode,
}

impl GenerationRequest {
    pub fn is_retry(&self) -> bool {
        matches!(self.mode, GenerationMode::Retry { .. })
    }
}

/// Job de un step sin unidades por espacio (0–3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageJobRequest {
    pub correlation_id: Uuid,
    pub workflow_id: Uuid,
    pub step: u32,
    pub config: StepConfig,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub asset_id: Uuid,
    pub asset_type: AssetType,
    pub step: u32,
    pub space_name: Option<String>,
    pub space_type: Option<String>,
    pub rejection_notes: Option<String>,
    pub rejection_category: Option<String>,
    pub prior_qa: Option<QualityReport>,
    pub output_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptImprovementRequest {
    pub asset_id: Uuid,
    pub asset_type: AssetType,
    pub previous_prompt: String,
    pub analysis: Option<RejectionAnalysis>,
    pub rejection_category: Option<String>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<DispatchReceipt, CollaboratorError>;
    async fn start_stage_job(&self, request: &StageJobRequest) -> Result<DispatchReceipt, CollaboratorError>;
}

#[async_trait]
pub trait RejectionAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<RejectionAnalysis, CollaboratorError>;
}

#[async_trait]
pub trait PromptImprover: Send + Sync {
    async fn improve(&self, request: &PromptImprovementRequest) -> Result<String, CollaboratorError>;
}

/// Emite URLs con vencimiento para referencias de storage.
pub trait UrlSigner: Send + Sync {
    fn sign(&self, object_ref: &str) -> Result<String, CollaboratorError>;
}

/// Conjunto de colaboradores que recibe el motor.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub analyzer: Arc<dyn RejectionAnalyzer>,
    pub prompts: Arc<dyn PromptImprover>,
    pub signer: Option<Arc<dyn UrlSigner>>,
}

impl Collaborators {
    /// URL firmada si hay firmador; un fallo de firma no bloquea.
    pub fn signed_url(&self, object_ref: &str) -> Option<String> {
        let signer = self.signer.as_ref()?;
        match signer.sign(object_ref) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("could not sign {object_ref}: {e}");
                None
            }
        }
    }
}
