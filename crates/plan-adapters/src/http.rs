//! Clientes HTTP (reqwest) de los servicios externos.
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use plan_core::{AnalysisRequest, CollaboratorError, DispatchReceipt, GenerationRequest, Generator,
                PromptImprovementRequest, PromptImprover, RejectionAnalyzer, StageJobRequest};
use plan_domain::RejectionAnalysis;

use crate::config::ServiceConfig;

/// Cliente base: URL, token opcional y timeout compartidos.
#[derive(Clone)]
struct ServiceClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ServiceClient {
    fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder().timeout(timeout)
                                      .build()
                                      .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        Ok(Self { client,
                  base_url: base_url.trim_end_matches('/').to_string(),
                  api_key })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let req = self.client.post(format!("{}/{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send_json<B, T>(&self, path: &str, body: &B) -> Result<T, CollaboratorError>
        where B: Serialize + ?Sized + Sync,
              T: DeserializeOwned
    {
        debug!("POST {}/{}", self.base_url, path);
        let response = self.post(path)
                           .json(body)
                           .send()
                           .await
                           .map_err(|e| CollaboratorError::Transport(e.to_string()))?;
        let response = check_status(response).await?;
        response.json::<T>()
                .await
                .map_err(|e| CollaboratorError::Decode(e.to_string()))
    }
}

async fn check_status(response: Response) -> Result<Response, CollaboratorError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Status { status, body })
}

#[derive(Debug, Deserialize)]
struct ReceiptBody {
    #[serde(default)]
    job_id: Option<String>,
}

impl From<ReceiptBody> for DispatchReceipt {
    fn from(body: ReceiptBody) -> Self {
        DispatchReceipt { job_id: body.job_id,
                          accepted_at: Utc::now() }
    }
}

pub struct HttpGenerator {
    inner: ServiceClient,
}

impl HttpGenerator {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self { inner: ServiceClient::new(base_url, api_key, timeout)? })
    }

    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, CollaboratorError> {
        Self::new(&cfg.generator_url, cfg.api_key.clone(), cfg.timeout)
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<DispatchReceipt, CollaboratorError> {
        let path = format!("{}/generate", request.asset_type.as_str());
        let body: ReceiptBody = self.inner.send_json(&path, request).await?;
        Ok(body.into())
    }

    async fn start_stage_job(&self, request: &StageJobRequest) -> Result<DispatchReceipt, CollaboratorError> {
        let path = format!("stages/{}/jobs", request.step);
        let body: ReceiptBody = self.inner.send_json(&path, request).await?;
        Ok(body.into())
    }
}

pub struct HttpRejectionAnalyzer {
    inner: ServiceClient,
}

impl HttpRejectionAnalyzer {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self { inner: ServiceClient::new(base_url, api_key, timeout)? })
    }

    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, CollaboratorError> {
        Self::new(&cfg.analysis_url, cfg.api_key.clone(), cfg.timeout)
    }
}

#[async_trait]
impl RejectionAnalyzer for HttpRejectionAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<RejectionAnalysis, CollaboratorError> {
        self.inner.send_json("analyze-rejection", request).await
    }
}

#[derive(Debug, Deserialize)]
struct ImprovedPrompt {
    prompt: String,
}

pub struct HttpPromptImprover {
    inner: ServiceClient,
}

impl HttpPromptImprover {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self { inner: ServiceClient::new(base_url, api_key, timeout)? })
    }

    pub fn from_config(cfg: &ServiceConfig) -> Result<Self, CollaboratorError> {
        Self::new(&cfg.prompt_url, cfg.api_key.clone(), cfg.timeout)
    }
}

#[async_trait]
impl PromptImprover for HttpPromptImprover {
    async fn improve(&self, request: &PromptImprovementRequest) -> Result<String, CollaboratorError> {
        let body: ImprovedPrompt = self.inner.send_json("improve-prompt", request).await?;
        Ok(body.prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let g = HttpGenerator::new("http://gen.local///", None, Duration::from_secs(5)).unwrap();
        assert_eq!(g.inner.base_url, "http://gen.local");
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let a = HttpRejectionAnalyzer::new("http://127.0.0.1:9", None, Duration::from_millis(300)).unwrap();
        let req = AnalysisRequest { asset_id: uuid::Uuid::new_v4(),
                                    asset_type: plan_domain::AssetType::Render,
                                    step: 4,
                                    space_name: None,
                                    space_type: None,
                                    rejection_notes: None,
                                    rejection_category: None,
                                    prior_qa: None,
                                    output_url: None };
        assert!(matches!(a.analyze(&req).await, Err(CollaboratorError::Transport(_))));
    }
}
