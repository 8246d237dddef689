//! Colaboradores en memoria para tests y modo local.
//!
//! Registran cada llamada para poder afirmar si el Generator fue (o no)
//! invocado, y permiten guionar fallos.
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use plan_core::{AnalysisRequest, CollaboratorError, Collaborators, DispatchReceipt, GenerationRequest, Generator,
                PromptImprovementRequest, PromptImprover, RejectionAnalyzer, StageJobRequest, UrlSigner};
use plan_domain::RejectionAnalysis;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
pub struct RecordingGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
    stage_jobs: Mutex<Vec<StageJobRequest>>,
    failing: AtomicBool,
}

impl RecordingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A partir de ahora todas las llamadas fallan (o dejan de fallar).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn stage_jobs(&self) -> Vec<StageJobRequest> {
        lock(&self.stage_jobs).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len() + lock(&self.stage_jobs).len()
    }

    fn receipt(&self, n: usize) -> Result<DispatchReceipt, CollaboratorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Status { status: 503,
                                                   body: "generator unavailable".into() });
        }
        Ok(DispatchReceipt { job_id: Some(format!("job-{n}")),
                             accepted_at: Utc::now() })
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<DispatchReceipt, CollaboratorError> {
        let n = {
            let mut calls = lock(&self.requests);
            calls.push(request.clone());
            calls.len()
        };
        self.receipt(n)
    }

    async fn start_stage_job(&self, request: &StageJobRequest) -> Result<DispatchReceipt, CollaboratorError> {
        let n = {
            let mut calls = lock(&self.stage_jobs);
            calls.push(request.clone());
            calls.len()
        };
        self.receipt(n)
    }
}

/// Devuelve las respuestas guionadas en orden; agotado el guion, repite la
/// respuesta por defecto.
pub struct ScriptedAnalyzer {
    script: Mutex<VecDeque<Result<RejectionAnalysis, CollaboratorError>>>,
    fallback: Result<RejectionAnalysis, CollaboratorError>,
    calls: AtomicUsize,
}

impl ScriptedAnalyzer {
    pub fn returning(analysis: RejectionAnalysis) -> Self {
        Self { script: Mutex::new(VecDeque::new()),
               fallback: Ok(analysis),
               calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { script: Mutex::new(VecDeque::new()),
               fallback: Err(CollaboratorError::Status { status: 500,
                                                         body: "analysis failed".into() }),
               calls: AtomicUsize::new(0) }
    }

    pub fn then(self, response: Result<RejectionAnalysis, CollaboratorError>) -> Self {
        lock(&self.script).push_back(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedAnalyzer {
    fn default() -> Self {
        Self::returning(RejectionAnalysis::default())
    }
}

#[async_trait]
impl RejectionAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<RejectionAnalysis, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.script).pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Agrega un sufijo fijo al prompt previo, o falla.
pub struct ScriptedPromptImprover {
    suffix: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedPromptImprover {
    pub fn appending(suffix: impl Into<String>) -> Self {
        Self { suffix: Some(suffix.into()),
               calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { suffix: None,
               calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromptImprover for ScriptedPromptImprover {
    async fn improve(&self, request: &PromptImprovementRequest) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.suffix {
            Some(suffix) => Ok(format!("{} {}", request.previous_prompt, suffix)),
            None => Err(CollaboratorError::Transport("prompt service unreachable".into())),
        }
    }
}

/// Firmador trivial: `stub://<ref>`.
pub struct PassthroughSigner;

impl UrlSigner for PassthroughSigner {
    fn sign(&self, object_ref: &str) -> Result<String, CollaboratorError> {
        Ok(format!("stub://{object_ref}"))
    }
}

/// Set de stubs con handles tipados para inspeccionarlos desde los tests.
#[derive(Clone)]
pub struct StubCollaborators {
    pub generator: Arc<RecordingGenerator>,
    pub analyzer: Arc<ScriptedAnalyzer>,
    pub prompts: Arc<ScriptedPromptImprover>,
}

impl StubCollaborators {
    pub fn new(analyzer: ScriptedAnalyzer, prompts: ScriptedPromptImprover) -> Self {
        Self { generator: Arc::new(RecordingGenerator::new()),
               analyzer: Arc::new(analyzer),
               prompts: Arc::new(prompts) }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators { generator: self.generator.clone(),
                        analyzer: self.analyzer.clone(),
                        prompts: self.prompts.clone(),
                        signer: Some(Arc::new(PassthroughSigner)) }
    }
}

impl Default for StubCollaborators {
    fn default() -> Self {
        Self::new(ScriptedAnalyzer::default(), ScriptedPromptImprover::appending("(refined)"))
    }
}
