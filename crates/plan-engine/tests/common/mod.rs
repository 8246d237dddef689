//! Helpers compartidos: motor en memoria con colaboradores stub y atajos para
//! llevar un workflow hasta una fase dada usando sólo la API pública.
#![allow(dead_code)]

use serde_json::{json, Map};
use std::sync::Arc;
use uuid::Uuid;

use plan_adapters::stub::StubCollaborators;
use plan_core::{ActionType, InMemoryEventStore, InMemoryWorkflowRepository, UnitRepository, WorkflowEventKind};
use plan_domain::{AssetType, GenerationUnit, StepOutput, Workflow};
use plan_engine::{ActionRequest, EndpointResponse, GenerationResult, SpaceDraft, WorkflowEngine};

pub type Engine = WorkflowEngine<InMemoryWorkflowRepository, InMemoryEventStore>;

pub struct Harness {
    pub engine: Engine,
    pub stubs: StubCollaborators,
}

pub fn harness() -> Harness {
    harness_with(StubCollaborators::default())
}

pub fn harness_with(stubs: StubCollaborators) -> Harness {
    let engine = WorkflowEngine::new(Arc::new(InMemoryWorkflowRepository::new()),
                                     Arc::new(InMemoryEventStore::new()),
                                     stubs.collaborators());
    Harness { engine, stubs }
}

impl Harness {
    pub fn wf(&self, id: Uuid) -> Workflow {
        self.engine.workflow(id).unwrap()
    }

    pub fn units(&self, id: Uuid, asset_type: AssetType) -> Vec<GenerationUnit> {
        self.engine.repository().list_units(id, asset_type).unwrap()
    }

    pub fn event_types(&self, id: Uuid) -> Vec<&'static str> {
        use plan_core::EventStore;
        self.engine
            .event_store()
            .list(id)
            .unwrap()
            .iter()
            .map(|e| e.kind.type_name())
            .collect()
    }

    pub fn events(&self, id: Uuid) -> Vec<WorkflowEventKind> {
        use plan_core::EventStore;
        self.engine.event_store().list(id).unwrap().into_iter().map(|e| e.kind).collect()
    }

    /// Acción pedida desde la fase que el cliente ve ahora mismo.
    pub async fn act(&self, id: Uuid, action: ActionType) -> EndpointResponse {
        let phase = self.wf(id).phase;
        self.engine
            .dispatch(ActionRequest { workflow_id: id,
                                      action,
                                      phase_at_click: phase,
                                      extra_params: Map::new() })
            .await
            .unwrap()
    }

    /// Workflow en `renders_pending` con un espacio activo por nombre.
    pub async fn workflow_at_renders(&self, names: &[&str]) -> Uuid {
        let id = self.engine.create_workflow(Uuid::new_v4(), Uuid::new_v4()).unwrap().id;
        let drafts: Vec<SpaceDraft> = names.iter()
                                           .map(|n| SpaceDraft { name: n.to_string(),
                                                                 space_type: n.to_lowercase() })
                                           .collect();

        self.act(id, ActionType::RunSpaceAnalysis).await;
        self.engine
            .complete_stage_job(id, StepOutput::SpaceAnalysis { space_count: names.len() as u32 }, &drafts)
            .unwrap();
        self.act(id, ActionType::Continue).await;

        self.act(id, ActionType::RunTopDown3d).await;
        self.engine
            .complete_stage_job(id, StepOutput::TopDown3d { output_ref: "plans/top-down.png".into() }, &[])
            .unwrap();
        self.act(id, ActionType::Continue).await;

        self.act(id, ActionType::RunStyle).await;
        self.engine
            .complete_stage_job(id,
                                StepOutput::Style { output_ref: "plans/style.png".into(),
                                                    style_name: Some("scandinavian".into()) },
                                &[])
            .unwrap();
        self.act(id, ActionType::Continue).await;

        self.act(id, ActionType::DetectSpaces).await;
        self.engine
            .complete_stage_job(id, StepOutput::SpaceDetection { detected: names.len() as u32 }, &drafts)
            .unwrap();
        self.act(id, ActionType::ConfirmCameraPlan).await;
        self.act(id, ActionType::Continue).await;
        id
    }

    /// Despacha el lote del step y registra una salida para cada unidad.
    pub async fn run_and_finish(&self, id: Uuid, asset_type: AssetType) {
        let action = match asset_type {
            AssetType::Render => ActionType::RunRenders,
            AssetType::Panorama => ActionType::RunPanoramas,
            AssetType::Final360 => ActionType::RunMerge,
        };
        self.act(id, action).await;
        for unit in self.units(id, asset_type) {
            self.finish(&unit);
        }
    }

    pub fn finish(&self, unit: &GenerationUnit) -> GenerationUnit {
        let unit = self.engine.unit(unit.id).unwrap();
        self.engine
            .record_output(&GenerationResult { asset_id: unit.id,
                                               correlation_id: unit.last_dispatch_id,
                                               output_ref: format!("outputs/{}-{}.png",
                                                                   unit.id,
                                                                   unit.attempt_count) })
            .unwrap()
    }

    pub fn approve_all(&self, id: Uuid, asset_type: AssetType) {
        for unit in self.units(id, asset_type) {
            self.engine.approve(unit.id).unwrap();
        }
    }

    pub async fn workflow_at_renders_review(&self, names: &[&str]) -> Uuid {
        let id = self.workflow_at_renders(names).await;
        self.run_and_finish(id, AssetType::Render).await;
        id
    }

    /// Workflow en la fase de revisión del step de `asset_type`, con los
    /// steps anteriores aprobados y sus lotes terminados.
    pub async fn workflow_at_review(&self, names: &[&str], asset_type: AssetType) -> Uuid {
        let id = self.workflow_at_renders_review(names).await;
        for (done, next) in [(AssetType::Render, AssetType::Panorama), (AssetType::Panorama, AssetType::Final360)] {
            if asset_type == done {
                break;
            }
            self.approve_all(id, done);
            assert!(self.engine.advance(id, done.step()).unwrap().success);
            self.run_and_finish(id, next).await;
        }
        id
    }
}

pub fn qa_report(decision: &str, score: f32) -> serde_json::Value {
    json!({
        "schema": "qa.v1",
        "decision": decision,
        "score": score,
        "issues": [
            { "category": "extra_furniture", "severity": "major", "description": "sofa duplicated" }
        ]
    })
}
