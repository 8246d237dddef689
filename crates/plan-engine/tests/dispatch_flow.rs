mod common;

use serde_json::{json, Map};
use uuid::Uuid;

use common::harness;
use plan_core::{ActionType, CoreEngineError};
use plan_domain::{AssetType, Phase, StepOutput};
use plan_engine::{ActionRequest, EndpointResponse, GenerationResult};

fn request(id: Uuid, action: ActionType, phase: Phase) -> ActionRequest {
    ActionRequest { workflow_id: id,
                    action,
                    phase_at_click: phase,
                    extra_params: Map::new() }
}

#[tokio::test]
async fn upload_to_completed() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen", "Bath"]).await;
    h.approve_all(id, AssetType::Render);
    h.act(id, ActionType::Continue).await;
    assert_eq!(h.wf(id).phase, Phase::PanoramasPending);

    h.run_and_finish(id, AssetType::Panorama).await;
    assert_eq!(h.wf(id).phase, Phase::PanoramasReview);
    h.approve_all(id, AssetType::Panorama);
    h.act(id, ActionType::Continue).await;
    assert_eq!(h.wf(id).phase, Phase::MergingPending);
    assert_eq!(h.units(id, AssetType::Final360).len(), 2);

    h.run_and_finish(id, AssetType::Final360).await;
    assert_eq!(h.wf(id).phase, Phase::MergingReview);
    h.approve_all(id, AssetType::Final360);
    let resp = h.act(id, ActionType::Continue).await;
    let EndpointResponse::Advanced(outcome) = resp else {
        panic!("expected advance, got {resp:?}");
    };
    assert_eq!(outcome.action_taken.as_deref(), Some("completed"));

    let wf = h.wf(id);
    assert_eq!(wf.phase, Phase::Completed);
    assert_eq!(wf.current_step, 7);
    assert!(matches!(wf.step_outputs.get(6), Some(StepOutput::Batch { created: 2, .. })));
    assert!(matches!(h.act(id, ActionType::NoAction).await, EndpointResponse::NoAction { phase: Phase::Completed }));
    // 4 renders + 4 panoramas + 2 merges
    assert_eq!(h.stubs.generator.requests().len(), 10);
}

#[tokio::test]
async fn stale_click_is_stopped_by_the_guard() {
    let h = harness();
    let id = h.workflow_at_renders(&["Kitchen"]).await;
    h.act(id, ActionType::RunRenders).await;
    assert_eq!(h.wf(id).phase, Phase::RendersInProgress);

    let err = h.engine
               .dispatch(request(id, ActionType::RunRenders, Phase::RendersPending))
               .await
               .unwrap_err();
    assert!(matches!(err, CoreEngineError::Validation(msg) if msg.contains("renders_in_progress")));
    assert_eq!(h.stubs.generator.requests().len(), 2);
}

#[tokio::test]
async fn mismatched_action_never_reaches_a_handler() {
    let h = harness();
    let id = h.workflow_at_renders(&["Kitchen"]).await;
    let err = h.engine
               .dispatch(request(id, ActionType::RunMerge, Phase::RendersPending))
               .await
               .unwrap_err();
    assert!(matches!(err, CoreEngineError::Validation(_)));
    assert_eq!(h.wf(id).phase, Phase::RendersPending);
}

#[tokio::test]
async fn stale_continue_reports_outdated() {
    let h = harness();
    let id = h.workflow_at_renders(&["Kitchen"]).await;
    let resp = h.engine
                .dispatch(request(id, ActionType::Continue, Phase::CameraPlanConfirmed))
                .await
                .unwrap();
    let EndpointResponse::Advanced(outcome) = resp else {
        panic!("expected advance outcome");
    };
    assert!(!outcome.success);
    assert_eq!(outcome.to_error(id),
               Some(CoreEngineError::OutdatedTransition { from_step: 3, current_step: 4 }));
}

#[tokio::test]
async fn job_status_counts_units_by_state() {
    let h = harness();
    let id = h.workflow_at_renders(&["Kitchen", "Bath"]).await;
    h.act(id, ActionType::RunRenders).await;
    let first = h.units(id, AssetType::Render).remove(0);
    h.finish(&first);

    let resp = h.act(id, ActionType::AwaitJob).await;
    let EndpointResponse::JobStatus(report) = resp else {
        panic!("expected job status");
    };
    assert_eq!(report.step, 4);
    assert_eq!(report.units.get("completed"), Some(&1));
    assert_eq!(report.units.get("running"), Some(&3));
}

#[tokio::test]
async fn batch_reports_failed_dispatches() {
    let h = harness();
    let id = h.workflow_at_renders(&["Kitchen"]).await;
    h.stubs.generator.set_failing(true);
    let resp = h.act(id, ActionType::RunRenders).await;
    let EndpointResponse::BatchStarted { dispatched, failed, .. } = resp else {
        panic!("expected batch response");
    };
    assert_eq!(dispatched, 0);
    assert_eq!(failed.len(), 2);
    for unit in h.units(id, AssetType::Render) {
        assert_eq!(unit.status, plan_domain::UnitStatus::Failed);
        assert_eq!(unit.attempt_count, 0);
    }
}

#[tokio::test]
async fn stale_generation_result_is_refused() {
    let h = harness();
    let id = h.workflow_at_renders(&["Kitchen"]).await;
    h.act(id, ActionType::RunRenders).await;
    let unit = h.units(id, AssetType::Render).remove(0);
    let err = h.engine
               .record_output(&GenerationResult { asset_id: unit.id,
                                                  correlation_id: Some(Uuid::new_v4()),
                                                  output_ref: "outputs/late.png".into() })
               .unwrap_err();
    assert!(matches!(err, CoreEngineError::Validation(_)));
    assert_eq!(h.engine.unit(unit.id).unwrap().output_ref, None);
}

#[tokio::test]
async fn camera_plan_accepts_explicit_counts() {
    let h = harness();
    let id = h.engine.create_workflow(Uuid::new_v4(), Uuid::new_v4()).unwrap().id;
    h.act(id, ActionType::RunSpaceAnalysis).await;
    let err = h.engine
               .complete_stage_job(id, StepOutput::TopDown3d { output_ref: "x".into() }, &[])
               .unwrap_err();
    assert!(matches!(err, CoreEngineError::Validation(_)));

    h.engine
     .complete_stage_job(id,
                         StepOutput::SpaceAnalysis { space_count: 1 },
                         &[plan_engine::SpaceDraft { name: "Kitchen".into(),
                                                     space_type: "kitchen".into() }])
     .unwrap();
    for action in [ActionType::Continue, ActionType::RunTopDown3d] {
        h.act(id, action).await;
    }
    h.engine
     .complete_stage_job(id, StepOutput::TopDown3d { output_ref: "td.png".into() }, &[])
     .unwrap();
    h.act(id, ActionType::Continue).await;
    h.act(id, ActionType::RunStyle).await;
    h.engine
     .complete_stage_job(id, StepOutput::Style { output_ref: "s.png".into(), style_name: None }, &[])
     .unwrap();
    h.act(id, ActionType::Continue).await;
    h.act(id, ActionType::DetectSpaces).await;
    h.engine
     .complete_stage_job(id, StepOutput::SpaceDetection { detected: 1 }, &[])
     .unwrap();

    let mut extra = Map::new();
    extra.insert("cameras".into(), json!(3));
    extra.insert("confirmed".into(), json!(false));
    let resp = h.engine
                .dispatch(ActionRequest { workflow_id: id,
                                          action: ActionType::ConfirmCameraPlan,
                                          phase_at_click: Phase::SpacesDetected,
                                          extra_params: extra })
                .await
                .unwrap();
    assert_eq!(resp,
               EndpointResponse::CameraPlan { phase: Phase::CameraPlanPending,
                                              cameras: 3,
                                              confirmed: false });
    assert!(matches!(h.wf(id).step_outputs.get(3), Some(StepOutput::CameraPlan { cameras: 3, .. })));
}

#[tokio::test]
async fn failed_workflow_is_terminal() {
    let h = harness();
    let id = h.workflow_at_renders(&["Kitchen"]).await;
    let wf = h.engine.fail_workflow(id, "floor plan unreadable").unwrap();
    assert_eq!(wf.phase, Phase::Failed);
    assert_eq!(wf.last_error.as_deref(), Some("floor plan unreadable"));
    assert!(h.engine.fail_workflow(id, "again").is_err());
    assert!(matches!(h.act(id, ActionType::NoAction).await, EndpointResponse::NoAction { phase: Phase::Failed }));
}
