use serde_json::Map;
use uuid::Uuid;

use plan_adapters::stub::StubCollaborators;
use plan_core::WorkflowRepository;
use plan_domain::{HumanVote, QaDecision, StepOutput};
use planflow_rust::{in_memory, ActionRequest, ActionType, CalibrationVote, EndpointResponse, Phase, SpaceDraft};

#[test]
fn in_memory_runtime_runs_a_stage_job() {
    let stubs = StubCollaborators::default();
    let rt = in_memory(stubs.collaborators());
    let wf = rt.engine.create_workflow(Uuid::new_v4(), Uuid::new_v4()).unwrap();

    let resp = tokio_test::block_on(rt.engine.dispatch(ActionRequest { workflow_id: wf.id,
                                                                       action: ActionType::RunSpaceAnalysis,
                                                                       phase_at_click: Phase::Upload,
                                                                       extra_params: Map::new() }))
        .unwrap();
    assert!(matches!(resp, EndpointResponse::StageJobStarted { step: 0, phase: Phase::SpaceAnalysisRunning, .. }));
    assert_eq!(stubs.generator.stage_jobs().len(), 1);

    let done = rt.engine
                 .complete_stage_job(wf.id,
                                     StepOutput::SpaceAnalysis { space_count: 2 },
                                     &[SpaceDraft { name: "Kitchen".into(), space_type: "kitchen".into() },
                                       SpaceDraft { name: "kitchen".into(), space_type: "kitchen".into() }])
                 .unwrap();
    assert_eq!(done.phase, Phase::SpaceAnalysisComplete);
    assert_eq!(rt.engine.repository().list_spaces(wf.id).map(|s| s.len()).unwrap(), 1);
}

#[test]
fn calibration_shares_the_event_log() {
    use plan_core::EventStore;

    let rt = in_memory(StubCollaborators::default().collaborators());
    let wf = rt.engine.create_workflow(Uuid::new_v4(), Uuid::new_v4()).unwrap();
    let record = rt.calibration
                   .record(&CalibrationVote { owner_id: wf.owner_id,
                                              project_id: wf.project_id,
                                              step: 4,
                                              category: "wrong_room".into(),
                                              ai_decision: QaDecision::Rejected,
                                              human_vote: HumanVote::Disagree,
                                              human_score: None,
                                              workflow_id: Some(wf.id) })
                   .unwrap();
    assert_eq!(record.stat.false_reject_count, 1);
    let events = rt.engine.event_store().list(wf.id).unwrap();
    assert_eq!(events.last().map(|e| e.kind.type_name()), Some("calibration_recorded"));
}
