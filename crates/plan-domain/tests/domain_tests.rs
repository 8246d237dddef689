use plan_domain::{AssetType, CameraSlot, GenerationUnit, Phase, QaDecision, QualityReport, Space, StepOutput, StepOutputs,
                  UnitKey, Workflow, FINAL_STEP};
use serde_json::json;
use uuid::Uuid;

#[test]
fn test_every_step_has_pending_running_and_review_phases() {
    for step in 0..FINAL_STEP {
        let entry = Phase::entry_for_step(step).unwrap();
        assert!(!entry.is_running());
        assert!(Phase::running_for_step(step).unwrap().is_running());
        assert!(!Phase::review_for_step(step).unwrap().is_terminal());
    }
}

#[test]
fn test_quality_report_parse_then_validate() {
    let raw = json!({
        "schema": "qa.v1",
        "decision": "rejected",
        "score": 35.0,
        "structural_violation": true,
        "issues": [
            { "category": "wrong_room", "severity": "critical" },
            { "category": "lighting", "severity": "minor" }
        ]
    });
    let report = QualityReport::parse(&raw).unwrap();
    assert_eq!(report.decision(), QaDecision::Rejected);
    assert_eq!(report.severe_issue_categories(), vec!["wrong_room"]);
    assert!(report.structural_violation());
}

#[test]
fn test_quality_report_rejects_unknown_schema_and_bad_score() {
    assert!(QualityReport::parse(&json!({ "schema": "qa.v2", "decision": "approved" })).is_err());
    assert!(QualityReport::parse(&json!({ "decision": "approved" })).is_err());
    assert!(QualityReport::parse(&json!({ "schema": "qa.v1", "decision": "approved", "score": 130 })).is_err());
}

#[test]
fn test_unit_serializes_with_text_states() {
    let space = Space::new(Uuid::new_v4(), "Kitchen", "kitchen").unwrap();
    let unit = GenerationUnit::new(space.workflow_id,
                                   UnitKey { space_id: space.id,
                                             asset_type: AssetType::Final360,
                                             slot: CameraSlot::A });
    let v = serde_json::to_value(&unit).unwrap();
    assert_eq!(v["status"], json!("pending"));
    assert_eq!(v["asset_type"], json!("final360"));
    assert_eq!(v["job_type"], json!("generate"));
    let back: GenerationUnit = serde_json::from_value(v).unwrap();
    assert_eq!(back, unit);
}

#[test]
fn test_workflow_outputs_survive_serialization() {
    let mut wf = Workflow::new(Uuid::new_v4(), Uuid::new_v4());
    wf.step_outputs.record(StepOutput::CameraPlan { cameras: 6, confirmed: true });
    let v = serde_json::to_value(&wf).unwrap();
    assert_eq!(v["phase"], json!("upload"));
    let outputs = StepOutputs::parse(&v["step_outputs"]).unwrap();
    assert_eq!(outputs, wf.step_outputs);
}
