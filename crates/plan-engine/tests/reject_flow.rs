mod common;

use common::{harness, harness_with, qa_report};
use plan_adapters::stub::{ScriptedAnalyzer, ScriptedPromptImprover, StubCollaborators};
use plan_core::{CoreEngineError, GenerationMode, WorkflowEventKind};
use plan_domain::{AssetType, JobType, QaStatus, RejectionAnalysis, RejectionPath, UnitStatus};
use plan_engine::{GenerationResult, RejectOutcome, RejectRequest};
use plan_policies::{params_hash, PatchParams};

#[tokio::test]
async fn five_retries_then_blocked_for_human() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);

    for attempt in 1..=5 {
        let outcome = h.engine
                       .reject(RejectRequest::new(AssetType::Render, unit.id).notes("wrong layout"))
                       .await
                       .unwrap();
        assert_eq!(outcome.path(), RejectionPath::FullRetry);
        assert_eq!(outcome.attempt_count(), attempt);
        h.finish(&unit);
    }
    let calls = h.stubs.generator.requests().len();

    let outcome = h.engine
                   .reject(RejectRequest::new(AssetType::Render, unit.id).notes("still wrong"))
                   .await
                   .unwrap();
    let RejectOutcome::Blocked { blocked_for_human,
                                 attempt_count,
                                 max_attempts,
                                 rejection_history,
                                 .. } = &outcome
    else {
        panic!("expected blocked outcome, got {outcome:?}");
    };
    assert!(*blocked_for_human);
    assert_eq!((*attempt_count, *max_attempts), (5, 5));
    assert_eq!(rejection_history.len(), 6);
    assert_eq!(h.stubs.generator.requests().len(), calls);

    let stored = h.engine.unit(unit.id).unwrap();
    assert_eq!(stored.status, UnitStatus::BlockedForHuman);
    assert_eq!(stored.attempt_count, 5);
    let attempts: Vec<u32> = stored.rejection_history.iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5, 5]);

    // bloqueada sigue bloqueada
    let again = h.engine.reject(RejectRequest::new(AssetType::Render, unit.id)).await.unwrap();
    assert!(matches!(again, RejectOutcome::Blocked { .. }));
    assert_eq!(h.engine.unit(unit.id).unwrap().rejection_history.len(), 7);
}

#[tokio::test]
async fn approved_output_with_notes_goes_to_targeted_edit() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);
    h.engine.record_qa(unit.id, &qa_report("approved", 88.0)).unwrap();
    let before = h.engine.unit(unit.id).unwrap();
    let source = before.output_ref.clone().unwrap();

    let outcome = h.engine
                   .reject(RejectRequest::new(AssetType::Render, unit.id).notes("remove the second sofa"))
                   .await
                   .unwrap();
    assert!(matches!(outcome, RejectOutcome::Inpaint { inpaint_triggered: true, attempt_count: 0, .. }));

    let stored = h.engine.unit(unit.id).unwrap();
    assert_eq!(stored.status, UnitStatus::Editing);
    assert_eq!(stored.job_type, JobType::EditInpaint);
    assert_eq!(stored.output_ref.as_deref(), Some(source.as_str()));
    assert_eq!(stored.attempt_count, 0);
    assert_eq!(stored.pre_rejection_qa_status, Some(QaStatus::Approved));
    assert_eq!(stored.rejection_history.last().map(|r| r.path), Some(RejectionPath::TargetedEdit));

    let request = h.stubs.generator.requests().pop().unwrap();
    match request.mode {
        GenerationMode::Edit { source_ref,
                               source_url,
                               correction } => {
            assert_eq!(source_ref, source);
            assert_eq!(source_url, Some(format!("stub://{source}")));
            assert_eq!(correction, "remove the second sofa");
        }
        other => panic!("expected edit request, got {other:?}"),
    }
}

#[tokio::test]
async fn ai_approved_without_notes_is_a_full_retry() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);
    h.engine.record_qa(unit.id, &qa_report("approved", 90.0)).unwrap();

    let outcome = h.engine.reject(RejectRequest::new(AssetType::Render, unit.id)).await.unwrap();
    assert_eq!(outcome.path(), RejectionPath::FullRetry);
    let stored = h.engine.unit(unit.id).unwrap();
    assert_eq!(stored.output_ref, None);
    assert_eq!(stored.qa_report, None);
}

#[tokio::test]
async fn dispatch_failure_spends_the_attempt() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);

    h.stubs.generator.set_failing(true);
    let err = h.engine.reject(RejectRequest::new(AssetType::Render, unit.id)).await.unwrap_err();
    assert!(matches!(err, CoreEngineError::GenerationDispatch { asset_id, .. } if asset_id == unit.id));
    let stored = h.engine.unit(unit.id).unwrap();
    assert_eq!(stored.status, UnitStatus::Failed);
    assert_eq!(stored.attempt_count, 1);
    assert!(stored.last_error.is_some());

    h.stubs.generator.set_failing(false);
    let outcome = h.engine.reject(RejectRequest::new(AssetType::Render, unit.id)).await.unwrap();
    assert_eq!(outcome.attempt_count(), 2);
}

#[tokio::test]
async fn learning_from_analysis_reaches_the_generator() {
    let analysis = RejectionAnalysis { failure_categories: vec!["extra_furniture".into(), "lens_flare_glitch".into()],
                                       root_cause_summary: Some("duplicated sofa".into()),
                                       constraints_to_add: vec!["exactly one sofa".into()],
                                       ..Default::default() };
    let h = harness_with(StubCollaborators::new(ScriptedAnalyzer::returning(analysis),
                                                ScriptedPromptImprover::failing()));
    let id = h.workflow_at_renders_review(&["Living"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);

    let outcome = h.engine
                   .reject(RejectRequest::new(AssetType::Render, unit.id).category("extra furniture"))
                   .await
                   .unwrap();
    let RejectOutcome::Retry { learning_applied,
                               root_cause,
                               .. } = outcome
    else {
        panic!("expected retry");
    };
    assert!(learning_applied);
    assert_eq!(root_cause.as_deref(), Some("duplicated sofa"));
    assert_eq!(h.stubs.analyzer.calls(), 1);

    let request = h.stubs.generator.requests().pop().unwrap();
    let GenerationMode::Retry { attempt, patch } = request.mode else {
        panic!("expected retry request");
    };
    assert_eq!(attempt, 1);
    assert!(!patch.entries.is_empty());
    assert_eq!(h.engine.unit(unit.id).unwrap().seed, Some(patch.seed));

    let started = h.events(id)
                   .into_iter()
                   .find_map(|k| match k {
                       WorkflowEventKind::RetryStarted { policy_id,
                                                         params_hash,
                                                         ignored,
                                                         .. } => Some((policy_id, params_hash, ignored)),
                       _ => None,
                   })
                   .unwrap();
    assert_eq!(started.0, "bounded_patch");
    assert_eq!(started.1, params_hash(&PatchParams::default()));
    assert_eq!(started.2, vec!["lens_flare_glitch".to_string()]);
}

#[tokio::test]
async fn collaborator_outage_still_retries() {
    let h = harness_with(StubCollaborators::new(ScriptedAnalyzer::failing(), ScriptedPromptImprover::failing()));
    let id = h.workflow_at_renders_review(&["Living"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);

    let outcome = h.engine.reject(RejectRequest::new(AssetType::Render, unit.id)).await.unwrap();
    assert!(matches!(outcome, RejectOutcome::Retry { retry_triggered: true, attempt_count: 1, .. }));
}

#[tokio::test]
async fn wrong_asset_type_is_rejected() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);
    let err = h.engine.reject(RejectRequest::new(AssetType::Panorama, unit.id)).await.unwrap_err();
    assert!(matches!(err, CoreEngineError::Validation(_)));
    assert_eq!(h.engine.unit(unit.id).unwrap().rejection_history.len(), 0);
}

#[tokio::test]
async fn post_approval_reject_edits_even_when_qa_rejected() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen"]).await;
    let mut units = h.units(id, AssetType::Render);
    let (edited, retried) = (units.remove(0), units.remove(0));
    for unit in [&edited, &retried] {
        h.engine.record_qa(unit.id, &qa_report("rejected", 35.0)).unwrap();
    }

    let outcome = h.engine
                   .reject(RejectRequest::new(AssetType::Render, edited.id).notes("fix the lamp")
                                                                           .post_approval())
                   .await
                   .unwrap();
    assert_eq!(outcome.path(), RejectionPath::TargetedEdit);
    let stored = h.engine.unit(edited.id).unwrap();
    assert_eq!(stored.status, UnitStatus::Editing);
    assert_eq!(stored.pre_rejection_qa_status, Some(QaStatus::Rejected));

    // sin la bandera, lo que rechazó la IA va a reintento completo
    let outcome = h.engine
                   .reject(RejectRequest::new(AssetType::Render, retried.id).notes("fix the lamp"))
                   .await
                   .unwrap();
    assert_eq!(outcome.path(), RejectionPath::FullRetry);
    assert_eq!(h.engine.unit(retried.id).unwrap().attempt_count, 1);
}

#[tokio::test]
async fn edit_keeps_the_old_output_until_the_new_one_arrives() {
    let h = harness();
    let id = h.workflow_at_renders_review(&["Kitchen"]).await;
    let unit = h.units(id, AssetType::Render).remove(0);
    h.engine.record_qa(unit.id, &qa_report("approved", 91.0)).unwrap();
    let source = h.engine.unit(unit.id).unwrap().output_ref.unwrap();

    h.engine
     .reject(RejectRequest::new(AssetType::Render, unit.id).notes("swap the rug"))
     .await
     .unwrap();
    let editing = h.engine.unit(unit.id).unwrap();
    assert_eq!(editing.output_ref.as_deref(), Some(source.as_str()));
    assert_eq!(editing.edit_source_ref.as_deref(), Some(source.as_str()));

    let done = h.engine
                .record_output(&GenerationResult { asset_id: unit.id,
                                                   correlation_id: editing.last_dispatch_id,
                                                   output_ref: "outputs/edited-rug.png".into() })
                .unwrap();
    assert_eq!(done.status, UnitStatus::Completed);
    assert_eq!(done.output_ref.as_deref(), Some("outputs/edited-rug.png"));
    assert_eq!(done.edit_source_ref, None);
    assert_eq!(done.attempt_count, 0);
    assert_eq!(done.rejection_history.len(), 1);
}

#[tokio::test]
async fn panoramas_and_merges_share_the_retry_budget() {
    for asset_type in [AssetType::Panorama, AssetType::Final360] {
        let h = harness();
        let id = h.workflow_at_review(&["Kitchen"], asset_type).await;
        let unit = h.units(id, asset_type).remove(0);

        for attempt in 1..=5 {
            let outcome = h.engine.reject(RejectRequest::new(asset_type, unit.id)).await.unwrap();
            assert_eq!(outcome.path(), RejectionPath::FullRetry, "{asset_type}");
            assert_eq!(outcome.attempt_count(), attempt, "{asset_type}");
            let request = h.stubs.generator.requests().pop().unwrap();
            assert!(matches!(request.mode, GenerationMode::Retry { attempt: a, .. } if a == attempt));
            h.finish(&unit);
        }
        let calls = h.stubs.generator.requests().len();

        let outcome = h.engine.reject(RejectRequest::new(asset_type, unit.id)).await.unwrap();
        assert_eq!(outcome.to_error(),
                   Some(CoreEngineError::RetryBudgetExhausted { asset_id: unit.id,
                                                                attempt_count: 5,
                                                                max_attempts: 5 }));
        assert_eq!(h.stubs.generator.requests().len(), calls, "{asset_type}");
        let stored = h.engine.unit(unit.id).unwrap();
        assert_eq!(stored.status, UnitStatus::BlockedForHuman);
        assert_eq!(stored.rejection_history.len(), 6);
    }
}
