use plan_core::{contract, endpoint_guard, route, route_raw, ActionType, Endpoint};
use plan_domain::Phase;
use serde_json::Map;
use uuid::Uuid;

#[test]
fn route_validity_matches_contract_for_every_phase_and_action() {
    let wf = Uuid::new_v4();
    let extra = Map::new();
    for phase in Phase::ALL {
        let expected = contract().rule(phase).allowed_action;
        for action in ActionType::ALL {
            let d = route(phase, action, wf, &extra);
            assert_eq!(d.valid, expected == action, "{phase} x {action}");
            assert_eq!(d.error.is_some(), !d.valid);
            if d.valid {
                assert_eq!(d.endpoint, contract().rule(phase).endpoint);
                assert_eq!(d.payload.get("from_step").is_some(), action.advances());
            }
            let raw = route_raw(phase.as_str(), action.as_str(), wf, &extra);
            assert_eq!(raw.valid, d.valid);
        }
    }
}

#[test]
fn guard_accepts_every_phase_routed_to_an_endpoint() {
    for (phase, rule) in contract().iter() {
        if let Some(endpoint) = rule.endpoint {
            assert!(endpoint_guard().allows(endpoint, phase),
                    "guard for {endpoint} misses phase {phase}");
        }
    }
}

#[test]
fn every_routed_guard_phase_is_reachable_from_the_contract() {
    // Endpoints internos (rechazo, ingesta, aprobación) no salen del router.
    let internal = [Endpoint::RejectAsset, Endpoint::RecordResult, Endpoint::ApproveAsset];
    for endpoint in Endpoint::ALL.iter().filter(|e| !internal.contains(e)) {
        for phase in endpoint_guard().allowed(*endpoint) {
            assert_eq!(contract().rule(phase).endpoint, Some(*endpoint), "{endpoint} in {phase}");
        }
    }
}

#[test]
fn stale_click_passes_router_but_fails_guard() {
    // Dos pestañas: el cliente ve renders_pending, pero ya se persistió renders_in_progress.
    let d = route(Phase::RendersPending, ActionType::RunRenders, Uuid::new_v4(), &Map::new());
    assert!(d.valid);
    let g = endpoint_guard().validate(d.endpoint.unwrap(), Phase::RendersInProgress);
    assert!(!g.valid);
    assert!(g.error.unwrap().contains("renders_in_progress"));
}
