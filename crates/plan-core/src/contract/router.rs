//! Router: valida la acción pedida contra la fase reportada por el cliente.
//! Función pura, sin efectos.
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use plan_domain::Phase;

use super::table::{contract, ActionType, Endpoint};
use crate::errors::CoreEngineError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub endpoint: Option<Endpoint>,
    pub payload: Value,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteDecision {
    fn rejected(error: String) -> Self {
        Self { endpoint: None,
               payload: Value::Null,
               valid: false,
               error: Some(error) }
    }

    /// `Validation` si la decisión no es válida.
    pub fn into_result(self) -> Result<(Option<Endpoint>, Value), CoreEngineError> {
        if self.valid {
            Ok((self.endpoint, self.payload))
        } else {
            Err(CoreEngineError::Validation(self.error.unwrap_or_else(|| "invalid route".to_string())))
        }
    }
}

/// Decide el endpoint para `action` en `phase`. `valid` es exactamente
/// `contract[phase].allowed_action == action`.
pub fn route(phase: Phase, action: ActionType, workflow_id: Uuid, extra_params: &Map<String, Value>) -> RouteDecision {
    let rule = contract().rule(phase);
    if rule.allowed_action != action {
        return RouteDecision::rejected(format!("action {} not allowed in phase {} (expected {})",
                                               action,
                                               phase,
                                               rule.allowed_action));
    }
    let mut payload = extra_params.clone();
    // Los campos de control no se pueden pisar con extra_params.
    payload.insert("workflow_id".into(), Value::String(workflow_id.to_string()));
    if action.advances() {
        payload.insert("from_step".into(), Value::from(phase.step()));
        payload.insert("from_phase".into(), Value::String(phase.as_str().to_string()));
    }
    RouteDecision { endpoint: rule.endpoint,
                    payload: Value::Object(payload),
                    valid: true,
                    error: None }
}

/// Variante sobre texto crudo: una fase o acción desconocida es una
/// decisión inválida, no un pánico.
pub fn route_raw(phase: &str, action: &str, workflow_id: Uuid, extra_params: &Map<String, Value>) -> RouteDecision {
    let phase = match phase.parse::<Phase>() {
        Ok(p) => p,
        Err(e) => return RouteDecision::rejected(e.to_string()),
    };
    let action = match action.parse::<ActionType>() {
        Ok(a) => a,
        Err(e) => return RouteDecision::rejected(e.to_string()),
    };
    route(phase, action, workflow_id, extra_params)
}
