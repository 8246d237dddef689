//! Selección de camino ante un rechazo.
use plan_core::constants::MAX_ATTEMPTS;
use plan_domain::{GenerationUnit, RejectionPath, UnitStatus};

/// Lo que la selección necesita de la unidad y del pedido.
#[derive(Debug, Clone, Copy)]
pub struct PathInput<'a> {
    pub status: UnitStatus,
    pub attempt_count: u32,
    pub was_ai_approved: bool,
    pub has_output: bool,
    pub is_post_approval: bool,
    pub notes: Option<&'a str>,
}

impl<'a> PathInput<'a> {
    pub fn from_unit(unit: &GenerationUnit, is_post_approval: bool, notes: Option<&'a str>) -> Self {
        Self { status: unit.status,
               attempt_count: unit.attempt_count,
               was_ai_approved: unit.was_ai_approved(),
               has_output: unit.has_output(),
               is_post_approval,
               notes }
    }
}

/// Edición dirigida cuando hay algo aprobado que conservar y una corrección
/// concreta; si no, reintento completo mientras quede presupuesto. Una unidad
/// ya bloqueada queda bloqueada.
pub fn select_path(input: &PathInput<'_>) -> RejectionPath {
    if input.status == UnitStatus::BlockedForHuman {
        return RejectionPath::Exhausted;
    }
    let has_notes = input.notes.map(|n| !n.trim().is_empty()).unwrap_or(false);
    if (input.is_post_approval || input.was_ai_approved) && input.has_output && has_notes {
        return RejectionPath::TargetedEdit;
    }
    if input.attempt_count + 1 > MAX_ATTEMPTS {
        RejectionPath::Exhausted
    } else {
        RejectionPath::FullRetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> PathInput<'static> {
        PathInput { status: UnitStatus::Completed,
                    attempt_count: 0,
                    was_ai_approved: false,
                    has_output: true,
                    is_post_approval: false,
                    notes: Some("lamp on the left is wrong") }
    }

    #[test]
    fn edit_requires_approval_output_and_notes() {
        assert_eq!(select_path(&PathInput { is_post_approval: true, ..input() }), RejectionPath::TargetedEdit);
        assert_eq!(select_path(&PathInput { was_ai_approved: true, ..input() }), RejectionPath::TargetedEdit);
        assert_eq!(select_path(&input()), RejectionPath::FullRetry);
        assert_eq!(select_path(&PathInput { is_post_approval: true, notes: Some("   "), ..input() }),
                   RejectionPath::FullRetry);
        assert_eq!(select_path(&PathInput { is_post_approval: true, has_output: false, ..input() }),
                   RejectionPath::FullRetry);
    }

    #[test]
    fn budget_boundary() {
        assert_eq!(select_path(&PathInput { attempt_count: 4, ..input() }), RejectionPath::FullRetry);
        assert_eq!(select_path(&PathInput { attempt_count: 5, ..input() }), RejectionPath::Exhausted);
    }

    #[test]
    fn blocked_unit_stays_exhausted() {
        let i = PathInput { status: UnitStatus::BlockedForHuman,
                            is_post_approval: true,
                            ..input() };
        assert_eq!(select_path(&i), RejectionPath::Exhausted);
    }
}
