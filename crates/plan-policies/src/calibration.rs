use plan_core::constants::STRONG_DISAGREEMENT_SCORE;
use plan_domain::{CalibrationOutcome, HumanVote, QaDecision};

/// Acuerdo → confirmado; desacuerdo → falso rechazo o falsa aprobación
/// según lo que decidió la IA.
pub fn classify_vote(ai_decision: QaDecision, vote: HumanVote) -> CalibrationOutcome {
    match (vote, ai_decision) {
        (HumanVote::Agree, _) => CalibrationOutcome::ConfirmedCorrect,
        (HumanVote::Disagree, QaDecision::Rejected) => CalibrationOutcome::FalseReject,
        (HumanVote::Disagree, QaDecision::Approved) => CalibrationOutcome::FalseApprove,
    }
}

/// 2 cuando el humano puntuó por debajo de 40 algo que la IA aprobó.
pub fn calibration_weight(ai_decision: QaDecision, human_score: Option<f32>) -> u64 {
    match human_score {
        Some(score) if score < STRONG_DISAGREEMENT_SCORE && ai_decision == QaDecision::Approved => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_table() {
        assert_eq!(classify_vote(QaDecision::Rejected, HumanVote::Agree), CalibrationOutcome::ConfirmedCorrect);
        assert_eq!(classify_vote(QaDecision::Approved, HumanVote::Agree), CalibrationOutcome::ConfirmedCorrect);
        assert_eq!(classify_vote(QaDecision::Rejected, HumanVote::Disagree), CalibrationOutcome::FalseReject);
        assert_eq!(classify_vote(QaDecision::Approved, HumanVote::Disagree), CalibrationOutcome::FalseApprove);
    }

    #[test]
    fn weight_doubles_only_for_low_scored_approvals() {
        assert_eq!(calibration_weight(QaDecision::Approved, Some(30.0)), 2);
        assert_eq!(calibration_weight(QaDecision::Approved, Some(40.0)), 1);
        assert_eq!(calibration_weight(QaDecision::Approved, None), 1);
        assert_eq!(calibration_weight(QaDecision::Rejected, Some(10.0)), 1);
    }
}
