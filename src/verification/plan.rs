// =============================================================================
// Verification plan derivation — turns an action type + impact guess + the
// founder-supplied fields into a concrete VerificationPlan
// =============================================================================

use crate::config::base_requirements;
use crate::model::{ActionFields, ActionType, ImpactGuess, Requirement, VerificationPlan};

/// Minimum claimed MRR delta (absolute value, USD) that forces a `plaid`
/// connection onto the plan regardless of action type.
const MATERIAL_MRR_DELTA_USD: f64 = 10_000.0;

fn has_requirement(reqs: &[Requirement], kind: &str, detail: &str) -> bool {
    reqs.iter().any(|r| r.kind == kind && r.detail == detail)
}

fn target_verification(impact: ImpactGuess) -> f64 {
    match impact {
        ImpactGuess::High => 0.90,
        ImpactGuess::Medium => 0.85,
        ImpactGuess::Low => 0.75,
    }
}

fn verification_window_days(impact: ImpactGuess) -> i64 {
    match impact {
        ImpactGuess::High => 7,
        ImpactGuess::Medium | ImpactGuess::Low => 14,
    }
}

/// Derive a founder action's verification plan: a base requirement list by
/// type, escalated by impact (a `high` claim with no review requirement gets
/// one appended) and by materiality (a large claimed MRR delta forces a
/// `plaid` connection even for action types that don't normally need one).
pub fn derive(action_type: ActionType, impact_guess: ImpactGuess, fields: &ActionFields) -> VerificationPlan {
    let mut requirements = base_requirements(action_type);

    if impact_guess == ImpactGuess::High && !requirements.iter().any(|r| r.kind == "review") {
        requirements.push(Requirement::new("review", "standard"));
    }

    if let Some(mrr_delta) = fields.mrr_delta_usd {
        if mrr_delta.abs() >= MATERIAL_MRR_DELTA_USD && !has_requirement(&requirements, "connect", "plaid") {
            requirements.push(Requirement::new("connect", "plaid"));
        }
    }

    VerificationPlan {
        requirements,
        target_verification: target_verification(impact_guess),
        verification_window_days: verification_window_days(impact_guess),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_impact_gets_review_and_shortest_window() {
        let plan = derive(ActionType::Revenue, ImpactGuess::High, &ActionFields::default());
        assert_eq!(plan.verification_window_days, 7);
        assert_eq!(plan.target_verification, 0.90);
        assert!(plan.requirements.iter().any(|r| r.kind == "review" && r.detail == "standard"));
    }

    #[test]
    fn high_impact_does_not_duplicate_existing_review_requirement() {
        // Other's base requirement is already `review:light`.
        let plan = derive(ActionType::Other, ImpactGuess::High, &ActionFields::default());
        assert_eq!(plan.requirements.iter().filter(|r| r.kind == "review").count(), 1);
    }

    #[test]
    fn low_impact_gets_longest_window_and_lowest_target() {
        let plan = derive(ActionType::Hiring, ImpactGuess::Low, &ActionFields::default());
        assert_eq!(plan.verification_window_days, 14);
        assert_eq!(plan.target_verification, 0.75);
    }

    #[test]
    fn material_mrr_delta_forces_plaid_connection() {
        let fields = ActionFields {
            mrr_delta_usd: Some(25_000.0),
            customer_name: None,
            extra: Default::default(),
        };
        let plan = derive(ActionType::Revenue, ImpactGuess::High, &fields);
        assert!(has_requirement(&plan.requirements, "connect", "plaid"));
        // seed scenario 5: high impact + material amount => review AND plaid, target 0.90, window 7.
        assert!(plan.requirements.iter().any(|r| r.kind == "review"));
        assert_eq!(plan.target_verification, 0.90);
        assert_eq!(plan.verification_window_days, 7);
    }

    #[test]
    fn material_mrr_delta_does_not_duplicate_existing_plaid_requirement() {
        // Funding's base requirement already includes connect:plaid.
        let fields = ActionFields {
            mrr_delta_usd: Some(50_000.0),
            customer_name: None,
            extra: Default::default(),
        };
        let plan = derive(ActionType::Funding, ImpactGuess::Medium, &fields);
        assert_eq!(plan.requirements.iter().filter(|r| r.kind == "connect" && r.detail == "plaid").count(), 1);
    }

    #[test]
    fn small_mrr_delta_does_not_force_plaid() {
        let fields = ActionFields {
            mrr_delta_usd: Some(500.0),
            customer_name: None,
            extra: Default::default(),
        };
        let plan = derive(ActionType::Revenue, ImpactGuess::Medium, &fields);
        assert!(!has_requirement(&plan.requirements, "connect", "plaid"));
    }
}
