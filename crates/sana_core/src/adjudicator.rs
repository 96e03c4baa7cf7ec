//! Recommendation Adjudicator v0.4.0
//!
//! Final, deterministic rewrite of the model's proposed care level,
//! applied once per terminated conversation. Rules run in a fixed
//! order and only ever append to the adjustment log:
//!
//! 1. red-flag force-upgrade
//! 2. readiness/ambiguity single-level upgrade
//! 3. recently-resolved red-flag hospital floor
//! 4. Authority Block (the only rule that may lower a level, and only
//!    on a validated high-confidence denial)
//!
//! The log is audit data; its rule names and thresholds never appear
//! in the advice text a patient sees.

use tracing::{debug, info};

use crate::negation::validate_denial;
use crate::profile::ClinicalProfile;
use crate::recommendation::{AdjustmentLog, AdjustmentRule, CareLevel, Recommendation};
use crate::signal::SafetySignal;

/// Readiness below this forces a one-level upgrade.
pub const READINESS_UPGRADE_THRESHOLD: f64 = 0.8;
/// Stricter bar for vulnerable patients.
pub const READINESS_UPGRADE_THRESHOLD_VULNERABLE: f64 = 0.9;
/// Signal score at or above which an authority downgrade lands on
/// hospital rather than health-center.
pub const DOWNGRADE_HOSPITAL_SCORE: f64 = 4.0;

const DOWNGRADE_ADVICE: &str = "Your answers indicate the serious warning signs have been \
     checked and are not present right now. Based on everything you described, an urgent \
     in-person medical review is the safest next step.";

const ESCALATION_WARNING: &str = "If any warning sign appears or your symptoms suddenly \
     worsen, go to emergency care or call your local emergency number immediately.";

const RETAIN_CAUTION: &str = "Your earlier answers could not definitively rule out the \
     warning signs, so the emergency recommendation stands.";

/// Rewrite the raw model recommendation against the profile and the
/// safety signal. Pure; never raises; malformed upstream fields are
/// normalized away before the rules run.
pub fn adjudicate(
    raw: Recommendation,
    profile: &ClinicalProfile,
    signal: &SafetySignal,
) -> (Recommendation, AdjustmentLog) {
    let mut rec = raw.normalized();
    let mut log = AdjustmentLog::default();

    // Rule 1: the model itself saw a red flag but stopped short of
    // calling it an emergency. Models hedge; this core does not.
    if !rec.red_flags.is_empty() && rec.level != CareLevel::Emergency {
        let from = rec.level;
        rec.level = CareLevel::Emergency;
        log.record(
            AdjustmentRule::RedFlagUpgrade,
            from,
            rec.level,
            "a warning sign was reported, so emergency care is advised",
        );
    }

    // Rule 2: not enough reliable information, or ambiguous answers.
    let threshold = if profile.is_vulnerable() {
        READINESS_UPGRADE_THRESHOLD_VULNERABLE
    } else {
        READINESS_UPGRADE_THRESHOLD
    };
    let readiness = profile.effective_readiness();
    let ambiguous = profile.ambiguity_detected || rec.ambiguity_detected;
    if (readiness < threshold || ambiguous) && rec.level != CareLevel::Emergency {
        let from = rec.level;
        rec.level = rec.level.escalate();
        log.record(
            AdjustmentRule::ReadinessUpgrade,
            from,
            rec.level,
            "the picture is incomplete, so a more cautious care level applies",
        );
    }

    // Rule 3: a red-flag symptom that recently stopped still needs
    // in-person review, whatever the model said.
    if profile.red_flag_recently_resolved && rec.level < CareLevel::Hospital {
        let from = rec.level;
        rec.level = CareLevel::Hospital;
        log.record(
            AdjustmentRule::RecentResolvedFloor,
            from,
            rec.level,
            "a warning symptom that recently stopped needs in-person assessment",
        );
    }

    // Rule 4: Authority Block.
    if rec.level == CareLevel::Emergency && profile.red_flags_resolved == Some(true) {
        apply_authority_block(&mut rec, profile, signal, &mut log);
    }

    info!(
        level = %rec.level,
        adjustments = log.entries().len(),
        "recommendation adjudicated"
    );
    (rec, log)
}

/// Downgrade an emergency only on a credible, explicit, high-
/// confidence denial — validated with the same machinery the
/// detector uses. An absolute severity match is never downgraded.
fn apply_authority_block(
    rec: &mut Recommendation,
    profile: &ClinicalProfile,
    signal: &SafetySignal,
    log: &mut AdjustmentLog,
) {
    let denial = profile.red_flag_denials.as_deref().unwrap_or("");

    let mut keywords = signal.all_matched_phrases();
    if keywords.is_empty() {
        keywords = rec.red_flags.clone();
    }

    let validated = validate_denial(denial, &keywords).is_validated();
    let credible = validated && profile.has_high_confidence_denial();

    if credible && !signal.has_absolute_match() {
        let from = rec.level;
        rec.level = if signal.score >= DOWNGRADE_HOSPITAL_SCORE {
            CareLevel::Hospital
        } else {
            CareLevel::HealthCenter
        };
        rec.advice = format!("{DOWNGRADE_ADVICE} {ESCALATION_WARNING}");
        log.record(
            AdjustmentRule::AuthorityDowngrade,
            from,
            rec.level,
            "the warning signs were explicitly and credibly denied",
        );
        debug!(to = %rec.level, "authority block downgraded emergency");
    } else {
        rec.advice = format!("{} {RETAIN_CAUTION}", rec.advice.trim());
        log.record(
            AdjustmentRule::AuthorityRetain,
            rec.level,
            rec.level,
            "the denial could not be confirmed, so the emergency level stands",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{EvaluationContext, SafetyDetector};
    use crate::profile::DenialConfidence;

    fn raw(level: CareLevel) -> Recommendation {
        Recommendation {
            level,
            advice: "advice from the model".into(),
            red_flags: Vec::new(),
            triage_readiness_score: None,
            ambiguity_detected: false,
        }
    }

    fn ready_profile() -> ClinicalProfile {
        ClinicalProfile {
            triage_readiness_score: Some(0.95),
            red_flags_resolved: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_red_flag_force_upgrade() {
        let mut r = raw(CareLevel::Hospital);
        r.red_flags = vec!["chest pain".into()];
        let signal = SafetySignal::zero("test");
        let (rec, log) = adjudicate(r, &ready_profile(), &signal);
        assert_eq!(rec.level, CareLevel::Emergency);
        assert!(log.applied(AdjustmentRule::RedFlagUpgrade));
    }

    #[test]
    fn test_low_readiness_upgrades_one_level() {
        let profile = ClinicalProfile {
            triage_readiness_score: Some(0.3),
            symptom_category: Some(crate::profile::SymptomCategory::Simple),
            ..Default::default()
        };
        let signal = SafetySignal::zero("test");
        let (rec, log) = adjudicate(raw(CareLevel::SelfCare), &profile, &signal);
        assert_eq!(rec.level, CareLevel::HealthCenter);
        assert!(log.applied(AdjustmentRule::ReadinessUpgrade));
    }

    #[test]
    fn test_vulnerable_threshold_is_stricter() {
        let profile = ClinicalProfile {
            triage_readiness_score: Some(0.85),
            red_flags_resolved: Some(true),
            vulnerability_flags: vec!["pregnant".into()],
            ..Default::default()
        };
        let signal = SafetySignal::zero("test");
        // 0.85 passes the normal bar but not the vulnerable one
        let (rec, log) = adjudicate(raw(CareLevel::SelfCare), &profile, &signal);
        assert_eq!(rec.level, CareLevel::HealthCenter);
        assert!(log.applied(AdjustmentRule::ReadinessUpgrade));
    }

    #[test]
    fn test_ambiguity_upgrades() {
        let mut profile = ready_profile();
        profile.ambiguity_detected = true;
        let signal = SafetySignal::zero("test");
        let (rec, _) = adjudicate(raw(CareLevel::HealthCenter), &profile, &signal);
        assert_eq!(rec.level, CareLevel::Hospital);
    }

    #[test]
    fn test_recent_resolved_floor() {
        let mut profile = ready_profile();
        profile.red_flag_recently_resolved = true;
        let signal = SafetySignal::zero("test");
        let (rec, log) = adjudicate(raw(CareLevel::SelfCare), &profile, &signal);
        assert_eq!(rec.level, CareLevel::Hospital);
        assert!(log.applied(AdjustmentRule::RecentResolvedFloor));
    }

    #[test]
    fn test_authority_downgrade_on_credible_denial() {
        let profile = ClinicalProfile {
            red_flags_resolved: Some(true),
            red_flag_denials: Some("none".into()),
            denial_confidence: Some(DenialConfidence::High),
            triage_readiness_score: Some(1.0),
            ..Default::default()
        };
        let mut r = raw(CareLevel::Emergency);
        r.red_flags = vec!["chest pain".into()];
        let signal = SafetySignal::zero("no scan this turn");
        let (rec, log) = adjudicate(r, &profile, &signal);
        assert!(matches!(
            rec.level,
            CareLevel::HealthCenter | CareLevel::Hospital
        ));
        assert!(log.applied(AdjustmentRule::AuthorityDowngrade));
        // Advice is templated and carries the escalation warning
        assert!(rec.advice.contains("emergency care"));
    }

    #[test]
    fn test_authority_retains_on_low_confidence() {
        let profile = ClinicalProfile {
            red_flags_resolved: Some(true),
            red_flag_denials: Some("none".into()),
            denial_confidence: Some(DenialConfidence::Medium),
            triage_readiness_score: Some(1.0),
            ..Default::default()
        };
        let signal = SafetySignal::zero("test");
        let (rec, log) = adjudicate(raw(CareLevel::Emergency), &profile, &signal);
        assert_eq!(rec.level, CareLevel::Emergency);
        assert!(log.applied(AdjustmentRule::AuthorityRetain));
        assert!(rec.advice.contains("could not definitively rule out"));
    }

    #[test]
    fn test_authority_never_downgrades_absolute_match() {
        let profile = ClinicalProfile {
            red_flags_resolved: Some(true),
            red_flag_denials: Some("none".into()),
            denial_confidence: Some(DenialConfidence::High),
            triage_readiness_score: Some(1.0),
            ..Default::default()
        };
        let detector = SafetyDetector::new();
        let signal = detector.evaluate("severe chest pain", &EvaluationContext::user_input());
        assert!(signal.has_absolute_match());
        let (rec, log) = adjudicate(raw(CareLevel::Emergency), &profile, &signal);
        assert_eq!(rec.level, CareLevel::Emergency);
        assert!(log.applied(AdjustmentRule::AuthorityRetain));
    }

    #[test]
    fn test_downgrade_target_tracks_signal_score() {
        let profile = ClinicalProfile {
            red_flags_resolved: Some(true),
            red_flag_denials: Some("no chest pain".into()),
            denial_confidence: Some(DenialConfidence::High),
            triage_readiness_score: Some(1.0),
            ..Default::default()
        };
        let detector = SafetyDetector::new();
        // Negated mention: suppressed match, moderate residual score 0
        let signal = detector.evaluate("I do not have chest pain", &EvaluationContext::user_input());
        let (rec, _) = adjudicate(raw(CareLevel::Emergency), &profile, &signal);
        assert_eq!(rec.level, CareLevel::HealthCenter);
    }

    #[test]
    fn test_no_rules_fire_on_clean_case() {
        let signal = SafetySignal::zero("test");
        let (rec, log) = adjudicate(raw(CareLevel::SelfCare), &ready_profile(), &signal);
        assert_eq!(rec.level, CareLevel::SelfCare);
        assert!(log.is_empty());
    }
}
