//! Clinical Profile v0.4.0
//!
//! The accumulating belief state of one triage conversation. An
//! external extractor rebuilds it from scratch every turn (replace,
//! never mutate); this core only reads it. Every field is optional:
//! "absent" means "not yet known", and absence blocks termination
//! through the completeness gate instead of erroring.
//!
//! Presence is decided after normalization: "unknown", "n/a" and
//! friends do not count as answers. "none" is special-cased for the
//! red-flag denial field, where it is a real (and important) answer.

use serde::{Deserialize, Serialize};

use crate::normalize::{extract_numeric, is_absent};

/// Readiness ceiling while red flags remain unresolved. No amount of
/// other information makes it safe to stop questioning.
pub const UNRESOLVED_RED_FLAG_READINESS_CAP: f64 = 0.4;

/// Age bounds outside which a patient counts as vulnerable.
const VULNERABLE_AGE_UNDER: f64 = 2.0;
const VULNERABLE_AGE_OVER: f64 = 75.0;

/// Coarse complexity classification of the presenting complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymptomCategory {
    Simple,
    Complex,
    Critical,
}

impl SymptomCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
            Self::Critical => "critical",
        }
    }
}

/// Certainty of a patient's symptom denial. Gates the Authority
/// Block: only a high-confidence denial can cap or downgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialConfidence {
    High,
    Medium,
    Low,
}

/// Per-turn snapshot of everything reliably extracted so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalProfile {
    /// Free-text as extracted ("45", "around forty").
    #[serde(default)]
    pub age: Option<String>,
    /// Symptom duration ("2 hours", "about 3 weeks").
    #[serde(default)]
    pub duration: Option<String>,
    /// Severity, often in spoken scale notation ("7/10", "a 7").
    #[serde(default)]
    pub severity: Option<String>,
    /// Course over time ("getting worse", "stable").
    #[serde(default)]
    pub progression: Option<String>,
    /// What the patient said when asked about red flags.
    #[serde(default)]
    pub red_flag_denials: Option<String>,
    /// Opaque 0-1 score from the external readiness scorer.
    #[serde(default)]
    pub triage_readiness_score: Option<f64>,
    #[serde(default)]
    pub ambiguity_detected: bool,
    /// 0-1 internal-consistency estimate across turns.
    #[serde(default)]
    pub consistency_score: Option<f64>,
    #[serde(default)]
    pub inconsistency_detected: bool,
    /// Whether every red-flag question has been asked and answered.
    #[serde(default)]
    pub red_flags_resolved: Option<bool>,
    /// A red-flag symptom was present earlier and recently stopped.
    #[serde(default)]
    pub red_flag_recently_resolved: bool,
    /// Patient accepted residual uncertainty after clarification.
    #[serde(default)]
    pub uncertainty_accepted: bool,
    #[serde(default)]
    pub symptom_category: Option<SymptomCategory>,
    #[serde(default)]
    pub denial_confidence: Option<DenialConfidence>,
    /// Pregnancy, immunocompromise, relevant comorbidities.
    #[serde(default)]
    pub vulnerability_flags: Vec<String>,
    /// What the patient first complained of; drives protocol lookup.
    #[serde(default)]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl ClinicalProfile {
    /// Field presence after absence-token normalization.
    pub fn field_present(value: &Option<String>, allow_none: bool) -> bool {
        value
            .as_deref()
            .map(|v| !is_absent(v, allow_none))
            .unwrap_or(false)
    }

    pub fn has_age(&self) -> bool {
        Self::field_present(&self.age, false)
    }

    pub fn has_duration(&self) -> bool {
        Self::field_present(&self.duration, false)
    }

    pub fn has_severity(&self) -> bool {
        Self::field_present(&self.severity, false)
    }

    pub fn has_progression(&self) -> bool {
        Self::field_present(&self.progression, false)
    }

    /// "none" is a real answer here (allow-none mode).
    pub fn has_red_flag_denials(&self) -> bool {
        Self::field_present(&self.red_flag_denials, true)
    }

    /// Readiness with the safety floor applied: while red flags are
    /// unresolved the score is capped at 0.4 no matter what the
    /// external scorer said.
    pub fn effective_readiness(&self) -> f64 {
        let raw = self.triage_readiness_score.unwrap_or(0.0).clamp(0.0, 1.0);
        if self.red_flags_resolved == Some(true) {
            raw
        } else {
            raw.min(UNRESOLVED_RED_FLAG_READINESS_CAP)
        }
    }

    /// Vulnerable patients get longer conversations and a stricter
    /// readiness threshold at adjudication.
    pub fn is_vulnerable(&self) -> bool {
        if !self.vulnerability_flags.is_empty() {
            return true;
        }
        self.age
            .as_deref()
            .and_then(extract_numeric)
            .map(|a| a < VULNERABLE_AGE_UNDER || a > VULNERABLE_AGE_OVER)
            .unwrap_or(false)
    }

    /// High-confidence denial on record, as the authority checks
    /// require.
    pub fn has_high_confidence_denial(&self) -> bool {
        self.denial_confidence == Some(DenialConfidence::High) && self.has_red_flag_denials()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absence_tokens_block_presence() {
        let profile = ClinicalProfile {
            age: Some("unknown".into()),
            duration: Some("2 days".into()),
            ..Default::default()
        };
        assert!(!profile.has_age());
        assert!(profile.has_duration());
    }

    #[test]
    fn test_none_is_a_real_denial() {
        let profile = ClinicalProfile {
            red_flag_denials: Some("none".into()),
            severity: Some("none".into()),
            ..Default::default()
        };
        assert!(profile.has_red_flag_denials());
        assert!(!profile.has_severity());
    }

    #[test]
    fn test_readiness_capped_while_unresolved() {
        let mut profile = ClinicalProfile {
            triage_readiness_score: Some(0.95),
            red_flags_resolved: Some(false),
            ..Default::default()
        };
        assert!(profile.effective_readiness() <= UNRESOLVED_RED_FLAG_READINESS_CAP);

        profile.red_flags_resolved = Some(true);
        assert_eq!(profile.effective_readiness(), 0.95);
    }

    #[test]
    fn test_vulnerability_from_age_and_flags() {
        let elderly = ClinicalProfile {
            age: Some("82".into()),
            ..Default::default()
        };
        assert!(elderly.is_vulnerable());

        let pregnant = ClinicalProfile {
            age: Some("30".into()),
            vulnerability_flags: vec!["pregnant".into()],
            ..Default::default()
        };
        assert!(pregnant.is_vulnerable());

        let adult = ClinicalProfile {
            age: Some("30".into()),
            ..Default::default()
        };
        assert!(!adult.is_vulnerable());
    }
}
