//! Safety Signal v0.3.0
//!
//! Per-call output of the Safety Detector: the 0-10 score, what
//! matched, what was suppressed and why, and the audit trace. Never
//! persisted by this core; the orchestrator decides what to keep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recommendation::Recommendation;
use crate::vocabulary::BodySystem;

/// Scores strictly above this are emergencies.
pub const EMERGENCY_THRESHOLD: f64 = 7.0;

/// One vocabulary hit inside a segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedKeyword {
    /// Canonical vocabulary phrase.
    pub phrase: String,
    /// The n-gram from user text that matched it.
    pub matched_text: String,
    pub severity: f64,
    pub system: BodySystem,
    pub absolute: bool,
}

/// Why a match was kept out of the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionReason {
    Negated,
    HedgedContext,
}

/// A match that did not score, kept for authority checks and audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressedMatch {
    pub keyword: MatchedKeyword,
    pub reason: SuppressionReason,
}

/// Per-segment audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTrace {
    pub segment: String,
    pub active: Vec<MatchedKeyword>,
    pub suppressed: Vec<SuppressedMatch>,
}

/// Full audit trace for one detector call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionTrace {
    pub sanitized_input: String,
    pub segments: Vec<SegmentTrace>,
    /// Human-readable record of each scoring modifier applied, in
    /// application order.
    pub modifiers: Vec<String>,
    /// Set when the call degraded to a zero signal.
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// The detector's verdict on one piece of text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySignal {
    /// 0-10 after all modifiers, overlap rules, and the authority cap.
    pub score: f64,
    /// Canonical phrases of all active matches.
    pub matched_symptoms: Vec<String>,
    pub affected_systems: Vec<BodySystem>,
    /// True iff score > 7.
    pub is_emergency: bool,
    /// Minimal recommendation for callers that bypass the model
    /// entirely on an immediate emergency.
    pub override_recommendation: Option<Recommendation>,
    pub trace: DetectionTrace,
}

impl SafetySignal {
    /// The conservative result for empty, non-user, or unparseable
    /// input. Explains itself in the trace.
    pub fn zero(note: &str) -> Self {
        SafetySignal {
            score: 0.0,
            matched_symptoms: Vec::new(),
            affected_systems: Vec::new(),
            is_emergency: false,
            override_recommendation: None,
            trace: DetectionTrace {
                sanitized_input: String::new(),
                segments: Vec::new(),
                modifiers: Vec::new(),
                note: Some(note.to_string()),
                at: Utc::now(),
            },
        }
    }

    /// Every match this call saw, active or suppressed. The authority
    /// checks validate denials against this set, not just the active
    /// one — a negated "chest pain" still needs denying credibly.
    pub fn all_matched_phrases(&self) -> Vec<String> {
        let mut out = Vec::new();
        for seg in &self.trace.segments {
            for m in &seg.active {
                if !out.contains(&m.phrase) {
                    out.push(m.phrase.clone());
                }
            }
            for s in &seg.suppressed {
                if !out.contains(&s.keyword.phrase) {
                    out.push(s.keyword.phrase.clone());
                }
            }
        }
        out
    }

    /// Whether any active match was an absolute (severity-10) phrase.
    pub fn has_absolute_match(&self) -> bool {
        self.trace
            .segments
            .iter()
            .flat_map(|s| s.active.iter())
            .any(|m| m.absolute)
    }
}
