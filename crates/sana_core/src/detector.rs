//! Safety Detector v0.4.0
//!
//! Deterministic red-flag scan that runs on every user turn, before
//! and independent of any model call. Pipeline:
//!
//! sanitize -> fuzzy match -> negation -> contextual exclusion ->
//! score (modifiers, system overlap) -> authority cap -> classify
//!
//! Modifier order is load-bearing at the safety boundary: additive
//! danger indicators, then viral de-escalation, then chronic
//! adjustment, then overlap rules, then clamp, then the authority
//! cap. Do not reorder.
//!
//! Never returns an error: empty, non-user, or unparseable text
//! yields a zero signal whose trace says why.

use tracing::{debug, warn};

use crate::negation::{self, validate_denial};
use crate::normalize::{self, is_chronic_duration};
use crate::profile::ClinicalProfile;
use crate::recommendation::{CareLevel, Recommendation};
use crate::sanitize::{sanitize, segments};
use crate::signal::{
    DetectionTrace, MatchedKeyword, SafetySignal, SegmentTrace, SuppressedMatch,
    SuppressionReason, EMERGENCY_THRESHOLD,
};
use crate::vocabulary::{BodySystem, Vocabulary};

/// Question ids beginning with this are red-flag checks; viral
/// de-escalation is skipped while one is active.
pub const RED_FLAG_QUESTION_PREFIX: &str = "red_flag";

/// Score cap applied by the authority constraint when a credible
/// high-confidence denial is on record.
pub const AUTHORITY_SCORE_CAP: f64 = 7.0;

const DANGER_OVERLAP_BONUS: f64 = 3.0;
const VIRAL_DEESCALATION: f64 = 2.0;
const CHRONIC_ADJUSTMENT: f64 = 1.0;
/// Two or more common-viral symptoms before de-escalation applies.
const VIRAL_SYMPTOM_MINIMUM: usize = 2;

/// Everything the detector knows beyond the text itself.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext<'a> {
    /// False for model output, summaries, or anything else that is
    /// not the patient speaking. Non-user text never scores.
    pub is_user_input: bool,
    pub profile: Option<&'a ClinicalProfile>,
    /// Prior user turns, for corroboration logging only.
    pub history: &'a [String],
    pub active_question_id: Option<&'a str>,
}

impl<'a> EvaluationContext<'a> {
    pub fn user_input() -> Self {
        EvaluationContext {
            is_user_input: true,
            ..Default::default()
        }
    }

    fn red_flag_question_active(&self) -> bool {
        self.active_question_id
            .map(|id| id.starts_with(RED_FLAG_QUESTION_PREFIX))
            .unwrap_or(false)
    }
}

/// The detector itself: a vocabulary plus matching configuration.
/// Pure and reusable across conversations.
pub struct SafetyDetector {
    vocabulary: Vocabulary,
    contextual_exclusions: bool,
}

impl Default for SafetyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyDetector {
    pub fn new() -> Self {
        SafetyDetector {
            vocabulary: Vocabulary::default(),
            contextual_exclusions: true,
        }
    }

    pub fn with_vocabulary(vocabulary: Vocabulary) -> Self {
        SafetyDetector {
            vocabulary,
            contextual_exclusions: true,
        }
    }

    /// Keep hedged/historical matches in the active set. Used by
    /// callers that want raw sensitivity (e.g. the offline tree).
    pub fn with_exclusions_disabled(mut self) -> Self {
        self.contextual_exclusions = false;
        self
    }

    /// Scan one piece of text. Never raises.
    pub fn evaluate(&self, text: &str, ctx: &EvaluationContext) -> SafetySignal {
        if !ctx.is_user_input {
            return SafetySignal::zero("non-user text is not scored");
        }
        let sanitized = sanitize(text);
        if sanitized.is_empty() {
            return SafetySignal::zero("input was empty after sanitization");
        }

        let segment_traces: Vec<SegmentTrace> = segments(&sanitized)
            .into_iter()
            .map(|seg| self.scan_segment(&seg))
            .collect();

        let mut modifiers = Vec::new();
        let score = self.score(&segment_traces, ctx, &mut modifiers);

        let active: Vec<&MatchedKeyword> = segment_traces
            .iter()
            .flat_map(|s| s.active.iter())
            .collect();
        let mut matched_symptoms = Vec::new();
        let mut affected_systems: Vec<BodySystem> = Vec::new();
        for m in &active {
            if !matched_symptoms.contains(&m.phrase) {
                matched_symptoms.push(m.phrase.clone());
            }
            if !affected_systems.contains(&m.system) {
                affected_systems.push(m.system);
            }
        }

        for phrase in &matched_symptoms {
            if ctx.history.iter().any(|h| {
                normalize::normalize_text(h).contains(&normalize::normalize_text(phrase))
            }) {
                debug!(phrase, "symptom corroborated by earlier turn");
            }
        }

        let is_emergency = score > EMERGENCY_THRESHOLD;
        let override_recommendation = if is_emergency {
            warn!(score, symptoms = ?matched_symptoms, "emergency signal detected");
            Some(Recommendation {
                level: CareLevel::Emergency,
                advice: "Warning signs were detected in what you described. Please seek \
                         emergency care now or call your local emergency number."
                    .to_string(),
                red_flags: matched_symptoms.clone(),
                triage_readiness_score: None,
                ambiguity_detected: false,
            })
        } else {
            None
        };

        SafetySignal {
            score,
            matched_symptoms,
            affected_systems,
            is_emergency,
            override_recommendation,
            trace: DetectionTrace {
                sanitized_input: sanitized,
                segments: segment_traces,
                modifiers,
                note: None,
                at: chrono::Utc::now(),
            },
        }
    }

    /// Match one punctuation-delimited segment and sort each hit into
    /// active or suppressed.
    fn scan_segment(&self, segment: &str) -> SegmentTrace {
        let seg_words = normalize::words(segment);
        let max_n = self.vocabulary.max_phrase_words();

        let mut active: Vec<MatchedKeyword> = Vec::new();
        let mut suppressed: Vec<SuppressedMatch> = Vec::new();
        let mut seen: Vec<String> = Vec::new();

        // Longest n-grams first so "chest pain" wins over any
        // single-word near-match at the same spot.
        let mut grams = crate::fuzzy::ngram_windows(&seg_words, max_n);
        grams.sort_by_key(|(_, g)| std::cmp::Reverse(g.split_whitespace().count()));

        for (start, gram) in grams {
            let Some(entry) = self.vocabulary.lookup(&gram) else {
                continue;
            };
            if crate::fuzzy::in_false_friend_phrase(segment, &gram) {
                debug!(gram, segment, "match skipped: inside false-friend phrase");
                continue;
            }
            if seen.contains(&entry.phrase) {
                continue;
            }
            seen.push(entry.phrase.clone());

            let keyword = MatchedKeyword {
                phrase: entry.phrase.clone(),
                matched_text: gram.clone(),
                severity: entry.severity,
                system: entry.system,
                absolute: entry.absolute,
            };

            if negation::is_negated(&seg_words, start) {
                debug!(phrase = %keyword.phrase, segment, "match suppressed: negated");
                suppressed.push(SuppressedMatch {
                    keyword,
                    reason: SuppressionReason::Negated,
                });
            } else if self.contextual_exclusions
                && negation::in_hedged_context(segment, &gram)
            {
                debug!(phrase = %keyword.phrase, segment, "match suppressed: hedged context");
                suppressed.push(SuppressedMatch {
                    keyword,
                    reason: SuppressionReason::HedgedContext,
                });
            } else {
                active.push(keyword);
            }
        }

        SegmentTrace {
            segment: segment.to_string(),
            active,
            suppressed,
        }
    }

    /// Whether a phrase appears un-negated in at least one segment.
    /// Danger indicators and viral symptoms go through the same
    /// negation window as vocabulary matches, so a denied indicator
    /// ("no stiff neck") cannot move the score.
    fn phrase_affirmed(&self, segment_traces: &[SegmentTrace], phrase: &str) -> bool {
        let kw = normalize::words(phrase);
        if kw.is_empty() {
            return false;
        }
        segment_traces.iter().any(|trace| {
            let seg_words = normalize::words(&trace.segment);
            seg_words
                .windows(kw.len())
                .enumerate()
                .any(|(i, win)| win == kw.as_slice() && !negation::is_negated(&seg_words, i))
        })
    }

    /// Scoring stage. See module docs for the fixed modifier order.
    fn score(
        &self,
        segment_traces: &[SegmentTrace],
        ctx: &EvaluationContext,
        modifiers: &mut Vec<String>,
    ) -> f64 {
        let base = segment_traces
            .iter()
            .map(|s| {
                s.active
                    .iter()
                    .map(|m| m.severity)
                    .fold(0.0f64, f64::max)
            })
            .fold(0.0f64, f64::max);

        let has_absolute = segment_traces
            .iter()
            .flat_map(|s| s.active.iter())
            .any(|m| m.absolute);

        let mut score = base;

        if !has_absolute && base > 0.0 {
            for indicator in &self.vocabulary.danger_indicators {
                if self.phrase_affirmed(segment_traces, &indicator.phrase) {
                    score += indicator.bonus;
                    modifiers.push(format!(
                        "danger indicator '{}': +{}",
                        indicator.phrase, indicator.bonus
                    ));
                }
            }

            let viral = self
                .vocabulary
                .viral_symptoms
                .iter()
                .filter(|s| self.phrase_affirmed(segment_traces, s))
                .count();
            if viral >= VIRAL_SYMPTOM_MINIMUM {
                if ctx.red_flag_question_active() {
                    modifiers.push(
                        "viral de-escalation skipped: red-flag question active".to_string(),
                    );
                } else {
                    score -= VIRAL_DEESCALATION;
                    modifiers.push(format!(
                        "viral symptom pattern ({viral} symptoms): -{VIRAL_DEESCALATION}"
                    ));
                }
            }

            if let Some(duration) = ctx.profile.and_then(|p| p.duration.as_deref()) {
                if is_chronic_duration(duration) {
                    score += CHRONIC_ADJUSTMENT;
                    modifiers.push(format!("chronic duration: +{CHRONIC_ADJUSTMENT}"));
                }
            }

            let systems: Vec<BodySystem> = segment_traces
                .iter()
                .flat_map(|s| s.active.iter().map(|m| m.system))
                .collect();
            if systems.contains(&BodySystem::Cardiac)
                && systems.contains(&BodySystem::Respiratory)
            {
                score += DANGER_OVERLAP_BONUS;
                modifiers.push(format!(
                    "cardiac + respiratory overlap: +{DANGER_OVERLAP_BONUS}"
                ));
            }
            if systems.contains(&BodySystem::Neurological)
                && systems.contains(&BodySystem::Trauma)
            {
                score = 10.0;
                modifiers.push("neurological + trauma overlap: forced to 10".to_string());
            }
        }

        score = score.clamp(0.0, 10.0);

        // Authority constraint: a validated, high-confidence denial
        // caps the score below the emergency line, unless an absolute
        // phrase matched. Validation runs against everything that
        // matched, suppressed included.
        if !has_absolute && score > AUTHORITY_SCORE_CAP {
            if let Some(profile) = ctx.profile {
                if profile.has_high_confidence_denial() {
                    let all_phrases: Vec<String> = segment_traces
                        .iter()
                        .flat_map(|s| {
                            s.active
                                .iter()
                                .map(|m| m.phrase.clone())
                                .chain(s.suppressed.iter().map(|m| m.keyword.phrase.clone()))
                        })
                        .collect();
                    let denial = profile.red_flag_denials.as_deref().unwrap_or("");
                    if validate_denial(denial, &all_phrases).is_validated() {
                        score = AUTHORITY_SCORE_CAP;
                        modifiers.push(
                            "authority constraint: validated high-confidence denial caps score at 7"
                                .to_string(),
                        );
                    }
                }
            }
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::DenialConfidence;

    fn detector() -> SafetyDetector {
        SafetyDetector::new()
    }

    #[test]
    fn test_severe_chest_pain_is_emergency() {
        let sig = detector().evaluate("I have severe chest pain", &EvaluationContext::user_input());
        assert_eq!(sig.score, 10.0);
        assert!(sig.is_emergency);
        assert!(sig.matched_symptoms.contains(&"chest pain".to_string()));
        assert!(sig.override_recommendation.is_some());
    }

    #[test]
    fn test_negated_chest_pain_not_active() {
        let sig = detector().evaluate("I do not have chest pain", &EvaluationContext::user_input());
        assert!(!sig.matched_symptoms.contains(&"chest pain".to_string()));
        assert!(!sig.is_emergency);
        // Still visible to authority checks
        assert!(sig.all_matched_phrases().contains(&"chest pain".to_string()));
    }

    #[test]
    fn test_contraction_denial_not_emergency() {
        let sig = detector().evaluate("I don't have chest pain", &EvaluationContext::user_input());
        assert!(!sig.matched_symptoms.contains(&"chest pain".to_string()));
        assert_eq!(sig.score, 0.0);
        assert!(!sig.is_emergency);
        assert!(sig.all_matched_phrases().contains(&"chest pain".to_string()));
    }

    #[test]
    fn test_idiom_and_near_words_do_not_score() {
        let sig = detector().evaluate(
            "finding this clinic open was a stroke of luck",
            &EvaluationContext::user_input(),
        );
        assert!(sig.matched_symptoms.is_empty());
        assert_eq!(sig.score, 0.0);
        assert!(!sig.is_emergency);
    }

    #[test]
    fn test_non_user_text_zero_signal() {
        let ctx = EvaluationContext {
            is_user_input: false,
            ..Default::default()
        };
        let sig = detector().evaluate("patient reports chest pain", &ctx);
        assert_eq!(sig.score, 0.0);
        assert!(sig.trace.note.is_some());
    }

    #[test]
    fn test_hedged_match_excluded() {
        let sig = detector().evaluate(
            "I'm worried about a stroke because my uncle had one",
            &EvaluationContext::user_input(),
        );
        assert!(!sig.matched_symptoms.contains(&"stroke".to_string()));
        assert!(sig.all_matched_phrases().contains(&"stroke".to_string()));
    }

    #[test]
    fn test_exclusions_can_be_disabled() {
        let sig = detector()
            .with_exclusions_disabled()
            .evaluate("worried about a stroke", &EvaluationContext::user_input());
        assert!(sig.matched_symptoms.contains(&"stroke".to_string()));
    }

    #[test]
    fn test_danger_indicator_additive() {
        // high fever (6) + stiff neck (+4) = 10
        let sig = detector().evaluate(
            "high fever and a stiff neck",
            &EvaluationContext::user_input(),
        );
        assert_eq!(sig.score, 10.0);
        assert!(sig.is_emergency);
    }

    #[test]
    fn test_denied_danger_indicator_does_not_escalate() {
        // high fever (6) alone; the denied indicator adds nothing
        let sig = detector().evaluate(
            "high fever but no stiff neck",
            &EvaluationContext::user_input(),
        );
        assert_eq!(sig.score, 6.0);
        assert!(!sig.is_emergency);
    }

    #[test]
    fn test_denied_viral_symptoms_not_counted() {
        // only runny nose is affirmed; one viral symptom is below the
        // de-escalation minimum, so high fever (6) stands
        let sig = detector().evaluate(
            "high fever and a runny nose but no cough and no sore throat",
            &EvaluationContext::user_input(),
        );
        assert_eq!(sig.score, 6.0);
    }

    #[test]
    fn test_viral_pattern_deescalates() {
        // high fever (6) alone with cold symptoms: 6 - 2 = 4
        let sig = detector().evaluate(
            "high fever with a runny nose and sore throat and cough",
            &EvaluationContext::user_input(),
        );
        assert_eq!(sig.score, 4.0);
        assert!(!sig.is_emergency);
    }

    #[test]
    fn test_viral_deescalation_skipped_on_red_flag_question() {
        let ctx = EvaluationContext {
            is_user_input: true,
            active_question_id: Some("red_flag.breathing"),
            ..Default::default()
        };
        let sig = detector().evaluate(
            "high fever with a runny nose and sore throat and cough",
            &ctx,
        );
        assert_eq!(sig.score, 6.0);
    }

    #[test]
    fn test_chronic_duration_adjustment() {
        let profile = ClinicalProfile {
            duration: Some("about 3 weeks".into()),
            ..Default::default()
        };
        let ctx = EvaluationContext {
            is_user_input: true,
            profile: Some(&profile),
            ..Default::default()
        };
        // wheezing (5) + chronic (+1) = 6
        let sig = detector().evaluate("wheezing on and off", &ctx);
        assert_eq!(sig.score, 6.0);
    }

    #[test]
    fn test_cardiac_respiratory_overlap() {
        // palpitations (6) + shortness of breath (8): max 8, +3 overlap, clamp 10
        let sig = detector().evaluate(
            "palpitations and shortness of breath",
            &EvaluationContext::user_input(),
        );
        assert_eq!(sig.score, 10.0);
    }

    #[test]
    fn test_neuro_trauma_forced_ten() {
        // confusion (7) + head injury (8) -> forced 10
        let sig = detector().evaluate(
            "confusion after a head injury",
            &EvaluationContext::user_input(),
        );
        assert_eq!(sig.score, 10.0);
    }

    #[test]
    fn test_authority_cap_with_validated_denial() {
        let profile = ClinicalProfile {
            red_flags_resolved: Some(true),
            red_flag_denials: Some("no chest pain and never fainting".into()),
            denial_confidence: Some(DenialConfidence::High),
            ..Default::default()
        };
        let ctx = EvaluationContext {
            is_user_input: true,
            profile: Some(&profile),
            ..Default::default()
        };
        // slurred speech (9) is not absolute; the cap applies
        let sig = detector().evaluate("slurred speech since this morning", &ctx);
        assert!(sig.score <= AUTHORITY_SCORE_CAP);
        assert!(!sig.is_emergency);
    }

    #[test]
    fn test_authority_cap_never_masks_absolute_match() {
        let profile = ClinicalProfile {
            red_flags_resolved: Some(true),
            red_flag_denials: Some("none".into()),
            denial_confidence: Some(DenialConfidence::High),
            ..Default::default()
        };
        let ctx = EvaluationContext {
            is_user_input: true,
            profile: Some(&profile),
            ..Default::default()
        };
        let sig = detector().evaluate("crushing chest pressure right now", &ctx);
        assert_eq!(sig.score, 10.0);
        assert!(sig.is_emergency);
    }

    #[test]
    fn test_empty_input_degrades() {
        let sig = detector().evaluate("   ", &EvaluationContext::user_input());
        assert_eq!(sig.score, 0.0);
        assert!(sig.trace.note.is_some());
    }
}
