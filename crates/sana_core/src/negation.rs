//! Negation & Context Analysis v0.3.0
//!
//! Decides whether a matched safety keyword is actually being
//! affirmed, denied, or merely mentioned. Three concerns:
//! - negation window: "I have no chest pain" must not score
//! - affirmation override: "no, wait, I DO have chest pain" must
//! - hedge/historical framing: "worried about a stroke" and "history
//!   of seizures" are not active symptoms
//!
//! Also home of denial validation, shared verbatim by the detector's
//! authority constraint and the adjudicator's Authority Block so the
//! two can never disagree on what counts as a credible denial.

use crate::normalize::{normalize_text, words};

/// How many words before a match the negation search covers.
pub const NEGATION_WINDOW: usize = 3;

/// How many words after a match trailing denial verbs cover
/// ("chest pain denied").
const TRAILING_WINDOW: usize = 2;

const NEGATION_TERMS: &[&str] = &[
    "no", "not", "never", "without", "deny", "denies", "denied", "dont",
    "doesnt", "didnt", "cant" , "isnt", "neither", "nor", "sin", "nunca",
    "niego", "niega",
];

/// Trailing verbs that negate the phrase before them.
const TRAILING_DENIAL_TERMS: &[&str] = &["denied", "denies", "negative", "negado"];

/// Words that re-affirm a symptom and cancel a preceding negation.
/// Deliberately excludes auxiliaries like "have": in "do not have
/// chest pain" the "have" sits between the negator and the symptom.
const AFFIRMATION_TERMS: &[&str] = &[
    "yes", "definitely", "certainly", "actually", "still", "currently",
    "si", "todavia", "definitivamente",
];

/// Conjunctions that break negation scope ("no fever but chest pain").
const SCOPE_BREAKERS: &[&str] = &[
    "but", "however", "although", "though", "except", "pero", "aunque",
];

/// Hedge / historical framing. A keyword inside one of these frames
/// is excluded from the active set (kept in the trace).
const HEDGE_FRAMES: &[&str] = &[
    "history of",
    "worried about",
    "afraid of",
    "scared of",
    "scared it could be",
    "in the past",
    "used to have",
    "family history",
    "runs in the family",
    "what if it is",
    "could it be",
    "preocupado por",
    "preocupada por",
    "antecedentes de",
];

/// Prefixes that make a denial statement explicit on their own.
const EXPLICIT_DENIAL_PREFIXES: &[&str] = &[
    "no ",
    "none",
    "denies",
    "denied",
    "i dont have",
    "i do not have",
    "i have no",
    "never had",
    "not having",
    "niego",
    "ninguno",
    "ninguna",
];

/// Whether the match starting at `start` in `segment_words` sits in a
/// negated context.
pub fn is_negated(segment_words: &[String], start: usize) -> bool {
    // Backward window: negation term with no intervening affirmation
    // or scope breaker.
    let window_start = start.saturating_sub(NEGATION_WINDOW);
    let mut negated = false;
    for i in (window_start..start).rev() {
        let w = segment_words[i].as_str();
        if AFFIRMATION_TERMS.contains(&w) || SCOPE_BREAKERS.contains(&w) {
            break;
        }
        if NEGATION_TERMS.contains(&w) {
            negated = true;
            break;
        }
    }
    if negated {
        return true;
    }

    // Trailing denial verbs ("chest pain denied").
    let after = (start + 1).min(segment_words.len());
    let trail_end = (after + TRAILING_WINDOW).min(segment_words.len());
    segment_words[after..trail_end]
        .iter()
        .any(|w| TRAILING_DENIAL_TERMS.contains(&w.as_str()))
}

/// Whether the segment frames the matched phrase as hypothetical or
/// historical rather than an active symptom.
pub fn in_hedged_context(segment: &str, matched_phrase: &str) -> bool {
    let norm = normalize_text(segment);
    let phrase = normalize_text(matched_phrase);
    let Some(pos) = norm.find(&phrase) else {
        return false;
    };
    let before = &norm[..pos];
    HEDGE_FRAMES.iter().any(|frame| before.contains(frame))
}

/// Outcome of denial validation, with the method that succeeded so
/// the audit trace can say why a denial was believed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialValidation {
    /// Denial text starts with an explicit denial prefix.
    ExplicitPrefix,
    /// Every matched keyword appears negated inside the denial text.
    PerKeywordNegation,
    /// Denial could not be validated; treat the symptoms as live.
    NotValidated,
}

impl DenialValidation {
    pub fn is_validated(&self) -> bool {
        !matches!(self, Self::NotValidated)
    }
}

/// Validate a red-flag denial statement against the keywords that
/// were matched in the conversation.
///
/// Used by the detector's authority constraint (score cap) and the
/// adjudicator's Authority Block (emergency downgrade). The bar is
/// deliberately high: an unvalidated denial changes nothing.
pub fn validate_denial(denial_text: &str, matched_keywords: &[String]) -> DenialValidation {
    let norm = normalize_text(denial_text);
    if norm.is_empty() {
        return DenialValidation::NotValidated;
    }

    if EXPLICIT_DENIAL_PREFIXES
        .iter()
        .any(|p| norm == p.trim() || norm.starts_with(p))
    {
        return DenialValidation::ExplicitPrefix;
    }

    if matched_keywords.is_empty() {
        return DenialValidation::NotValidated;
    }

    // Re-run negation on the denial text against every keyword. All
    // of them must appear and appear negated.
    let denial_words = words(denial_text);
    for keyword in matched_keywords {
        let kw_words = words(keyword);
        if kw_words.is_empty() {
            return DenialValidation::NotValidated;
        }
        let found = denial_words
            .windows(kw_words.len())
            .enumerate()
            .filter(|(_, win)| win.join(" ") == kw_words.join(" "))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if found.is_empty() || !found.iter().all(|&i| is_negated(&denial_words, i)) {
            return DenialValidation::NotValidated;
        }
    }
    DenialValidation::PerKeywordNegation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(s: &str) -> Vec<String> {
        words(s)
    }

    #[test]
    fn test_simple_negation() {
        // "i have no chest pain" — "chest" starts at index 3
        let seg = w("i have no chest pain");
        assert!(is_negated(&seg, 3));
    }

    #[test]
    fn test_contraction_negation() {
        // "don't" normalizes to "dont" and negates like "not"
        let seg = w("i don't have chest pain");
        assert!(is_negated(&seg, 3));
        let seg = w("it doesn't hurt when i press the rash");
        assert!(is_negated(&seg, 2));
    }

    #[test]
    fn test_negation_beyond_window() {
        // negation four words back is out of scope
        let seg = w("no doubt about it the chest pain is real");
        assert!(!is_negated(&seg, 5));
    }

    #[test]
    fn test_affirmation_overrides_negation() {
        // "not sure yes having chest pain" — affirmation between
        let seg = w("not sure yes having chest pain");
        assert!(!is_negated(&seg, 4));
    }

    #[test]
    fn test_scope_breaker_stops_negation() {
        let seg = w("no fever but chest pain");
        assert!(is_negated(&seg, 1));
        assert!(!is_negated(&seg, 3));
    }

    #[test]
    fn test_trailing_denial() {
        let seg = w("chest pain denied");
        assert!(is_negated(&seg, 0));
    }

    #[test]
    fn test_hedged_context() {
        assert!(in_hedged_context("worried about a stroke", "stroke"));
        assert!(in_hedged_context("family history of seizure", "seizure"));
        assert!(!in_hedged_context("having a seizure", "seizure"));
    }

    #[test]
    fn test_validate_denial_explicit_prefix() {
        assert_eq!(
            validate_denial("none", &[]),
            DenialValidation::ExplicitPrefix
        );
        assert_eq!(
            validate_denial("I don't have any of those", &["chest pain".into()]),
            DenialValidation::ExplicitPrefix
        );
    }

    #[test]
    fn test_validate_denial_per_keyword() {
        let kws = vec!["chest pain".to_string(), "fainting".to_string()];
        assert_eq!(
            validate_denial("without chest pain and never fainting", &kws),
            DenialValidation::PerKeywordNegation
        );
        // One keyword not negated: not validated
        assert_eq!(
            validate_denial("without chest pain and some fainting", &kws),
            DenialValidation::NotValidated
        );
    }

    #[test]
    fn test_validate_denial_hedged_text_fails() {
        assert_eq!(
            validate_denial("maybe it stopped", &["chest pain".into()]),
            DenialValidation::NotValidated
        );
    }
}
