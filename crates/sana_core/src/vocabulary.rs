//! Safety Vocabulary v0.3.0
//!
//! Severity-scored, multilingual keyword table for the Safety
//! Detector. The table is data, not code: a compiled-in default ships
//! with the crate, and deployments can load a regional file with
//! `Vocabulary::from_json_str` without touching the scoring logic.
//!
//! Severity scale is 1..=10. Entries with `absolute: true` mean the
//! phrase alone mandates an emergency; no modifier or authority cap
//! may lower it.

use serde::{Deserialize, Serialize};

use crate::error::TriageError;
use crate::fuzzy;
use crate::normalize::normalize_text;

/// Default table, embedded at compile time.
const DEFAULT_VOCABULARY_JSON: &str = include_str!("../data/default_vocabulary.json");

/// Body system a vocabulary entry belongs to. Overlap rules in the
/// detector key off combinations of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodySystem {
    Cardiac,
    Respiratory,
    Neurological,
    Trauma,
    Gastrointestinal,
    Obstetric,
    Systemic,
    Other,
}

impl BodySystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cardiac => "cardiac",
            Self::Respiratory => "respiratory",
            Self::Neurological => "neurological",
            Self::Trauma => "trauma",
            Self::Gastrointestinal => "gastrointestinal",
            Self::Obstetric => "obstetric",
            Self::Systemic => "systemic",
            Self::Other => "other",
        }
    }
}

/// One severity-scored phrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabEntry {
    pub phrase: String,
    pub severity: f64,
    pub system: BodySystem,
    #[serde(default)]
    pub absolute: bool,
}

/// A co-occurring phrase that raises the score additively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DangerIndicator {
    pub phrase: String,
    pub bonus: f64,
}

/// The loaded table: safety phrases, additive danger indicators, and
/// the common-viral-symptom list used for de-escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    pub entries: Vec<VocabEntry>,
    #[serde(default)]
    pub danger_indicators: Vec<DangerIndicator>,
    #[serde(default)]
    pub viral_symptoms: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        // A parse failure here is a build defect, not a runtime
        // condition. An empty fallback table would silently detect
        // nothing, which is the one failure mode this crate must
        // never have.
        Self::from_json_str(DEFAULT_VOCABULARY_JSON)
            .expect("embedded default vocabulary is valid")
    }
}

impl Vocabulary {
    /// Load and validate a regional vocabulary file.
    pub fn from_json_str(json: &str) -> Result<Self, TriageError> {
        let vocab: Vocabulary = serde_json::from_str(json)?;
        if vocab.entries.is_empty() {
            return Err(TriageError::EmptyVocabulary);
        }
        for entry in &vocab.entries {
            if !(1.0..=10.0).contains(&entry.severity) {
                return Err(TriageError::SeverityOutOfRange {
                    phrase: entry.phrase.clone(),
                    severity: entry.severity,
                });
            }
        }
        Ok(vocab)
    }

    /// Longest phrase length in words; bounds the n-gram window.
    pub fn max_phrase_words(&self) -> usize {
        self.entries
            .iter()
            .map(|e| normalize_text(&e.phrase).split_whitespace().count())
            .max()
            .unwrap_or(1)
            .min(3)
    }

    /// Find the best vocabulary entry fuzzy-matching a candidate
    /// n-gram. Exact normalized matches win over fuzzy ones; among
    /// fuzzy matches the highest severity wins.
    pub fn lookup(&self, candidate: &str) -> Option<&VocabEntry> {
        let norm = normalize_text(candidate);
        if norm.is_empty() || fuzzy::is_false_friend(&norm) {
            return None;
        }
        let mut best: Option<&VocabEntry> = None;
        for entry in &self.entries {
            if normalize_text(&entry.phrase) == norm {
                return Some(entry);
            }
            if fuzzy::fuzzy_match(&norm, &entry.phrase) {
                match best {
                    Some(b) if b.severity >= entry.severity => {}
                    _ => best = Some(entry),
                }
            }
        }
        best
    }

}
