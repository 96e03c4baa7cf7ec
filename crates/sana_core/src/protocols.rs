//! Clinical Protocols v0.2.0
//!
//! Per-complaint data requirements. When the chief complaint matches
//! a protocol, the completeness gate checks the protocol's required
//! slots instead of the generic readiness threshold. Like the safety
//! vocabulary, protocols are data: the built-in set covers the common
//! presentations and deployments can extend it.

use serde::{Deserialize, Serialize};

use crate::normalize::normalize_text;
use crate::profile::ClinicalProfile;

/// A profile field a protocol can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSlot {
    Age,
    Duration,
    Severity,
    Progression,
    RedFlagDenials,
}

impl ProfileSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Duration => "duration",
            Self::Severity => "severity",
            Self::Progression => "progression",
            Self::RedFlagDenials => "red_flag_denials",
        }
    }

    pub fn is_filled(&self, profile: &ClinicalProfile) -> bool {
        match self {
            Self::Age => profile.has_age(),
            Self::Duration => profile.has_duration(),
            Self::Severity => profile.has_severity(),
            Self::Progression => profile.has_progression(),
            Self::RedFlagDenials => profile.has_red_flag_denials(),
        }
    }
}

/// Required slots for one class of chief complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalProtocol {
    pub name: String,
    /// Normalized keywords matched against the chief complaint.
    pub complaint_keywords: Vec<String>,
    pub required_slots: Vec<ProfileSlot>,
}

impl ClinicalProtocol {
    pub fn matches(&self, chief_complaint: &str) -> bool {
        let norm = normalize_text(chief_complaint);
        self.complaint_keywords
            .iter()
            .any(|k| norm.contains(&normalize_text(k)))
    }

    pub fn missing_slots(&self, profile: &ClinicalProfile) -> Vec<ProfileSlot> {
        self.required_slots
            .iter()
            .copied()
            .filter(|slot| !slot.is_filled(profile))
            .collect()
    }
}

/// The built-in protocol set.
pub fn default_protocols() -> Vec<ClinicalProtocol> {
    use ProfileSlot::*;
    vec![
        ClinicalProtocol {
            name: "chest-pain".into(),
            complaint_keywords: vec![
                "chest pain".into(),
                "chest pressure".into(),
                "dolor de pecho".into(),
            ],
            required_slots: vec![Age, Duration, Severity, Progression, RedFlagDenials],
        },
        ClinicalProtocol {
            name: "abdominal-pain".into(),
            complaint_keywords: vec![
                "stomach".into(),
                "abdominal".into(),
                "belly".into(),
                "dolor abdominal".into(),
            ],
            required_slots: vec![Age, Duration, Severity, RedFlagDenials],
        },
        ClinicalProtocol {
            name: "headache".into(),
            complaint_keywords: vec![
                "headache".into(),
                "migraine".into(),
                "dolor de cabeza".into(),
            ],
            required_slots: vec![Age, Duration, Severity, Progression, RedFlagDenials],
        },
        ClinicalProtocol {
            name: "fever".into(),
            complaint_keywords: vec!["fever".into(), "temperature".into(), "fiebre".into()],
            required_slots: vec![Age, Duration, RedFlagDenials],
        },
    ]
}

/// First protocol matching the chief complaint, if any.
pub fn match_protocol<'a>(
    protocols: &'a [ClinicalProtocol],
    chief_complaint: &str,
) -> Option<&'a ClinicalProtocol> {
    protocols.iter().find(|p| p.matches(chief_complaint))
}
