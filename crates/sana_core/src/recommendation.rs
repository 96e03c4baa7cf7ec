//! Care Recommendation & Adjustment Log v0.4.0
//!
//! The four-level care ladder, the raw recommendation as it arrives
//! from the generative model, and the append-only log of adjudication
//! rules applied to it. Rule names and thresholds are audit data and
//! never appear in user-facing advice text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback advice when the model returned none.
pub const FALLBACK_ADVICE: &str =
    "Based on the information provided, please consult a healthcare professional.";

/// The care ladder, lowest to highest urgency. Ordering is load-
/// bearing: upgrades move right, the Authority Block may move left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CareLevel {
    SelfCare,
    HealthCenter,
    Hospital,
    Emergency,
}

impl CareLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfCare => "self-care",
            Self::HealthCenter => "health-center",
            Self::Hospital => "hospital",
            Self::Emergency => "emergency",
        }
    }

    /// One level up, saturating at emergency.
    pub fn escalate(&self) -> CareLevel {
        match self {
            Self::SelfCare => Self::HealthCenter,
            Self::HealthCenter => Self::Hospital,
            Self::Hospital | Self::Emergency => Self::Emergency,
        }
    }
}

impl std::fmt::Display for CareLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A care recommendation, either raw from the model or rewritten by
/// the adjudicator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub level: CareLevel,
    #[serde(default)]
    pub advice: String,
    /// Red flags the model says it saw.
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub triage_readiness_score: Option<f64>,
    #[serde(default)]
    pub ambiguity_detected: bool,
}

impl Recommendation {
    /// Conservative defaults for whatever the model left out. The
    /// adjudicator runs on the normalized form; malformed upstream
    /// output is the orchestrator's problem to report, not ours to
    /// crash on.
    pub fn normalized(mut self) -> Self {
        if self.advice.trim().is_empty() {
            self.advice = FALLBACK_ADVICE.to_string();
        }
        self.red_flags.retain(|f| !f.trim().is_empty());
        if let Some(score) = self.triage_readiness_score {
            if !score.is_finite() {
                self.triage_readiness_score = None;
            } else {
                self.triage_readiness_score = Some(score.clamp(0.0, 1.0));
            }
        }
        self
    }
}

/// Named adjudication rules. Closed set; every log entry carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentRule {
    RedFlagUpgrade,
    ReadinessUpgrade,
    RecentResolvedFloor,
    AuthorityDowngrade,
    AuthorityRetain,
}

impl AdjustmentRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RedFlagUpgrade => "RED_FLAG_UPGRADE",
            Self::ReadinessUpgrade => "READINESS_UPGRADE",
            Self::RecentResolvedFloor => "RECENT_RESOLVED_FLOOR",
            Self::AuthorityDowngrade => "AUTHORITY_DOWNGRADE",
            Self::AuthorityRetain => "AUTHORITY_RETAIN",
        }
    }
}

/// One applied rule: which, the level transition, and a reason safe
/// to surface to clinicians reviewing the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentEntry {
    pub rule: AdjustmentRule,
    pub from: CareLevel,
    pub to: CareLevel,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Ordered, append-only record of every rule the adjudicator applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdjustmentLog {
    entries: Vec<AdjustmentEntry>,
}

impl AdjustmentLog {
    pub fn record(&mut self, rule: AdjustmentRule, from: CareLevel, to: CareLevel, reason: &str) {
        self.entries.push(AdjustmentEntry {
            rule,
            from,
            to,
            reason: reason.to_string(),
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[AdjustmentEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn applied(&self, rule: AdjustmentRule) -> bool {
        self.entries.iter().any(|e| e.rule == rule)
    }
}
