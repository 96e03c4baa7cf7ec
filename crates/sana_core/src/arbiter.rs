//! Conversation Arbiter v0.4.0
//!
//! One control signal per turn: keep questioning, stop, or redirect.
//! The arbiter is an ordered cascade of guard gates; the first gate
//! that fires wins and later gates never run. Gate order is the
//! safety argument — the red-flag gate sits above everything that
//! could terminate early except the absolute turn ceiling.
//!
//! The arbiter holds no conversation state. The stability counter is
//! the only value that crosses turns, and it travels inside
//! `SessionState`, owned and persisted by the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::{numeric_field_equivalent, text_equivalent};
use crate::profile::{ClinicalProfile, SymptomCategory};
use crate::protocols::{default_protocols, match_protocol, ClinicalProtocol};

/// Absolute turn ceiling; nothing keeps a conversation open past it.
pub const HARD_CAP_TURNS: u32 = 12;
/// Ceiling for the closure gate.
pub const CLOSURE_CEILING_TURNS: u32 = 10;
/// Minimum turns for a simple complaint.
pub const MIN_TURNS_SIMPLE: u32 = 4;
/// Minimum turns for complex/critical complaints and vulnerable patients.
pub const MIN_TURNS_COMPLEX: u32 = 7;
/// Identical consecutive profiles needed before saturation can fire.
pub const STABILITY_REQUIRED: u32 = 2;
/// Maximum clarification attempts for a low-confidence denial.
pub const MAX_CLARIFICATION_ATTEMPTS: u32 = 2;
/// Generic readiness bar when no protocol matches the complaint.
pub const COMPLETENESS_READINESS: f64 = 0.90;
/// Consistency below this is severe enough to restart clarification.
pub const SEVERE_INCONSISTENCY: f64 = 0.3;

/// The closed signal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlSignal {
    Terminate,
    Continue,
    PrioritizeRedFlags,
    ResolveAmbiguity,
    RequireClarification,
    DrillDown,
}

impl ControlSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminate => "terminate",
            Self::Continue => "continue",
            Self::PrioritizeRedFlags => "prioritize_red_flags",
            Self::ResolveAmbiguity => "resolve_ambiguity",
            Self::RequireClarification => "require_clarification",
            Self::DrillDown => "drill_down",
        }
    }
}

impl std::fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The only cross-turn state. A value, not a reference: the caller
/// persists what `evaluate` returns and passes it back next turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub stability_counter: u32,
}

/// One planned question in the orchestrator's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedQuestion {
    pub id: String,
    /// 1 = core intake, 2 = follow-up, 3 = rule-out depth.
    pub tier: u8,
    #[serde(default)]
    pub is_red_flag: bool,
    #[serde(default)]
    pub attempted: bool,
}

/// Everything the arbiter sees for one turn.
#[derive(Debug, Clone)]
pub struct TurnContext<'a> {
    pub history: &'a [String],
    pub profile: &'a ClinicalProfile,
    pub previous_profile: Option<&'a ClinicalProfile>,
    pub current_turn: u32,
    pub total_planned_questions: u32,
    pub remaining_questions: &'a [PlannedQuestion],
    pub clarification_attempts: u32,
    pub initial_symptom: &'a str,
    pub session: SessionState,
}

/// The per-turn verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterDecision {
    pub signal: ControlSignal,
    pub reason: String,
    #[serde(default)]
    pub next_step_hints: Vec<String>,
    /// Ask the orchestrator to restart clarification from scratch.
    #[serde(default)]
    pub reset_requested: bool,
    /// Updated stability counter; caller stores it in SessionState.
    pub stability_counter: u32,
}

impl ArbiterDecision {
    fn new(signal: ControlSignal, reason: impl Into<String>, counter: u32) -> Self {
        ArbiterDecision {
            signal,
            reason: reason.into(),
            next_step_hints: Vec::new(),
            reset_requested: false,
            stability_counter: counter,
        }
    }

    fn with_hints(mut self, hints: Vec<String>) -> Self {
        self.next_step_hints = hints;
        self
    }

    fn with_reset(mut self) -> Self {
        self.reset_requested = true;
        self
    }

    pub fn updated_session(&self) -> SessionState {
        SessionState {
            stability_counter: self.stability_counter,
        }
    }
}

type Gate = fn(&ConversationArbiter, &TurnContext, u32) -> Option<ArbiterDecision>;

/// The arbiter: protocol table plus the gate cascade. Pure; safe to
/// share across conversations.
pub struct ConversationArbiter {
    protocols: Vec<ClinicalProtocol>,
}

impl Default for ConversationArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationArbiter {
    /// First firing gate wins. Order is the contract; see module docs.
    const GATES: &'static [(&'static str, Gate)] = &[
        ("hard_cap", Self::gate_hard_cap),
        ("low_confidence_denial", Self::gate_low_confidence_denial),
        ("mandatory_red_flags", Self::gate_mandatory_red_flags),
        ("clinical_sanity", Self::gate_clinical_sanity),
        ("saturation", Self::gate_saturation),
        ("turn_floor", Self::gate_turn_floor),
        ("depth_requirement", Self::gate_depth_requirement),
        ("data_completeness", Self::gate_data_completeness),
        ("closure", Self::gate_closure),
    ];

    pub fn new() -> Self {
        ConversationArbiter {
            protocols: default_protocols(),
        }
    }

    pub fn with_protocols(protocols: Vec<ClinicalProtocol>) -> Self {
        ConversationArbiter { protocols }
    }

    /// Evaluate one turn. Never raises; garbage in the context
    /// resolves to the most conservative signal the gates produce.
    pub fn evaluate(&self, ctx: &TurnContext) -> ArbiterDecision {
        let counter = self.updated_stability_counter(ctx);

        for (name, gate) in Self::GATES {
            if let Some(decision) = gate(self, ctx, counter) {
                debug!(
                    gate = %name,
                    signal = %decision.signal,
                    turn = ctx.current_turn,
                    "arbiter gate fired"
                );
                return decision;
            }
        }

        // The closure gate always returns a decision; this is the
        // conservative backstop should the cascade ever change.
        ArbiterDecision::new(
            ControlSignal::Continue,
            "no gate produced a decision; continuing conservatively",
            counter,
        )
    }

    /// Saturation bookkeeping: identical consecutive profiles (after
    /// numeric-semantic normalization) increment the counter, any new
    /// information resets it.
    fn updated_stability_counter(&self, ctx: &TurnContext) -> u32 {
        let Some(prev) = ctx.previous_profile else {
            return 0;
        };
        if profiles_stable(ctx.profile, prev) {
            ctx.session.stability_counter + 1
        } else {
            0
        }
    }

    fn gate_hard_cap(&self, ctx: &TurnContext, counter: u32) -> Option<ArbiterDecision> {
        (ctx.current_turn >= HARD_CAP_TURNS).then(|| {
            ArbiterDecision::new(
                ControlSignal::Terminate,
                format!("absolute turn ceiling ({HARD_CAP_TURNS}) reached"),
                counter,
            )
        })
    }

    fn gate_low_confidence_denial(
        &self,
        ctx: &TurnContext,
        counter: u32,
    ) -> Option<ArbiterDecision> {
        use crate::profile::DenialConfidence;
        if ctx.profile.denial_confidence == Some(DenialConfidence::Low)
            && ctx.clarification_attempts < MAX_CLARIFICATION_ATTEMPTS
        {
            return Some(
                ArbiterDecision::new(
                    ControlSignal::RequireClarification,
                    "red-flag denial was hesitant; ask again in plain terms",
                    counter,
                )
                .with_hints(vec!["restate the red-flag question without jargon".into()]),
            );
        }
        None
    }

    fn gate_mandatory_red_flags(
        &self,
        ctx: &TurnContext,
        counter: u32,
    ) -> Option<ArbiterDecision> {
        if ctx.profile.red_flags_resolved == Some(true) {
            return None;
        }
        let unattempted: Vec<String> = ctx
            .remaining_questions
            .iter()
            .filter(|q| q.is_red_flag && !q.attempted)
            .map(|q| q.id.clone())
            .collect();
        if !unattempted.is_empty() {
            return Some(
                ArbiterDecision::new(
                    ControlSignal::PrioritizeRedFlags,
                    "red-flag screening incomplete; ask warning-sign questions next",
                    counter,
                )
                .with_hints(unattempted),
            );
        }
        Some(ArbiterDecision::new(
            ControlSignal::Continue,
            "mandatory safety gate: red flags not yet resolved",
            counter,
        ))
    }

    fn gate_clinical_sanity(&self, ctx: &TurnContext, counter: u32) -> Option<ArbiterDecision> {
        // Category escalated since last turn: the picture got worse,
        // dig into the new category before anything else.
        if let (Some(prev), Some(curr)) = (
            ctx.previous_profile.and_then(|p| p.symptom_category),
            ctx.profile.symptom_category,
        ) {
            if curr > prev {
                return Some(
                    ArbiterDecision::new(
                        ControlSignal::DrillDown,
                        format!(
                            "complaint reclassified {} -> {}; probe the escalation",
                            prev.as_str(),
                            curr.as_str()
                        ),
                        counter,
                    )
                    .with_hints(vec![format!("ask {}-track questions", curr.as_str())]),
                );
            }
        }

        if ctx.profile.ambiguity_detected && !ctx.profile.uncertainty_accepted {
            return Some(ArbiterDecision::new(
                ControlSignal::ResolveAmbiguity,
                "answers are ambiguous and the ambiguity is unresolved",
                counter,
            ));
        }

        if ctx.profile.inconsistency_detected {
            let severe = ctx
                .profile
                .consistency_score
                .map(|s| s < SEVERE_INCONSISTENCY)
                .unwrap_or(false);
            if severe {
                return Some(
                    ArbiterDecision::new(
                        ControlSignal::RequireClarification,
                        "answers contradict each other badly; start clarification over",
                        counter,
                    )
                    .with_reset(),
                );
            }
            let tier3: Vec<String> = ctx
                .remaining_questions
                .iter()
                .filter(|q| q.tier == 3 && !q.attempted)
                .map(|q| q.id.clone())
                .collect();
            if !tier3.is_empty() {
                return Some(
                    ArbiterDecision::new(
                        ControlSignal::Continue,
                        "contradiction detected; exhaust rule-out questions first",
                        counter,
                    )
                    .with_hints(tier3),
                );
            }
        }
        None
    }

    fn gate_saturation(&self, ctx: &TurnContext, counter: u32) -> Option<ArbiterDecision> {
        if ctx.profile.effective_readiness() >= 1.0 && counter >= STABILITY_REQUIRED {
            return Some(ArbiterDecision::new(
                ControlSignal::Terminate,
                "clinical saturation: repeated turns add no new information",
                counter,
            ));
        }
        None
    }

    fn gate_turn_floor(&self, ctx: &TurnContext, counter: u32) -> Option<ArbiterDecision> {
        let complex = matches!(
            ctx.profile.symptom_category,
            Some(SymptomCategory::Complex) | Some(SymptomCategory::Critical)
        ) || ctx.profile.is_vulnerable();
        let floor = if complex {
            MIN_TURNS_COMPLEX
        } else {
            MIN_TURNS_SIMPLE
        };
        if ctx.current_turn < floor {
            return Some(ArbiterDecision::new(
                ControlSignal::Continue,
                format!("below the minimum of {floor} turns for this presentation"),
                counter,
            ));
        }
        None
    }

    fn gate_depth_requirement(&self, ctx: &TurnContext, counter: u32) -> Option<ArbiterDecision> {
        if !matches!(
            ctx.profile.symptom_category,
            Some(SymptomCategory::Complex) | Some(SymptomCategory::Critical)
        ) {
            return None;
        }
        let tier3: Vec<String> = ctx
            .remaining_questions
            .iter()
            .filter(|q| q.tier == 3 && !q.attempted)
            .map(|q| q.id.clone())
            .collect();
        if tier3.is_empty() {
            return None;
        }
        Some(
            ArbiterDecision::new(
                ControlSignal::Continue,
                "complex presentation still has rule-out questions pending",
                counter,
            )
            .with_hints(tier3),
        )
    }

    fn gate_data_completeness(&self, ctx: &TurnContext, counter: u32) -> Option<ArbiterDecision> {
        let profile = ctx.profile;
        let mut missing: Vec<&str> = Vec::new();
        if !profile.has_age() {
            missing.push("age");
        }
        if !profile.has_duration() {
            missing.push("duration");
        }
        if !profile.has_severity() {
            missing.push("severity");
        }
        if !profile.has_red_flag_denials() {
            missing.push("red_flag_denials");
        }
        if !missing.is_empty() {
            return Some(
                ArbiterDecision::new(
                    ControlSignal::Continue,
                    format!("core clinical data missing: {}", missing.join(", ")),
                    counter,
                )
                .with_hints(missing.iter().map(|m| format!("ask about {m}")).collect()),
            );
        }

        let complaint = profile
            .chief_complaint
            .as_deref()
            .unwrap_or(ctx.initial_symptom);
        if let Some(protocol) = match_protocol(&self.protocols, complaint) {
            let unfilled = protocol.missing_slots(profile);
            if !unfilled.is_empty() {
                return Some(
                    ArbiterDecision::new(
                        ControlSignal::Continue,
                        format!(
                            "{} protocol still needs: {}",
                            protocol.name,
                            unfilled
                                .iter()
                                .map(|s| s.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                        counter,
                    )
                    .with_hints(
                        unfilled.iter().map(|s| format!("ask about {}", s.as_str())).collect(),
                    ),
                );
            }
        } else if profile.effective_readiness() < COMPLETENESS_READINESS {
            return Some(ArbiterDecision::new(
                ControlSignal::Continue,
                "readiness below the completeness bar without a matching protocol",
                counter,
            ));
        }

        // A perfect readiness score over contradictory answers is a
        // false positive, not a reason to stop.
        if profile.effective_readiness() >= 1.0 && profile.inconsistency_detected {
            return Some(
                ArbiterDecision::new(
                    ControlSignal::RequireClarification,
                    "completeness looks perfect but answers conflict; clarify before stopping",
                    counter,
                )
                .with_reset(),
            );
        }
        None
    }

    fn gate_closure(&self, ctx: &TurnContext, counter: u32) -> Option<ArbiterDecision> {
        let budget_exhausted = ctx
            .remaining_questions
            .iter()
            .all(|q| q.attempted)
            || ctx.remaining_questions.is_empty();
        if budget_exhausted {
            return Some(ArbiterDecision::new(
                ControlSignal::Terminate,
                "planned question budget exhausted",
                counter,
            ));
        }
        if ctx.current_turn >= CLOSURE_CEILING_TURNS {
            return Some(ArbiterDecision::new(
                ControlSignal::Terminate,
                format!("closure ceiling ({CLOSURE_CEILING_TURNS} turns) reached"),
                counter,
            ));
        }
        Some(ArbiterDecision::new(
            ControlSignal::Continue,
            "questions remain and no stopping condition holds",
            counter,
        ))
    }
}

/// Structural stability between consecutive profiles. Numeric fields
/// compare by value ("7/10" equals "a 7"); text fields compare in
/// normalized form.
pub fn profiles_stable(current: &ClinicalProfile, previous: &ClinicalProfile) -> bool {
    numeric_field_equivalent(current.age.as_deref(), previous.age.as_deref())
        && numeric_field_equivalent(current.severity.as_deref(), previous.severity.as_deref())
        && text_equivalent(current.duration.as_deref(), previous.duration.as_deref(), false)
        && text_equivalent(
            current.progression.as_deref(),
            previous.progression.as_deref(),
            false,
        )
        && text_equivalent(
            current.red_flag_denials.as_deref(),
            previous.red_flag_denials.as_deref(),
            true,
        )
        && current.symptom_category == previous.symptom_category
        && current.red_flags_resolved == previous.red_flags_resolved
}
