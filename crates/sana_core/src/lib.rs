//! Sana Core - Deterministic decision core for symptom triage
//!
//! Three pure components sit beside the generative model and have the
//! final word on safety:
//! - [`detector::SafetyDetector`] scans raw user text for red flags,
//!   with fuzzy matching, negation, and contextual exclusion
//! - [`arbiter::ConversationArbiter`] decides, turn by turn, whether
//!   enough reliable clinical information has been gathered
//! - [`adjudicator::adjudicate`] rewrites the model's proposed care
//!   level against a deterministic safety floor
//!
//! Everything is synchronous and value-in/value-out. The stability
//! counter inside [`arbiter::SessionState`] is the only cross-turn
//! state, and the caller owns it.

pub mod adjudicator;
pub mod arbiter;
pub mod detector;
pub mod error;
pub mod fuzzy;
pub mod negation;
pub mod normalize;
pub mod profile;
pub mod protocols;
pub mod recommendation;
pub mod sanitize;
pub mod signal;
pub mod vocabulary;

pub use adjudicator::adjudicate;
pub use arbiter::{ArbiterDecision, ControlSignal, ConversationArbiter, SessionState, TurnContext};
pub use detector::{EvaluationContext, SafetyDetector};
pub use error::TriageError;
pub use profile::{ClinicalProfile, DenialConfidence, SymptomCategory};
pub use recommendation::{AdjustmentLog, AdjustmentRule, CareLevel, Recommendation};
pub use signal::SafetySignal;
pub use vocabulary::{BodySystem, Vocabulary};
