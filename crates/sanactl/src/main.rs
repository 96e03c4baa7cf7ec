//! Sana Control - offline harness for the triage decision core
//!
//! Runs the detector, arbiter, and adjudicator from the terminal
//! against ad-hoc text or recorded sessions. No network, no model:
//! this is the deterministic half of the assistant on its own.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use sana_core::arbiter::{PlannedQuestion, SessionState, TurnContext};
use sana_core::detector::EvaluationContext;
use sana_core::{
    adjudicate, CareLevel, ClinicalProfile, ControlSignal, ConversationArbiter, Recommendation,
    SafetyDetector, Vocabulary,
};

#[derive(Parser)]
#[command(name = "sanactl")]
#[command(about = "Sana triage decision core - offline harness", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the safety detector on one line of text
    Scan {
        /// The text to scan
        text: String,

        /// Active question id (red-flag questions change scoring)
        #[arg(long)]
        question_id: Option<String>,

        /// Print the full audit trace as JSON
        #[arg(long)]
        trace: bool,
    },

    /// Replay a recorded session through the full pipeline
    Replay {
        /// Path to a session JSON file
        file: PathBuf,
    },

    /// Validate a regional vocabulary file
    VocabCheck {
        /// Path to a vocabulary JSON file
        file: PathBuf,
    },
}

/// One recorded turn: what the patient said and the profile the
/// extractor produced afterwards.
#[derive(Debug, Deserialize)]
struct ReplayTurn {
    text: String,
    profile: ClinicalProfile,
}

/// A recorded conversation plus the model's raw recommendation.
#[derive(Debug, Deserialize)]
struct ReplaySession {
    initial_symptom: String,
    #[serde(default)]
    planned_questions: Vec<PlannedQuestion>,
    turns: Vec<ReplayTurn>,
    raw_recommendation: Option<Recommendation>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .init();
    }

    match cli.command {
        Commands::Scan {
            text,
            question_id,
            trace,
        } => scan(&text, question_id.as_deref(), trace),
        Commands::Replay { file } => replay(&file),
        Commands::VocabCheck { file } => vocab_check(&file),
    }
}

fn level_colored(level: CareLevel) -> String {
    match level {
        CareLevel::SelfCare => level.to_string().green().to_string(),
        CareLevel::HealthCenter => level.to_string().yellow().to_string(),
        CareLevel::Hospital => level.to_string().red().to_string(),
        CareLevel::Emergency => level.to_string().red().bold().to_string(),
    }
}

fn scan(text: &str, question_id: Option<&str>, trace: bool) -> Result<()> {
    let detector = SafetyDetector::new();
    let ctx = EvaluationContext {
        is_user_input: true,
        profile: None,
        history: &[],
        active_question_id: question_id,
    };
    let signal = detector.evaluate(text, &ctx);

    println!("score:     {:.1}/10", signal.score);
    println!(
        "emergency: {}",
        if signal.is_emergency {
            "YES".red().bold().to_string()
        } else {
            "no".green().to_string()
        }
    );
    if !signal.matched_symptoms.is_empty() {
        println!("matched:   {}", signal.matched_symptoms.join(", "));
    }
    if !signal.affected_systems.is_empty() {
        let systems: Vec<&str> = signal.affected_systems.iter().map(|s| s.as_str()).collect();
        println!("systems:   {}", systems.join(", "));
    }
    if let Some(rec) = &signal.override_recommendation {
        println!("override:  {} - {}", level_colored(rec.level), rec.advice);
    }
    if trace {
        println!("{}", serde_json::to_string_pretty(&signal.trace)?);
    }
    Ok(())
}

fn replay(file: &PathBuf) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("cannot read session file {}", file.display()))?;
    let session: ReplaySession =
        serde_json::from_str(&raw).context("session file is not valid session JSON")?;

    let detector = SafetyDetector::new();
    let arbiter = ConversationArbiter::new();
    let mut state = SessionState::default();
    let mut previous: Option<&ClinicalProfile> = None;
    let mut terminated = false;

    for (i, turn) in session.turns.iter().enumerate() {
        let turn_no = (i + 1) as u32;
        println!("{}", format!("--- turn {turn_no} ---").dimmed());
        println!("patient: {}", turn.text);

        let ctx = EvaluationContext {
            is_user_input: true,
            profile: Some(&turn.profile),
            history: &[],
            active_question_id: None,
        };
        let signal = detector.evaluate(&turn.text, &ctx);
        println!("signal:  {:.1}/10", signal.score);

        if signal.is_emergency {
            if let Some(rec) = &signal.override_recommendation {
                println!(
                    "{} {} - {}",
                    "EMERGENCY:".red().bold(),
                    level_colored(rec.level),
                    rec.advice
                );
            }
            terminated = true;
            break;
        }

        let decision = arbiter.evaluate(&TurnContext {
            history: &[],
            profile: &turn.profile,
            previous_profile: previous,
            current_turn: turn_no,
            total_planned_questions: session.planned_questions.len() as u32,
            remaining_questions: &session.planned_questions,
            clarification_attempts: 0,
            initial_symptom: &session.initial_symptom,
            session: state,
        });
        println!(
            "arbiter: {} ({}), stability {}",
            decision.signal.to_string().cyan(),
            decision.reason,
            decision.stability_counter
        );
        state = decision.updated_session();
        previous = Some(&turn.profile);

        if decision.signal == ControlSignal::Terminate {
            terminated = true;
            let profile = &turn.profile;
            if let Some(raw_rec) = session.raw_recommendation.clone() {
                let (rec, log) = adjudicate(raw_rec, profile, &signal);
                println!("final:   {} - {}", level_colored(rec.level), rec.advice);
                for entry in log.entries() {
                    println!(
                        "  {} {} -> {}: {}",
                        entry.rule.as_str().dimmed(),
                        entry.from,
                        entry.to,
                        entry.reason
                    );
                }
            } else {
                println!("final:   no raw recommendation recorded; nothing to adjudicate");
            }
            break;
        }
    }

    if !terminated {
        println!("session ended without a termination signal");
    }
    Ok(())
}

fn vocab_check(file: &PathBuf) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("cannot read vocabulary file {}", file.display()))?;
    match Vocabulary::from_json_str(&raw) {
        Ok(vocab) => {
            println!(
                "{} {} entries, {} danger indicators, {} viral symptoms",
                "ok:".green(),
                vocab.entries.len(),
                vocab.danger_indicators.len(),
                vocab.viral_symptoms.len()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} {e}", "invalid:".red());
            std::process::exit(1);
        }
    }
}
