//! Input Sanitization v0.2.0
//!
//! First stage of the Safety Detector pipeline. Transcripts arrive
//! with role labels and occasional prompt-injection framing; strip
//! that without discarding any patient content, then split into
//! punctuation-delimited segments so negation scope stays local.

use regex::Regex;
use std::sync::LazyLock;

/// Role/label prefixes at the start of a line ("User: ...",
/// "patient> ...", "[assistant] ...").
static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*\[?(system|assistant|user|patient|doctor|ai|bot|model)\]?\s*[:>\-]\s*")
        .expect("label prefix regex is valid")
});

/// System-prompt phrasing that sometimes leaks into extracted text.
static PROMPT_FRAMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(ignore (all )?previous instructions|you are a helpful assistant|as an ai( language)? model)[,.]?")
        .expect("prompt framing regex is valid")
});

/// Strip label prefixes and prompt framing, preserving patient text.
pub fn sanitize(text: &str) -> String {
    let stripped = LABEL_PREFIX.replace_all(text, "");
    let stripped = PROMPT_FRAMING.replace_all(&stripped, " ");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Split sanitized text into punctuation-delimited segments.
/// Negation and scoring operate per segment so "no fever, but chest
/// pain" negates only the fever.
pub fn segments(text: &str) -> Vec<String> {
    text.split(['.', ',', ';', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
