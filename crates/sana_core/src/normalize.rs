//! Text Normalization v0.2.0
//!
//! Shared normalization helpers for the triage core:
//! - Canonical lowercase/whitespace form for phrase comparison
//! - Absence-token detection ("unknown", "n/a", "none")
//! - Numeric-semantic equivalence for spoken scale notations
//!   ("7/10" vs "a 7" vs "seven out of ten")
//!
//! Every comparison the Arbiter makes between consecutive Clinical
//! Profiles goes through these helpers, so a reworded but clinically
//! identical answer does not reset the stability counter.

/// Tokens that mean "this field was not actually provided"
const ABSENCE_TOKENS: &[&str] = &[
    "",
    "unknown",
    "n/a",
    "na",
    "none",
    "not provided",
    "not specified",
    "no data",
    "nil",
    "null",
    "desconocido",
    "no especificado",
];

/// Spelled-out numbers we accept in severity/age answers
const NUMBER_WORDS: &[(&str, f64)] = &[
    ("zero", 0.0),
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
    ("six", 6.0),
    ("seven", 7.0),
    ("eight", 8.0),
    ("nine", 9.0),
    ("ten", 10.0),
    ("cero", 0.0),
    ("uno", 1.0),
    ("dos", 2.0),
    ("tres", 3.0),
    ("cuatro", 4.0),
    ("cinco", 5.0),
    ("seis", 6.0),
    ("siete", 7.0),
    ("ocho", 8.0),
    ("nueve", 9.0),
    ("diez", 10.0),
];

/// Canonical comparison form: lowercase, punctuation stripped to
/// spaces, whitespace collapsed. Apostrophes elide instead of
/// splitting so contractions keep their negating token ("don't"
/// becomes "dont", not "don t").
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut last_space = true;
    for ch in lowered.chars() {
        if ch == '\'' || ch == '\u{2019}' {
            continue;
        }
        if ch.is_alphanumeric() || ch == '/' {
            out.push(ch);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Split normalized text into words.
pub fn words(text: &str) -> Vec<String> {
    normalize_text(text)
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// Whether a field value counts as "not provided".
///
/// `allow_none` is set for fields where "none" is a real answer
/// (red-flag denials: "none" means "I deny all of them").
pub fn is_absent(value: &str, allow_none: bool) -> bool {
    let norm = normalize_text(value);
    if allow_none && (norm == "none" || norm == "ninguno" || norm == "ninguna") {
        return false;
    }
    ABSENCE_TOKENS.iter().any(|t| norm == normalize_text(t))
}

/// Extract the clinically meaningful number from a free-text answer.
///
/// Handles "7/10" (take the numerator), "a 7", "about 45", "seven out
/// of ten". Returns the first number found.
pub fn extract_numeric(text: &str) -> Option<f64> {
    let norm = normalize_text(text);
    for word in norm.split_whitespace() {
        // Scale notation: numerator of x/y
        if let Some((num, _den)) = word.split_once('/') {
            if let Ok(v) = num.parse::<f64>() {
                return Some(v);
            }
        }
        if let Ok(v) = word.parse::<f64>() {
            return Some(v);
        }
        if let Some((_, v)) = NUMBER_WORDS.iter().find(|(w, _)| *w == word) {
            return Some(*v);
        }
    }
    None
}

/// Numeric-semantic equivalence: equal numbers, or (when neither side
/// parses) equal normalized text.
pub fn numeric_equivalent(a: &str, b: &str) -> bool {
    match (extract_numeric(a), extract_numeric(b)) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        (None, None) => normalize_text(a) == normalize_text(b),
        _ => false,
    }
}

/// Strict equivalence for non-numeric fields (duration, progression,
/// denial text): normalized-text equality, with absence on both sides
/// also counting as equal.
pub fn text_equivalent(a: Option<&str>, b: Option<&str>, allow_none: bool) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => {
            let xa = is_absent(x, allow_none);
            let ya = is_absent(y, allow_none);
            if xa || ya {
                xa == ya
            } else {
                normalize_text(x) == normalize_text(y)
            }
        }
        (None, None) => true,
        (Some(x), None) => is_absent(x, allow_none),
        (None, Some(y)) => is_absent(y, allow_none),
    }
}

/// Numeric-semantic equivalence lifted over optional fields.
pub fn numeric_field_equivalent(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => {
            let xa = is_absent(x, false);
            let ya = is_absent(y, false);
            if xa || ya {
                xa == ya
            } else {
                numeric_equivalent(x, y)
            }
        }
        (None, None) => true,
        (Some(x), None) => is_absent(x, false),
        (None, Some(y)) => is_absent(y, false),
    }
}

/// Whether a duration answer describes a chronic course (weeks or
/// longer). Used by the detector's chronic-duration modifier.
pub fn is_chronic_duration(duration: &str) -> bool {
    let norm = normalize_text(duration);
    if norm.contains("chronic") || norm.contains("cronico") || norm.contains("cronica") {
        return true;
    }
    let tokens: Vec<&str> = norm.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        let unit = token.trim_end_matches('s');
        let long_unit = matches!(unit, "week" | "month" | "year" | "semana" | "mes" | "ano");
        if !long_unit {
            continue;
        }
        // "weeks" alone counts; "2 weeks" counts; "under a week" does not
        match tokens.get(i.wrapping_sub(1)) {
            Some(prev) if *prev == "a" || *prev == "an" || *prev == "una" || *prev == "un" => {
                // "under a week", "less than a week", "menos de una
                // semana": a sub-unit qualifier before the article
                // keeps the duration acute.
                let qualified = tokens[..i - 1].iter().rev().take(2).any(|t| {
                    matches!(
                        *t,
                        "under" | "within" | "less" | "than" | "almost" | "nearly"
                            | "barely" | "menos" | "casi"
                    )
                });
                if !qualified {
                    return true;
                }
            }
            Some(prev) => {
                if prev.parse::<f64>().map(|v| v >= 1.0).unwrap_or(true) {
                    return true;
                }
            }
            None => return true,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize_text("Chest pain, severe!"), "chest pain severe");
    }

    #[test]
    fn test_normalize_elides_apostrophes() {
        assert_eq!(normalize_text("I don't, can't"), "i dont cant");
        assert_eq!(normalize_text("it doesn\u{2019}t hurt"), "it doesnt hurt");
    }

    #[test]
    fn test_absence_tokens() {
        assert!(is_absent("unknown", false));
        assert!(is_absent("N/A", false));
        assert!(is_absent("none", false));
        assert!(!is_absent("none", true));
        assert!(!is_absent("3 days", false));
    }

    #[test]
    fn test_scale_notation_equivalence() {
        assert!(numeric_equivalent("7/10", "a 7"));
        assert!(numeric_equivalent("seven out of ten", "7"));
        assert!(!numeric_equivalent("7/10", "8/10"));
    }

    #[test]
    fn test_numeric_field_absent_vs_present() {
        assert!(!numeric_field_equivalent(Some("7"), None));
        assert!(numeric_field_equivalent(Some("unknown"), None));
        assert!(numeric_field_equivalent(None, None));
    }

    #[test]
    fn test_chronic_duration() {
        assert!(is_chronic_duration("about 3 weeks"));
        assert!(is_chronic_duration("a month now"));
        assert!(is_chronic_duration("chronic"));
        assert!(!is_chronic_duration("2 hours"));
        assert!(!is_chronic_duration("since yesterday"));
    }

    #[test]
    fn test_sub_week_durations_not_chronic() {
        assert!(!is_chronic_duration("under a week"));
        assert!(!is_chronic_duration("less than a week"));
        assert!(!is_chronic_duration("menos de una semana"));
        assert!(is_chronic_duration("a week already"));
    }

    #[test]
    fn test_text_equivalent_rewording_differs() {
        assert!(text_equivalent(Some("getting worse"), Some("Getting worse."), false));
        assert!(!text_equivalent(Some("getting worse"), Some("stable"), false));
        assert!(text_equivalent(Some("unknown"), None, false));
    }
}
