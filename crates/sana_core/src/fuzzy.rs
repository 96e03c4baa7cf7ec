//! Fuzzy Phrase Matching v0.2.0
//!
//! Bounded edit-distance matching between user text and the safety
//! vocabulary. Misspellings of safety-critical symptoms must still
//! match ("chset pain", "hemorage"), but the bound is tight enough
//! that unrelated words do not, and a false-friend denylist catches
//! the known near-misses the distance test would accept.

use crate::normalize::normalize_text;

/// Words that sit within fuzzy range of a vocabulary phrase but are
/// clinically unrelated. Checked before the distance test.
const FALSE_FRIENDS: &[&str] = &[
    "chess",     // chest
    "painting",  // fainting
    "finding",   // fainting
    "strike",    // stroke
    "stroke of luck",
    "collage",   // collapse
    "season",    // seizure (es: "sazon" also unrelated)
    "breading",  // bleeding
    "bleaching", // bleeding
    "heartburn commercial",
];

/// Levenshtein distance, two-row DP.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Maximum tolerated edit distance for a phrase of this length.
/// Short phrases must match exactly; typo tolerance grows slowly.
pub fn max_distance_for(phrase_len: usize) -> usize {
    match phrase_len {
        0..=4 => 0,
        5..=7 => 1,
        _ => 2,
    }
}

/// Whether `candidate` (an n-gram from user text) fuzzy-matches a
/// vocabulary `phrase`. Both sides are normalized before comparison.
pub fn fuzzy_match(candidate: &str, phrase: &str) -> bool {
    let cand = normalize_text(candidate);
    let phrase = normalize_text(phrase);
    if cand.is_empty() || phrase.is_empty() {
        return false;
    }
    if is_false_friend(&cand) {
        return false;
    }
    if cand == phrase {
        return true;
    }
    edit_distance(&cand, &phrase) <= max_distance_for(phrase.chars().count())
}

/// Known unrelated near-match check.
pub fn is_false_friend(candidate: &str) -> bool {
    let norm = normalize_text(candidate);
    FALSE_FRIENDS.iter().any(|f| norm == *f)
}

/// Whether the candidate sits inside a longer false-friend phrase
/// present in the surrounding segment. Catches the inner words of
/// idioms: "stroke" inside "a stroke of luck" is not a symptom.
pub fn in_false_friend_phrase(segment: &str, candidate: &str) -> bool {
    let seg = normalize_text(segment);
    let cand = normalize_text(candidate);
    if cand.is_empty() {
        return false;
    }
    FALSE_FRIENDS.iter().any(|f| {
        f.split_whitespace().count() > 1 && f.contains(&cand) && seg.contains(f)
    })
}

/// Sliding n-gram windows (1..=max_n words) over a word list, with
/// the start index of each window.
pub fn ngram_windows(words: &[String], max_n: usize) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    for n in 1..=max_n {
        if words.len() < n {
            break;
        }
        for start in 0..=(words.len() - n) {
            out.push((start, words[start..start + n].join(" ")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_basics() {
        assert_eq!(edit_distance("chest", "chest"), 0);
        assert_eq!(edit_distance("chset", "chest"), 2);
        assert_eq!(edit_distance("hemorage", "hemorrhage"), 2);
    }

    #[test]
    fn test_exact_match_required_for_short_phrases() {
        assert!(fuzzy_match("rash", "rash"));
        assert!(!fuzzy_match("cash", "rash"));
    }

    #[test]
    fn test_typo_tolerance_on_long_phrases() {
        assert!(fuzzy_match("chest pian", "chest pain"));
        assert!(fuzzy_match("dificulty breathing", "difficulty breathing"));
    }

    #[test]
    fn test_false_friend_denied() {
        // "chess" is edit distance 1 from "chest" but never a symptom
        assert!(!fuzzy_match("chess", "chest"));
        assert!(!fuzzy_match("painting", "fainting"));
        assert!(!fuzzy_match("finding", "fainting"));
    }

    #[test]
    fn test_false_friend_phrase_covers_inner_words() {
        assert!(in_false_friend_phrase("it was a stroke of luck", "stroke"));
        assert!(!in_false_friend_phrase("i think he had a stroke", "stroke"));
        assert!(!in_false_friend_phrase("stroke of luck", "fever"));
    }

    #[test]
    fn test_ngram_windows() {
        let w: Vec<String> = ["severe", "chest", "pain"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let grams = ngram_windows(&w, 3);
        assert!(grams.iter().any(|(i, g)| *i == 1 && g == "chest pain"));
        assert!(grams.iter().any(|(i, g)| *i == 0 && g == "severe chest pain"));
        assert_eq!(grams.len(), 3 + 2 + 1);
    }
}
