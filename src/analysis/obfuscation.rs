//! Judges whether a raw match looks like deliberate evasion (positive score)
//! or an innocent fragment of a longer word (negative score).

use crate::error::{EngineError, Result};
use regex::RegexSet;
use serde::Deserialize;
use std::ops::Range;
use std::path::Path;

pub const CROSS_BOUNDARY_VETO: f64 = -0.95;
pub const CASE_TOGGLE_RATIO: f64 = 0.3;
pub const CASE_TOGGLE_BONUS: f64 = 0.3;
pub const SEPARATOR_RATIO: f64 = 0.3;
pub const SEPARATOR_MAX_BONUS: f64 = 0.5;
pub const SUBSTITUTION_MAX_BONUS: f64 = 0.3;
pub const STANDALONE_CORRECTION: f64 = 0.2;

pub const BOUNDARY_CONTEXT: usize = 8;
pub const LEGITIMATE_WORD_SCORE: f64 = -0.8;
pub const EMBEDDED_WORD_SCORE: f64 = -0.5;
pub const NO_CONTEXT_VETO: f64 = -0.9;
pub const PADDING_THRESHOLD: f64 = 0.4;
pub const CONCATENATED_WINDOW_MIN: usize = 15;

pub const PADDING_CONSONANT_CLUSTER: f64 = 0.4;
pub const PADDING_ODD_DOUBLE_ENDING: f64 = 0.35;
pub const PADDING_SHORT_PREFIX: f64 = 0.25;
pub const PADDING_SHORT_SUFFIX: f64 = 0.2;
pub const PADDING_UNCOMMON_COMBINATION: f64 = 0.3;
pub const PADDING_LOW_VOWEL_RATIO: f64 = 0.3;
const LOW_VOWEL_RATIO: f64 = 0.2;

const SUBSTITUTION_CHARS: [char; 3] = ['@', '$', '!'];
const COMMON_DOUBLED_ENDINGS: [&str; 10] = [
    "ll", "ss", "tt", "nn", "mm", "pp", "dd", "bb", "gg", "ff",
];
const COMMON_SUFFIXES: [&str; 11] = [
    "er", "ed", "ing", "ion", "ly", "al", "ful", "less", "ness", "ment", "s",
];

const BUILTIN_LEGITIMATE_WORDS: &str = include_str!("../../configs/legitimate_words.yaml");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegitimateWordsFile {
    patterns: Vec<String>,
}

#[derive(Debug)]
pub struct ObfuscationAnalyzer {
    legitimate_words: RegexSet,
}

impl ObfuscationAnalyzer {
    pub fn new<I, S>(legitimate_words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = legitimate_words
            .into_iter()
            .map(|p| format!("(?i){}", p.as_ref()))
            .collect();
        let legitimate_words =
            RegexSet::new(&patterns).map_err(|source| EngineError::InvalidPattern {
                name: "legitimate word whitelist".to_string(),
                source,
            })?;
        Ok(Self { legitimate_words })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_LEGITIMATE_WORDS)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: LegitimateWordsFile =
            serde_yaml::from_str(content).map_err(|source| EngineError::Parse {
                what: "legitimate word whitelist".to_string(),
                source,
            })?;
        Self::new(file.patterns)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Score the `span` (byte range) of `raw` in [-1, 1].
    pub fn analyze(&self, raw: &str, span: Range<usize>, multi_word: bool) -> f64 {
        let matched = &raw[span.clone()];
        if !multi_word && matched.chars().any(char::is_whitespace) {
            return CROSS_BOUNDARY_VETO;
        }

        let chars: Vec<char> = matched.chars().collect();
        let span_len = chars.len().max(1) as f64;
        let mut score = 0.0;

        let toggles = chars
            .windows(2)
            .filter(|pair| {
                pair[0].is_alphabetic()
                    && pair[1].is_alphabetic()
                    && pair[0].is_uppercase() != pair[1].is_uppercase()
            })
            .count();
        if toggles as f64 / span_len > CASE_TOGGLE_RATIO {
            score += CASE_TOGGLE_BONUS;
        }

        let letters = chars.iter().filter(|c| c.is_alphabetic()).count();
        let separators = chars
            .iter()
            .filter(|&&c| c.is_ascii_punctuation() && !SUBSTITUTION_CHARS.contains(&c))
            .count();
        if separators > 0 && letters > 0 {
            let ratio = separators as f64 / letters as f64;
            if ratio > SEPARATOR_RATIO {
                score += SEPARATOR_MAX_BONUS * ratio.min(1.0);
            }
        }

        let boundary = self.word_boundary_signal(raw, span.clone(), multi_word);
        score += boundary;

        let substitutions = chars
            .iter()
            .filter(|&&c| c.is_ascii_digit() || SUBSTITUTION_CHARS.contains(&c))
            .count();
        if substitutions > 0 {
            score += SUBSTITUTION_MAX_BONUS * (substitutions as f64 / span_len).min(1.0);
        }

        if boundary < 0.0 {
            if is_camel_case_joint(raw, span) {
                score += STANDALONE_CORRECTION;
            } else {
                score -= STANDALONE_CORRECTION;
            }
        }

        score.clamp(-1.0, 1.0)
    }

    /// How the characters around the match bear on it being a standalone word.
    pub fn word_boundary_signal(&self, raw: &str, span: Range<usize>, multi_word: bool) -> f64 {
        let preceding = &raw[..span.start];
        let following = &raw[span.end..];
        let matched = &raw[span];

        let window_before: String = last_chars(preceding, BOUNDARY_CONTEXT);
        let window_after: String = following.chars().take(BOUNDARY_CONTEXT).collect();
        let window = format!("{window_before}{matched}{window_after}").to_lowercase();
        if self.legitimate_words.is_match(&window) {
            return LEGITIMATE_WORD_SCORE;
        }

        let letter_before = preceding.chars().next_back().is_some_and(char::is_alphabetic);
        let letter_after = following.chars().next().is_some_and(char::is_alphabetic);

        let flank_before = last_letters(preceding, BOUNDARY_CONTEXT);
        let flank_after: String = following
            .chars()
            .take_while(|c| c.is_alphabetic())
            .take(BOUNDARY_CONTEXT)
            .collect();

        match (letter_before, letter_after) {
            (true, true) => {
                if padding_likelihood(&flank_before, &flank_after) >= PADDING_THRESHOLD {
                    return 0.0;
                }
                let flanks = format!("{window_before}{window_after}");
                if flanks.chars().count() > CONCATENATED_WINDOW_MIN
                    && !flanks.chars().any(char::is_uppercase)
                    && !flanks.chars().any(char::is_whitespace)
                {
                    return 0.0;
                }
                EMBEDDED_WORD_SCORE
            }
            // A partial boundary is never penalised, padded or not.
            (true, false) | (false, true) => 0.0,
            (false, false) => {
                if !multi_word && matched.chars().any(char::is_whitespace) {
                    NO_CONTEXT_VETO
                } else {
                    0.0
                }
            }
        }
    }
}

/// Likelihood in [0, 1] that the letters flanking a match are random padding
/// rather than the rest of a real word.
pub fn padding_likelihood(before: &str, after: &str) -> f64 {
    let before = before.to_lowercase();
    let after = after.to_lowercase();
    let mut score = 0.0;

    if longest_consonant_run(&before) >= 3 || longest_consonant_run(&after) >= 3 {
        score += PADDING_CONSONANT_CLUSTER;
    }

    let tail: Vec<char> = after.chars().rev().take(2).collect();
    if tail.len() == 2 && tail[0] == tail[1] && tail[0].is_alphabetic() {
        let doubled: String = tail.iter().collect();
        if !COMMON_DOUBLED_ENDINGS.contains(&doubled.as_str()) {
            score += PADDING_ODD_DOUBLE_ENDING;
        }
    }

    if (1..=2).contains(&before.chars().count()) {
        score += PADDING_SHORT_PREFIX;
    }

    let after_len = after.chars().count();
    if after_len > 0 && after_len <= 3 && !COMMON_SUFFIXES.contains(&after.as_str()) {
        score += PADDING_SHORT_SUFFIX;
    }

    if has_uncommon_combination(&before) || has_uncommon_combination(&after) {
        score += PADDING_UNCOMMON_COMBINATION;
    }

    let combined = format!("{before}{after}");
    let letters = combined.chars().filter(|c| c.is_alphabetic()).count();
    if letters > 0 {
        let vowels = combined.chars().filter(|c| is_vowel(*c)).count();
        if (vowels as f64 / letters as f64) < LOW_VOWEL_RATIO {
            score += PADDING_LOW_VOWEL_RATIO;
        }
    }

    f64::min(score, 1.0)
}

fn is_vowel(ch: char) -> bool {
    matches!(ch, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn is_consonant(ch: char) -> bool {
    ch.is_ascii_alphabetic() && !is_vowel(ch.to_ascii_lowercase())
}

fn longest_consonant_run(text: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for ch in text.chars() {
        if is_consonant(ch) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

/// `q` without a following `u`, a doubled `j q x z`, or four consonants in a row.
fn has_uncommon_combination(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let q_without_u = chars
        .windows(2)
        .any(|pair| pair[0] == 'q' && pair[1] != 'u');
    let rare_double = chars
        .windows(2)
        .any(|pair| pair[0] == pair[1] && matches!(pair[0], 'j' | 'q' | 'x' | 'z'));
    q_without_u || rare_double || longest_consonant_run(text) >= 4
}

fn is_camel_case_joint(raw: &str, span: Range<usize>) -> bool {
    let matched = &raw[span.clone()];
    let before = raw[..span.start].chars().next_back();
    let after = raw[span.end..].chars().next();
    let first = matched.chars().next();
    let last = matched.chars().next_back();

    let joint_before = matches!((before, first), (Some(b), Some(f)) if b.is_lowercase() && f.is_uppercase());
    let joint_after = matches!((last, after), (Some(l), Some(a)) if l.is_lowercase() && a.is_uppercase());
    joint_before || joint_after
}

fn last_chars(text: &str, count: usize) -> String {
    let mut tail: Vec<char> = text.chars().rev().take(count).collect();
    tail.reverse();
    tail.into_iter().collect()
}

fn last_letters(text: &str, count: usize) -> String {
    let mut tail: Vec<char> = text
        .chars()
        .rev()
        .take_while(|c| c.is_alphabetic())
        .take(count)
        .collect();
    tail.reverse();
    tail.into_iter().collect()
}
