//! Per-match confidence: how faithfully the raw matched text reproduces the
//! catalog term, adjusted by the obfuscation score.

use std::collections::BTreeMap;

/// Characters counted as padding inside a match.
pub const FILLER_CHARS: [char; 4] = ['*', '#', '_', '-'];

pub const CHAR_QUALITY_WEIGHT: f64 = 0.25;
pub const LENGTH_WEIGHT: f64 = 0.20;
pub const CLUSTER_WEIGHT: f64 = 0.15;
pub const REPETITION_WEIGHT: f64 = 0.25;
pub const ACCURACY_WEIGHT: f64 = 0.15;

pub const LENGTH_OVERRUN_PENALTY: f64 = 0.4;
pub const CLUSTER_FREE_RUN: usize = 2;
pub const CLUSTER_STEP: f64 = 0.1;
pub const CLUSTER_MAX_PENALTY: f64 = 0.5;
pub const REPETITION_FREE_COUNT: usize = 2;
pub const REPETITION_SCALE: f64 = 0.8;
pub const REPETITION_FLOOR: f64 = 0.3;

pub const BASE_ACCEPTANCE: f64 = 0.15;
pub const ACCEPTANCE_STEP_PER_CHAR: f64 = 0.02;
pub const MIN_ACCEPTANCE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchQuality {
    pub char_quality: f64,
    pub length_penalty: f64,
    pub cluster_penalty: f64,
    pub repetition_penalty: f64,
    pub pattern_accuracy: f64,
    pub score: f64,
}

fn is_filler(ch: char) -> bool {
    FILLER_CHARS.contains(&ch)
}

pub fn assess(matched_raw: &str, rule_text: &str) -> MatchQuality {
    let chars: Vec<char> = matched_raw.chars().collect();
    let rule: Vec<char> = rule_text.chars().flat_map(char::to_lowercase).collect();

    let actual = chars.iter().filter(|c| c.is_alphanumeric()).count();
    let filler = chars.iter().filter(|c| is_filler(**c)).count();

    let char_quality = if actual + filler > 0 {
        actual as f64 / (actual + filler) as f64
    } else {
        0.0
    };

    let length_penalty = if rule.is_empty() {
        0.0
    } else {
        // A match shorter than its term scores above 1 here; the total is clamped.
        let overrun = chars.len() as f64 / rule.len() as f64 - 1.0;
        f64::max(0.0, 1.0 - overrun * LENGTH_OVERRUN_PENALTY)
    };

    let mut longest_run = 0;
    let mut run = 0;
    for &ch in &chars {
        if is_filler(ch) {
            run += 1;
            longest_run = longest_run.max(run);
        } else {
            run = 0;
        }
    }
    let cluster_penalty = if longest_run > CLUSTER_FREE_RUN {
        1.0 - ((longest_run - CLUSTER_FREE_RUN) as f64 * CLUSTER_STEP).min(CLUSTER_MAX_PENALTY)
    } else {
        1.0
    };

    let mut counts: BTreeMap<char, usize> = BTreeMap::new();
    for ch in chars.iter().filter(|c| c.is_alphanumeric()) {
        for lower in ch.to_lowercase() {
            *counts.entry(lower).or_default() += 1;
        }
    }
    let excess: usize = counts
        .values()
        .filter(|&&count| count > REPETITION_FREE_COUNT)
        .map(|count| count - REPETITION_FREE_COUNT)
        .sum();
    let repetition_penalty = if actual > 0 {
        f64::max(
            REPETITION_FLOOR,
            1.0 - (excess as f64 / actual as f64) * REPETITION_SCALE,
        )
    } else {
        1.0
    };

    let mut faithful = 0;
    for (position, ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            continue;
        }
        let expected = rule.get(position).copied();
        if ch.to_lowercase().eq(expected.into_iter()) {
            faithful += 1;
        }
    }
    let pattern_accuracy = if actual > 0 {
        faithful as f64 / actual as f64
    } else {
        0.0
    };

    let score = (CHAR_QUALITY_WEIGHT * char_quality
        + LENGTH_WEIGHT * length_penalty
        + CLUSTER_WEIGHT * cluster_penalty
        + REPETITION_WEIGHT * repetition_penalty
        + ACCURACY_WEIGHT * pattern_accuracy)
        .clamp(0.0, 1.0);

    MatchQuality {
        char_quality,
        length_penalty,
        cluster_penalty,
        repetition_penalty,
        pattern_accuracy,
        score,
    }
}

pub fn score(matched_raw: &str, rule_text: &str) -> f64 {
    assess(matched_raw, rule_text).score
}

/// Fold the obfuscation score into the quality score.
pub fn apply_obfuscation(confidence: f64, obfuscation: f64) -> f64 {
    if obfuscation < -0.5 {
        confidence * f64::max(0.01, 1.0 + 3.0 * obfuscation)
    } else if obfuscation < -0.2 {
        confidence * f64::max(0.1, 1.0 + 2.0 * obfuscation)
    } else if obfuscation > 0.3 {
        f64::min(1.0, confidence + 0.3 * obfuscation)
    } else {
        confidence
    }
}

/// Minimum confidence for a literal match of a term `rule_len` characters long.
pub fn acceptance_threshold(rule_len: usize) -> f64 {
    f64::max(
        MIN_ACCEPTANCE,
        BASE_ACCEPTANCE - ACCEPTANCE_STEP_PER_CHAR * rule_len as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_exact_match_scores_full() {
        let quality = assess("fuck", "fuck");
        assert!(approx(quality.score, 1.0));
        assert!(approx(score("FUCK", "fuck"), 1.0));
    }

    #[test]
    fn test_filler_masked_match() {
        let quality = assess("f**k", "fuck");
        assert!(approx(quality.char_quality, 0.5));
        assert!(approx(quality.length_penalty, 1.0));
        assert!(approx(quality.cluster_penalty, 1.0));
        assert!(approx(quality.pattern_accuracy, 1.0));
        assert!(approx(quality.score, 0.875));
    }

    #[test]
    fn test_long_filler_cluster_penalised() {
        let quality = assess("f####k", "fuck");
        assert!(approx(quality.cluster_penalty, 0.8));
        assert!(approx(quality.length_penalty, 0.8));
    }

    #[test]
    fn test_repetition_and_overrun() {
        let quality = assess("fuuuuuck", "fuck");
        assert!(approx(quality.length_penalty, 0.6));
        assert!(approx(quality.repetition_penalty, 0.7));
        assert!(approx(quality.pattern_accuracy, 0.25));
        assert!(approx(quality.score, 0.7325));
    }

    #[test]
    fn test_short_match_length_is_unbounded_above() {
        // "&" expands to "and", so a raw match can be shorter than its term.
        let quality = assess("s&", "sand");
        assert!(approx(quality.length_penalty, 1.2));
        assert!(quality.score <= 1.0);
    }

    #[test]
    fn test_obfuscation_modifier_bands() {
        assert!(approx(apply_obfuscation(1.0, -0.95), 0.01));
        assert!(approx(apply_obfuscation(1.0, -0.3), 0.4));
        assert!(approx(apply_obfuscation(0.8, 0.5), 0.95));
        assert!(approx(apply_obfuscation(0.9, 0.5), 1.0));
        assert!(approx(apply_obfuscation(0.9, 0.0), 0.9));
        assert!(approx(apply_obfuscation(0.9, -0.2), 0.9));
    }

    #[test]
    fn test_acceptance_threshold_drops_with_length() {
        assert!(approx(acceptance_threshold(3), 0.09));
        assert!(approx(acceptance_threshold(4), 0.07));
        assert!(approx(acceptance_threshold(7), MIN_ACCEPTANCE));
        assert!(approx(acceptance_threshold(20), MIN_ACCEPTANCE));
    }
}
