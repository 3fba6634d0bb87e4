use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub const HIGH_CONFIDENCE: f64 = 0.7;
pub const MEDIUM_CONFIDENCE: f64 = 0.4;
pub const HIGH_WEIGHT: f64 = 1.0;
pub const MEDIUM_WEIGHT: f64 = 0.5;
pub const LOW_WEIGHT: f64 = 0.2;

pub const DENSITY_RATE: f64 = 0.3;
pub const DENSITY_WINDOW: f64 = 5.0;
pub const DENSITY_WEIGHT: f64 = 0.6;
pub const REPETITION_FREE_COUNT: usize = 3;
pub const REPETITION_EXPONENT: f64 = 1.5;
pub const REPETITION_SCALE: f64 = 2.0;
pub const REPETITION_MAX: f64 = 0.8;
pub const DIVERSITY_THRESHOLD: f64 = 0.6;
pub const DIVERSITY_SCALE: f64 = 1.5;
pub const MIN_LENGTH_FOR_MODIFIER: usize = 10;
pub const CONSISTENCY_MIN_CONFIDENCE: f64 = 0.5;
pub const CONSISTENCY_MAX_VARIANCE: f64 = 0.1;
pub const CONSISTENCY_BONUS: f64 = 0.3;
pub const CRITICAL_SEVERITY: f64 = 1.0;
pub const CRITICAL_CONFIDENCE: f64 = 0.9;
pub const CRITICAL_BONUS: f64 = 1.2;
pub const OBFUSCATION_THRESHOLD: f64 = 0.3;
pub const OBFUSCATION_STRONG_WEIGHT: f64 = 1.2;
pub const OBFUSCATION_WEAK_WEIGHT: f64 = 0.5;
pub const SEVERITY_SCORE_WEIGHT: f64 = 0.8;
pub const WEIGHTED_SCORE_WEIGHT: f64 = 0.1;
pub const SEVERITY_EXPONENT: f64 = 1.5;
pub const MIN_SCORE: f64 = 0.1;

pub const CRITICAL_SCORE: f64 = 4.0;
pub const HIGH_SCORE: f64 = 2.5;
pub const MEDIUM_SCORE: f64 = 1.5;
pub const LOW_SCORE: f64 = 0.5;
pub const CRITICAL_PATTERN_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    No,
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::No => "No",
            RiskLevel::Minimal => "Minimal",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        };
        f.write_str(name)
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no" | "none" => Ok(RiskLevel::No),
            "minimal" => Ok(RiskLevel::Minimal),
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!("unknown risk level: {s}")),
        }
    }
}

/// One accepted hit of a catalog rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub rule_name: String,
    /// The substring of the original text, exactly as submitted.
    pub matched: String,
    pub confidence: f64,
    pub obfuscation: f64,
    pub severity: f64,
    /// Byte offsets into the original text.
    pub original_span: (usize, usize),
}

/// Intermediate aggregate metrics, rounded to two decimals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub match_count: usize,
    pub unique_rules: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub critical_patterns: usize,
    pub average_confidence: f64,
    pub average_obfuscation: f64,
    pub average_severity: f64,
    pub base_score: f64,
    pub density_penalty: f64,
    pub repetition_penalty: f64,
    pub diversity_bonus: f64,
    pub length_modifier: f64,
    pub consistency_bonus: f64,
    pub critical_bonus: f64,
    pub obfuscation_modifier: f64,
    pub severity_score: f64,
    pub weighted_score: f64,
    pub base_components: f64,
    pub severity_multiplier: f64,
    pub raw_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub final_score: f64,
    pub risk: RiskLevel,
    pub matches: Vec<Match>,
    pub diagnostics: Diagnostics,
}

impl Evaluation {
    pub fn clean() -> Self {
        Self {
            final_score: 0.0,
            risk: RiskLevel::No,
            matches: Vec::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Whether the risk is at or above `threshold`, for gating reports and alerts.
    pub fn meets(&self, threshold: RiskLevel) -> bool {
        self.risk >= threshold
    }
}

/// Fuse the matches found in one text into a score and a risk level.
/// `normalized` is the text the literal terms were scanned against.
pub fn aggregate(matches: Vec<Match>, normalized: &str) -> Evaluation {
    if matches.is_empty() {
        return Evaluation::clean();
    }

    let text_length = normalized.chars().count();
    let count = matches.len() as f64;

    let mut high = 0usize;
    let mut medium = 0usize;
    let mut low = 0usize;
    let mut weighted_score = 0.0;
    let mut severity_score = 0.0;
    let mut obfuscation_total = 0.0;
    let mut critical_patterns = 0usize;
    for m in &matches {
        if m.confidence >= HIGH_CONFIDENCE {
            high += 1;
        } else if m.confidence >= MEDIUM_CONFIDENCE {
            medium += 1;
        } else {
            low += 1;
        }
        weighted_score += m.confidence;
        severity_score += m.confidence * m.severity;
        obfuscation_total += m.obfuscation;
        if m.severity >= CRITICAL_SEVERITY || m.confidence >= CRITICAL_CONFIDENCE {
            critical_patterns += 1;
        }
    }

    let average_confidence = weighted_score / count;
    let average_obfuscation = obfuscation_total / count;
    let average_severity = if weighted_score > 0.0 {
        severity_score / weighted_score
    } else {
        0.0
    };

    let base_score = average_severity
        * (high as f64 * HIGH_WEIGHT + medium as f64 * MEDIUM_WEIGHT + low as f64 * LOW_WEIGHT);

    let density_penalty = if text_length == 0 {
        DENSITY_WEIGHT
    } else {
        (DENSITY_RATE * count / (text_length as f64 / DENSITY_WINDOW)).tanh() * DENSITY_WEIGHT
    };

    let repetition_penalty = character_repetition_penalty(normalized);

    let unique_rules = matches
        .iter()
        .map(|m| m.rule_name.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let diversity = unique_rules as f64 / count;
    let diversity_bonus = if diversity > DIVERSITY_THRESHOLD {
        (diversity - DIVERSITY_THRESHOLD) * DIVERSITY_SCALE
    } else {
        0.0
    };

    let length_modifier =
        (1.0 + (text_length.max(MIN_LENGTH_FOR_MODIFIER) as f64).log10() / 10.0).clamp(0.5, 1.5);

    let variance = matches
        .iter()
        .map(|m| (m.confidence - average_confidence).powi(2))
        .sum::<f64>()
        / count;
    let consistency_bonus =
        if average_confidence > CONSISTENCY_MIN_CONFIDENCE && variance < CONSISTENCY_MAX_VARIANCE {
            CONSISTENCY_BONUS
        } else {
            0.0
        };

    let critical_bonus = critical_patterns as f64 * CRITICAL_BONUS;

    let obfuscation_modifier = if average_obfuscation > OBFUSCATION_THRESHOLD {
        average_obfuscation * OBFUSCATION_STRONG_WEIGHT
    } else {
        average_obfuscation * OBFUSCATION_WEAK_WEIGHT
    };

    // Clamped at zero so a higher severity can never pull the score down.
    let base_components = f64::max(
        0.0,
        base_score * length_modifier
            + severity_score * SEVERITY_SCORE_WEIGHT
            + weighted_score * WEIGHTED_SCORE_WEIGHT
            + diversity_bonus
            + consistency_bonus
            + obfuscation_modifier
            - density_penalty
            - repetition_penalty,
    );

    let severity_multiplier = average_severity.powf(SEVERITY_EXPONENT);
    let raw_score = base_components * severity_multiplier + critical_bonus;
    let final_score = f64::max(MIN_SCORE, compress(raw_score));
    let risk = classify(final_score, critical_patterns);

    log::debug!(
        "Aggregated {} matches: raw {:.3}, final {:.3}, risk {}",
        matches.len(),
        raw_score,
        final_score,
        risk
    );

    Evaluation {
        final_score,
        risk,
        diagnostics: Diagnostics {
            match_count: matches.len(),
            unique_rules,
            high_confidence: high,
            medium_confidence: medium,
            low_confidence: low,
            critical_patterns,
            average_confidence: round2(average_confidence),
            average_obfuscation: round2(average_obfuscation),
            average_severity: round2(average_severity),
            base_score: round2(base_score),
            density_penalty: round2(density_penalty),
            repetition_penalty: round2(repetition_penalty),
            diversity_bonus: round2(diversity_bonus),
            length_modifier: round2(length_modifier),
            consistency_bonus: round2(consistency_bonus),
            critical_bonus: round2(critical_bonus),
            obfuscation_modifier: round2(obfuscation_modifier),
            severity_score: round2(severity_score),
            weighted_score: round2(weighted_score),
            base_components: round2(base_components),
            severity_multiplier: round2(severity_multiplier),
            raw_score: round2(raw_score),
        },
        matches,
    }
}

/// Penalty for texts dominated by a few repeated characters ("aaaaaaa").
fn character_repetition_penalty(normalized: &str) -> f64 {
    let mut frequency: BTreeMap<char, usize> = BTreeMap::new();
    let mut total = 0usize;
    for ch in normalized.chars().filter(|c| c.is_alphanumeric()) {
        *frequency.entry(ch).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let accumulated: f64 = frequency
        .values()
        .filter(|&&count| count > REPETITION_FREE_COUNT)
        .map(|&count| ((count - REPETITION_FREE_COUNT) as f64 / total as f64).powf(REPETITION_EXPONENT))
        .sum();
    f64::min(REPETITION_MAX, accumulated * REPETITION_SCALE)
}

/// Squash large scores so a flood of matches cannot run away.
pub fn compress(score: f64) -> f64 {
    if score > 3.0 {
        3.0 + (score - 2.0).log10() * 1.5
    } else if score > 1.5 {
        1.5 + (score - 1.5).sqrt() * 0.8
    } else {
        score
    }
}

pub fn classify(final_score: f64, critical_patterns: usize) -> RiskLevel {
    if final_score >= CRITICAL_SCORE || critical_patterns >= CRITICAL_PATTERN_COUNT {
        RiskLevel::Critical
    } else if final_score >= HIGH_SCORE {
        RiskLevel::High
    } else if final_score >= MEDIUM_SCORE {
        RiskLevel::Medium
    } else if final_score >= LOW_SCORE {
        RiskLevel::Low
    } else {
        RiskLevel::Minimal
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(rule: &str, confidence: f64, severity: f64, obfuscation: f64) -> Match {
        Match {
            rule_name: rule.to_string(),
            matched: rule.to_string(),
            confidence,
            obfuscation,
            severity,
            original_span: (0, rule.len()),
        }
    }

    #[test]
    fn test_no_matches_is_no_risk() {
        let evaluation = aggregate(Vec::new(), "anything");
        assert_eq!(evaluation.final_score, 0.0);
        assert_eq!(evaluation.risk, RiskLevel::No);
        assert_eq!(evaluation.diagnostics, Diagnostics::default());
    }

    #[test]
    fn test_obfuscated_single_match() {
        // "you are a f**k" normalizes to "youareaf**k"
        let evaluation = aggregate(vec![hit("fuck", 1.0, 0.8, 0.5)], "youareaf**k");
        let d = &evaluation.diagnostics;
        assert_eq!(d.high_confidence, 1);
        assert_eq!(d.critical_patterns, 1);
        assert_eq!(d.consistency_bonus, 0.3);
        assert_eq!(d.diversity_bonus, 0.6);
        assert_eq!(d.obfuscation_modifier, 0.6);
        assert!((evaluation.final_score - 3.208).abs() < 0.005);
        assert_eq!(evaluation.risk, RiskLevel::High);
    }

    #[test]
    fn test_two_critical_patterns_force_critical() {
        let evaluation = aggregate(
            vec![
                hit("fuck", 1.0, 0.8, 0.0),
                hit("bitch", 1.0, 0.7, 0.0),
                hit("cunt", 1.0, 1.0, 0.0),
            ],
            "fuckyoubitchcunt",
        );
        assert_eq!(evaluation.diagnostics.critical_patterns, 3);
        assert_eq!(evaluation.risk, RiskLevel::Critical);
    }

    #[test]
    fn test_floor_applies_when_anything_matched() {
        let evaluation = aggregate(vec![hit("crap", 0.05, 0.1, -0.9)], "somethingcrapish");
        assert_eq!(evaluation.final_score, MIN_SCORE);
        assert_eq!(evaluation.risk, RiskLevel::Minimal);
    }

    #[test]
    fn test_higher_severity_never_lowers_score() {
        let text = "aaaaaaaaaaaaaaaaaaaa idiot";
        let mut previous = 0.0;
        for step in 0..=10 {
            let severity = step as f64 / 10.0;
            let evaluation = aggregate(vec![hit("idiot", 0.3, severity, -0.4)], text);
            assert!(evaluation.final_score >= previous);
            previous = evaluation.final_score;
        }
    }

    #[test]
    fn test_repetition_penalty() {
        assert_eq!(character_repetition_penalty(""), 0.0);
        assert_eq!(character_repetition_penalty("abcabcabc"), 0.0);
        // 17 excess 'a' out of 20 characters
        let expected = f64::min(0.8, (17.0f64 / 20.0).powf(1.5) * 2.0);
        assert_eq!(character_repetition_penalty(&"a".repeat(20)), expected);
    }

    #[test]
    fn test_compression() {
        assert_eq!(compress(1.0), 1.0);
        assert!((compress(2.0) - (1.5 + 0.5f64.sqrt() * 0.8)).abs() < 1e-12);
        assert!((compress(5.0) - (3.0 + 3.0f64.log10() * 1.5)).abs() < 1e-12);
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(classify(4.0, 0), RiskLevel::Critical);
        assert_eq!(classify(0.2, 2), RiskLevel::Critical);
        assert_eq!(classify(2.5, 1), RiskLevel::High);
        assert_eq!(classify(1.5, 0), RiskLevel::Medium);
        assert_eq!(classify(0.5, 0), RiskLevel::Low);
        assert_eq!(classify(0.49, 0), RiskLevel::Minimal);
    }

    #[test]
    fn test_risk_level_ordering_and_parsing() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Minimal > RiskLevel::No);
        assert_eq!("medium".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert!("severe".parse::<RiskLevel>().is_err());

        let evaluation = aggregate(vec![hit("fuck", 1.0, 0.8, 0.5)], "youareaf**k");
        assert!(evaluation.meets(RiskLevel::Medium));
        assert!(!evaluation.meets(RiskLevel::Critical));
    }
}
