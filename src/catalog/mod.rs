pub mod loader;
pub mod predicates;

use crate::error::{EngineError, Result};
use predicates::PredicateFn;
use regex::Regex;
use std::path::Path;

/// Severity given to legacy bare-string catalog entries.
pub const DEFAULT_LITERAL_SEVERITY: f64 = 0.5;

const BUILTIN_CATALOG: &str = include_str!("../../configs/catalog.yaml");

/// One detection rule of the catalog.
#[derive(Debug, Clone)]
pub enum TermRule {
    /// A plain-language term matched tolerantly against normalized text.
    Literal {
        text: String,
        severity: f64,
        multi_word: bool,
    },
    /// A regular expression applied to the raw text.
    Pattern {
        name: String,
        regex: Regex,
        severity: f64,
    },
    /// A boolean test over the raw text.
    Predicate {
        name: String,
        test: PredicateFn,
        severity: f64,
    },
}

impl TermRule {
    pub fn literal(text: &str, severity: f64) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::InvalidRule("literal term is empty".to_string()));
        }
        Ok(TermRule::Literal {
            text: text.to_string(),
            severity: clamp_severity(severity),
            multi_word: text.chars().any(char::is_whitespace),
        })
    }

    pub fn pattern(name: &str, pattern: &str, severity: f64) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| EngineError::InvalidPattern {
            name: name.to_string(),
            source,
        })?;
        Ok(TermRule::Pattern {
            name: name.to_string(),
            regex,
            severity: clamp_severity(severity),
        })
    }

    pub fn predicate(name: &str, test: PredicateFn, severity: f64) -> Self {
        TermRule::Predicate {
            name: name.to_string(),
            test,
            severity: clamp_severity(severity),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TermRule::Literal { text, .. } => text,
            TermRule::Pattern { name, .. } | TermRule::Predicate { name, .. } => name,
        }
    }

    pub fn severity(&self) -> f64 {
        match self {
            TermRule::Literal { severity, .. }
            | TermRule::Pattern { severity, .. }
            | TermRule::Predicate { severity, .. } => *severity,
        }
    }
}

fn clamp_severity(severity: f64) -> f64 {
    if severity.is_nan() {
        0.0
    } else {
        severity.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub literals: usize,
    pub patterns: usize,
    pub predicates: usize,
}

/// Ordered, immutable list of detection rules.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    rules: Vec<TermRule>,
}

impl Catalog {
    pub fn new(rules: Vec<TermRule>) -> Self {
        Self { rules }
    }

    pub fn builtin() -> Result<Self> {
        loader::parse_catalog(BUILTIN_CATALOG)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        loader::parse_catalog(content)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = loader::parse_catalog(&content)?;
        log::info!(
            "Loaded {} catalog rules from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn rules(&self) -> &[TermRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn counts(&self) -> CatalogCounts {
        let mut counts = CatalogCounts::default();
        for rule in &self.rules {
            match rule {
                TermRule::Literal { .. } => counts.literals += 1,
                TermRule::Pattern { .. } => counts.patterns += 1,
                TermRule::Predicate { .. } => counts.predicates += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_is_clamped() {
        assert_eq!(TermRule::literal("word", 1.7).unwrap().severity(), 1.0);
        assert_eq!(TermRule::literal("word", -0.2).unwrap().severity(), 0.0);
        assert_eq!(TermRule::literal("word", f64::NAN).unwrap().severity(), 0.0);
    }

    #[test]
    fn test_multi_word_detected() {
        match TermRule::literal(" kill yourself ", 1.0).unwrap() {
            TermRule::Literal {
                text, multi_word, ..
            } => {
                assert_eq!(text, "kill yourself");
                assert!(multi_word);
            }
            other => panic!("Expected literal, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_pattern_is_fatal() {
        let result = TermRule::pattern("broken", "(unclosed", 0.5);
        match result {
            Err(EngineError::InvalidPattern { name, .. }) => assert_eq!(name, "broken"),
            other => panic!("Expected InvalidPattern, got {other:?}"),
        }
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        let counts = catalog.counts();
        assert!(counts.literals > 20);
        assert_eq!(counts.patterns, 6);
        assert_eq!(counts.predicates, 2);
        assert_eq!(catalog.rules()[0].name(), "fuck");
    }
}
