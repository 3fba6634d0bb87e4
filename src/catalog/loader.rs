use super::{predicates, Catalog, TermRule, DEFAULT_LITERAL_SEVERITY};
use crate::error::{EngineError, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleEntry {
    Legacy(String),
    Tagged(TaggedRule),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", deny_unknown_fields)]
enum TaggedRule {
    Literal {
        text: String,
        #[serde(default = "default_severity")]
        severity: f64,
    },
    Pattern {
        name: String,
        pattern: String,
        severity: f64,
    },
    Predicate {
        name: String,
        predicate: String,
        severity: f64,
    },
}

fn default_severity() -> f64 {
    DEFAULT_LITERAL_SEVERITY
}

pub fn parse_catalog(content: &str) -> Result<Catalog> {
    let file: CatalogFile =
        serde_yaml::from_str(content).map_err(|source| EngineError::Parse {
            what: "term catalog".to_string(),
            source,
        })?;

    let mut rules = Vec::with_capacity(file.rules.len());
    for entry in file.rules {
        let rule = match entry {
            // Legacy bare strings are plain literals with the default severity.
            RuleEntry::Legacy(text) => TermRule::literal(&text, DEFAULT_LITERAL_SEVERITY)?,
            RuleEntry::Tagged(TaggedRule::Literal { text, severity }) => {
                TermRule::literal(&text, severity)?
            }
            RuleEntry::Tagged(TaggedRule::Pattern {
                name,
                pattern,
                severity,
            }) => TermRule::pattern(&name, &pattern, severity)?,
            RuleEntry::Tagged(TaggedRule::Predicate {
                name,
                predicate,
                severity,
            }) => {
                let test = predicates::lookup(&predicate)
                    .ok_or_else(|| EngineError::UnknownPredicate(predicate.clone()))?;
                TermRule::predicate(&name, test, severity)
            }
        };
        rules.push(rule);
    }

    let catalog = Catalog::new(rules);
    let counts = catalog.counts();
    log::info!(
        "Term catalog: {} literals, {} patterns, {} predicates",
        counts.literals,
        counts.patterns,
        counts.predicates
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_strings_collapse_into_literals() {
        let catalog = parse_catalog(
            r#"
rules:
  - wanker
  - { type: Literal, text: "idiot", severity: 0.4 }
  - { type: Literal, text: "plain" }
"#,
        )
        .unwrap();

        let rules = catalog.rules();
        assert_eq!(rules.len(), 3);
        assert!(matches!(&rules[0], TermRule::Literal { text, .. } if text == "wanker"));
        assert_eq!(rules[0].severity(), DEFAULT_LITERAL_SEVERITY);
        assert_eq!(rules[1].severity(), 0.4);
        assert_eq!(rules[2].severity(), DEFAULT_LITERAL_SEVERITY);
    }

    #[test]
    fn test_pattern_and_predicate_entries() {
        let catalog = parse_catalog(
            r#"
rules:
  - type: Pattern
    name: url
    pattern: 'https?://\S+'
    severity: 0.1
  - type: Predicate
    name: caps
    predicate: shouting
    severity: 0.2
"#,
        )
        .unwrap();

        assert_eq!(catalog.counts().patterns, 1);
        assert_eq!(catalog.counts().predicates, 1);
        assert_eq!(catalog.rules()[1].name(), "caps");
    }

    #[test]
    fn test_bad_regex_fails_the_whole_catalog() {
        let result = parse_catalog(
            r#"
rules:
  - idiot
  - { type: Pattern, name: broken, pattern: "[a-", severity: 0.5 }
"#,
        );
        assert!(matches!(result, Err(EngineError::InvalidPattern { .. })));
    }

    #[test]
    fn test_unknown_predicate_is_rejected() {
        let result = parse_catalog(
            "rules:\n  - { type: Predicate, name: x, predicate: telepathy, severity: 0.5 }\n",
        );
        assert!(matches!(result, Err(EngineError::UnknownPredicate(name)) if name == "telepathy"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result = parse_catalog("rules:\n  - { type: Literal, text: x, weight: 2 }\n");
        assert!(matches!(result, Err(EngineError::Parse { .. })));
    }
}
