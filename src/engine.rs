use crate::analysis::match_quality;
use crate::analysis::{acceptance_threshold, apply_obfuscation, ObfuscationAnalyzer};
use crate::catalog::predicates::PredicateFn;
use crate::catalog::{Catalog, TermRule};
use crate::confusables::ConfusableTable;
use crate::error::{EngineError, Result};
use crate::normalization::{NormalizedText, Normalizer};
use crate::pattern_compiler::{PatternCompiler, TolerantPattern};
use crate::risk::{aggregate, Evaluation, Match};
use regex::Regex;

/// Confidence reported for regex and predicate hits, which carry no fuzziness.
pub const EXACT_CONFIDENCE: f64 = 1.0;

#[derive(Debug)]
struct LiteralRule {
    name: String,
    severity: f64,
    multi_word: bool,
    pattern: TolerantPattern,
}

#[derive(Debug)]
enum CompiledRule {
    Literal(LiteralRule),
    Pattern {
        name: String,
        regex: Regex,
        severity: f64,
    },
    Predicate {
        name: String,
        test: PredicateFn,
        severity: f64,
    },
}

/// Scores free-form text against a compiled term catalog.
///
/// Everything is built once in [`RiskEngine::new`]; `evaluate` only reads, so
/// one engine can be shared across threads.
#[derive(Debug)]
pub struct RiskEngine {
    normalizer: Normalizer,
    rules: Vec<CompiledRule>,
    analyzer: ObfuscationAnalyzer,
}

impl RiskEngine {
    pub fn new(
        catalog: &Catalog,
        table: ConfusableTable,
        analyzer: ObfuscationAnalyzer,
    ) -> Result<Self> {
        let normalizer = Normalizer::new(table);
        let mut rules = Vec::with_capacity(catalog.len());
        {
            let compiler = PatternCompiler::new(normalizer.table());
            for rule in catalog.rules() {
                match rule {
                    TermRule::Literal {
                        text,
                        severity,
                        multi_word,
                    } => {
                        let mut chars = text.chars();
                        if let (Some(only), None) = (chars.next(), chars.next()) {
                            if !only.is_ascii() {
                                log::debug!("Skipping single-character literal {:?}", text);
                                continue;
                            }
                        }
                        let term = normalizer.normalize(text, *multi_word).trim().to_string();
                        let pattern = compiler.compile(&term, *multi_word)?;
                        rules.push(CompiledRule::Literal(LiteralRule {
                            name: text.clone(),
                            severity: *severity,
                            multi_word: *multi_word,
                            pattern,
                        }));
                    }
                    TermRule::Pattern {
                        name,
                        regex,
                        severity,
                    } => rules.push(CompiledRule::Pattern {
                        name: name.clone(),
                        regex: regex.clone(),
                        severity: *severity,
                    }),
                    TermRule::Predicate {
                        name,
                        test,
                        severity,
                    } => rules.push(CompiledRule::Predicate {
                        name: name.clone(),
                        test: *test,
                        severity: *severity,
                    }),
                }
            }
        }

        log::info!("Risk engine ready with {} rules", rules.len());
        Ok(Self {
            normalizer,
            rules,
            analyzer,
        })
    }

    /// Engine over the built-in catalog, confusable table and whitelist.
    pub fn with_defaults() -> Result<Self> {
        Self::new(
            &Catalog::builtin()?,
            ConfusableTable::builtin()?,
            ObfuscationAnalyzer::builtin()?,
        )
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn evaluate(&self, text: &str) -> Evaluation {
        let compact = self.normalizer.normalize_mapped(text, false);
        let spaced = self.normalizer.normalize_mapped(text, true);

        let mut matches = Vec::new();
        for rule in &self.rules {
            match rule {
                CompiledRule::Literal(literal) => {
                    let normalized = if literal.multi_word { &spaced } else { &compact };
                    self.scan_literal(text, normalized, literal, &mut matches);
                }
                CompiledRule::Pattern {
                    name,
                    regex,
                    severity,
                } => {
                    for found in regex.find_iter(text) {
                        matches.push(exact_match(
                            name,
                            found.as_str(),
                            *severity,
                            (found.start(), found.end()),
                        ));
                    }
                }
                CompiledRule::Predicate {
                    name,
                    test,
                    severity,
                } => {
                    if test(text) {
                        matches.push(exact_match(name, text, *severity, (0, text.len())));
                    }
                }
            }
        }

        let evaluation = aggregate(matches, &compact.text);
        log::debug!(
            "Evaluated {} chars: {} matches, score {:.2}, risk {}",
            text.chars().count(),
            evaluation.matches.len(),
            evaluation.final_score,
            evaluation.risk
        );
        evaluation
    }

    /// Like [`RiskEngine::evaluate`], for input that has not been decoded yet.
    pub fn evaluate_bytes(&self, bytes: &[u8]) -> Result<Evaluation> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| EngineError::InvalidInput(format!("text is not valid UTF-8: {e}")))?;
        Ok(self.evaluate(text))
    }

    fn scan_literal(
        &self,
        raw: &str,
        normalized: &NormalizedText,
        rule: &LiteralRule,
        matches: &mut Vec<Match>,
    ) {
        let term = rule.name.as_str();
        let threshold = acceptance_threshold(term.chars().count());
        for (start, end) in rule.pattern.find_iter(&normalized.text) {
            let Some(span) = normalized.map.project(start, end) else {
                continue;
            };
            let matched = &raw[span.clone()];
            let obfuscation = self.analyzer.analyze(raw, span.clone(), rule.multi_word);
            let quality = match_quality::score(matched, term);
            let confidence = apply_obfuscation(quality, obfuscation);
            if confidence < threshold {
                log::debug!(
                    "Rejected {:?} for {:?}: confidence {:.3} below {:.3}",
                    matched,
                    term,
                    confidence,
                    threshold
                );
                continue;
            }
            matches.push(Match {
                rule_name: term.to_string(),
                matched: matched.to_string(),
                confidence,
                obfuscation,
                severity: rule.severity,
                original_span: (span.start, span.end),
            });
        }
    }
}

fn exact_match(name: &str, matched: &str, severity: f64, span: (usize, usize)) -> Match {
    Match {
        rule_name: name.to_string(),
        matched: matched.to_string(),
        confidence: EXACT_CONFIDENCE,
        obfuscation: 0.0,
        severity,
        original_span: span,
    }
}
