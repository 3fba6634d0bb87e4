use crate::confusables::ConfusableTable;
use crate::error::{EngineError, Result};
use regex::Regex;

/// Marker characters accepted in place of any letter of a literal term.
pub const FILLER_MARKERS: [char; 3] = ['*', '#', '-'];

/// A compiled literal term that tolerates confusables, filler markers and,
/// for multi-word terms, missing or collapsed spaces.
#[derive(Debug, Clone)]
pub struct TolerantPattern {
    regex: Regex,
}

impl TolerantPattern {
    /// Every non-overlapping occurrence, as byte ranges of `normalized`.
    ///
    /// Occurrences made only of filler markers are dropped: `****` carries
    /// none of the term's letters and would otherwise match every term of
    /// the same length.
    pub fn find_iter<'a>(
        &'a self,
        normalized: &'a str,
    ) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.regex
            .find_iter(normalized)
            .filter(|m| m.as_str().chars().any(char::is_alphanumeric))
            .map(|m| (m.start(), m.end()))
    }
}

pub struct PatternCompiler<'a> {
    table: &'a ConfusableTable,
}

impl<'a> PatternCompiler<'a> {
    pub fn new(table: &'a ConfusableTable) -> Self {
        Self { table }
    }

    /// Compile an already-normalized literal term.
    pub fn compile(&self, term: &str, multi_word: bool) -> Result<TolerantPattern> {
        if term.is_empty() {
            return Err(EngineError::InvalidRule(
                "literal term is empty after normalization".to_string(),
            ));
        }

        let mut pattern = String::from("(?i)");
        for ch in term.chars() {
            if multi_word && ch == ' ' {
                pattern.push_str(" *");
                continue;
            }
            pattern.push('[');
            push_escaped(&mut pattern, ch);
            for &glyph in self.table.glyphs_for(ch) {
                push_escaped(&mut pattern, glyph);
            }
            for marker in FILLER_MARKERS {
                push_escaped(&mut pattern, marker);
            }
            pattern.push(']');
        }

        let regex = Regex::new(&pattern).map_err(|source| EngineError::InvalidPattern {
            name: term.to_string(),
            source,
        })?;
        Ok(TolerantPattern { regex })
    }
}

fn push_escaped(pattern: &mut String, ch: char) {
    let mut buf = [0u8; 4];
    pattern.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(term: &str, multi_word: bool, text: &str) -> Vec<String> {
        let table = ConfusableTable::builtin().unwrap();
        let pattern = PatternCompiler::new(&table).compile(term, multi_word).unwrap();
        pattern
            .find_iter(text)
            .map(|(start, end)| text[start..end].to_string())
            .collect()
    }

    #[test]
    fn test_filler_markers_stand_in_for_letters() {
        assert_eq!(matches("fuck", false, "youareaf**k"), vec!["f**k"]);
        assert_eq!(matches("hate", false, "h#-e"), vec!["h#-e"]);
    }

    #[test]
    fn test_marker_only_runs_are_ignored() {
        assert!(matches("fuck", false, "****").is_empty());
    }

    #[test]
    fn test_every_occurrence_reported() {
        assert_eq!(matches("ass", false, "assxassxass").len(), 3);
    }

    #[test]
    fn test_confusable_glyphs_accepted() {
        // Glyphs that survive normalization still match through the class.
        assert_eq!(matches("hate", false, "h@te"), vec!["h@te"]);
    }

    #[test]
    fn test_multi_word_spacing_is_flexible() {
        assert_eq!(matches("kill yourself", true, "kill yourself"), vec!["kill yourself"]);
        assert_eq!(matches("kill yourself", true, "killyourself"), vec!["killyourself"]);
        assert!(matches("kill yourself", false, "killyourself").is_empty());
    }

    #[test]
    fn test_metacharacters_escaped() {
        let table = ConfusableTable::default();
        let pattern = PatternCompiler::new(&table).compile("a^]-", false).unwrap();
        assert_eq!(pattern.find_iter("xa^]-x").count(), 1);
    }

    #[test]
    fn test_empty_term_rejected() {
        let table = ConfusableTable::default();
        assert!(matches!(
            PatternCompiler::new(&table).compile("", false),
            Err(EngineError::InvalidRule(_))
        ));
    }
}
