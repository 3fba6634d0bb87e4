use crate::confusables::ConfusableTable;
use std::ops::Range;
use unicode_normalization::char::{decompose_canonical, is_combining_mark};

/// Characters removed (or collapsed to one space) along with whitespace.
/// `* # -` are deliberately absent: they are filler markers, not separators.
pub const SEPARATORS: [char; 5] = ['.', ',', ';', ':', '|'];

const DIGIT_WORDS: [(&str, char); 10] = [
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
];

pub fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || SEPARATORS.contains(&ch)
}

/// Zero-width and bidi control characters used to split words invisibly.
fn is_invisible(ch: char) -> bool {
    matches!(
        ch,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}'
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    normalized: usize,
    original: usize,
    original_end: usize,
}

/// Byte offsets in a normalized string mapped back to the original text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    segments: Vec<Segment>,
}

impl PositionMap {
    /// Original byte offset of the character starting at `normalized`.
    pub fn original_offset(&self, normalized: usize) -> Option<usize> {
        self.segments
            .binary_search_by_key(&normalized, |s| s.normalized)
            .ok()
            .map(|i| self.segments[i].original)
    }

    /// Project a `[start, end)` byte range of the normalized string onto the
    /// original text. The result covers every original character that
    /// contributed to the range, including separators stripped between them.
    pub fn project(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if start >= end {
            return None;
        }
        let first = self
            .segments
            .binary_search_by_key(&start, |s| s.normalized)
            .ok()?;
        let last = match self.segments.binary_search_by_key(&end, |s| s.normalized) {
            Ok(i) | Err(i) => i.checked_sub(1)?,
        };
        if last < first {
            return None;
        }
        Some(self.segments[first].original..self.segments[last].original_end)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedText {
    pub text: String,
    pub map: PositionMap,
}

impl NormalizedText {
    pub fn char_len(&self) -> usize {
        self.map.len()
    }
}

/// Folds text into the form literal terms are matched against.
#[derive(Debug, Clone)]
pub struct Normalizer {
    table: ConfusableTable,
}

impl Normalizer {
    pub fn new(table: ConfusableTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ConfusableTable {
        &self.table
    }

    pub fn normalize(&self, text: &str, preserve_spaces: bool) -> String {
        self.normalize_mapped(text, preserve_spaces).text
    }

    pub fn build_map(&self, text: &str, preserve_spaces: bool) -> PositionMap {
        self.normalize_mapped(text, preserve_spaces).map
    }

    /// Normalize `text` and record, for every output character, the original
    /// byte range it came from. Both come out of one walk so they never drift.
    pub fn normalize_mapped(&self, text: &str, preserve_spaces: bool) -> NormalizedText {
        let folded = rewrite_words(self.fold(text, preserve_spaces));

        let mut normalized = String::with_capacity(folded.len());
        let mut segments = Vec::with_capacity(folded.len());
        for (ch, range) in folded {
            segments.push(Segment {
                normalized: normalized.len(),
                original: range.start,
                original_end: range.end,
            });
            normalized.push(ch);
        }

        NormalizedText {
            text: normalized,
            map: PositionMap { segments },
        }
    }

    fn fold(&self, text: &str, preserve_spaces: bool) -> Vec<(char, Range<usize>)> {
        let mut folded = Vec::with_capacity(text.len());
        let mut in_gap = false;

        for (offset, ch) in text.char_indices() {
            let range = offset..offset + ch.len_utf8();
            if is_invisible(ch) {
                continue;
            }
            if is_separator(ch) {
                if preserve_spaces && !in_gap {
                    folded.push((' ', range));
                }
                in_gap = true;
                continue;
            }
            in_gap = false;

            for lower in ch.to_lowercase() {
                decompose_canonical(lower, |base| {
                    if !is_combining_mark(base) {
                        let canonical = self.table.canonical(base).unwrap_or(base);
                        folded.push((canonical, range.clone()));
                    }
                });
            }
        }

        folded
    }
}

/// Spelled-out digits become digits and `&` becomes `and`.
fn rewrite_words(folded: Vec<(char, Range<usize>)>) -> Vec<(char, Range<usize>)> {
    let mut rewritten = Vec::with_capacity(folded.len());
    let mut i = 0;

    'scan: while i < folded.len() {
        let (ch, range) = &folded[i];
        if *ch == '&' {
            rewritten.extend("and".chars().map(|c| (c, range.clone())));
            i += 1;
            continue;
        }

        for (word, digit) in DIGIT_WORDS {
            let len = word.len();
            if i + len <= folded.len() && folded[i..i + len].iter().map(|f| f.0).eq(word.chars()) {
                rewritten.push((digit, range.start..folded[i + len - 1].1.end));
                i += len;
                continue 'scan;
            }
        }

        rewritten.push((*ch, range.clone()));
        i += 1;
    }

    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(ConfusableTable::builtin().unwrap())
    }

    #[test]
    fn test_separators_removed_and_lowercased() {
        let n = normalizer();
        assert_eq!(n.normalize("H.a,t;e: |Here", false), "hatehere");
        assert_eq!(n.normalize("f**k you-all #x", false), "f**kyou-all#x");
    }

    #[test]
    fn test_preserve_spaces_collapses_runs() {
        let n = normalizer();
        assert_eq!(n.normalize("kill  ..  yourself", true), "kill yourself");
        assert_eq!(n.normalize("a\t\nb", true), "a b");
    }

    #[test]
    fn test_accents_stripped() {
        let n = normalizer();
        assert_eq!(n.normalize("Crème Brûlée", false), "cremebrulee");
    }

    #[test]
    fn test_confusables_folded() {
        let n = normalizer();
        assert_eq!(n.normalize("$h1t", false), "shit");
        // Cyrillic а and о
        assert_eq!(n.normalize("b\u{0430}d w\u{043E}rd", false), "badword");
    }

    #[test]
    fn test_digit_words_and_ampersand() {
        let n = normalizer();
        assert_eq!(n.normalize("Nine & Ten", false), "9andten");
        assert_eq!(n.normalize("someone", false), "some1");
    }

    #[test]
    fn test_invisible_characters_dropped() {
        let n = normalizer();
        assert_eq!(n.normalize("sh\u{200B}it", false), "shit");
        assert_eq!(n.normalize("sh\u{200B}it", true), "shit");
    }

    #[test]
    fn test_map_matches_normalized_length() {
        let n = normalizer();
        let text = "Héllo, wörld & one";
        let mapped = n.normalize_mapped(text, false);
        assert_eq!(mapped.char_len(), mapped.text.chars().count());
        assert_eq!(n.build_map(text, false), mapped.map);
    }

    #[test]
    fn test_projection_spans_stripped_separators() {
        let n = normalizer();
        let text = "you h.a.t.e it";
        let mapped = n.normalize_mapped(text, false);
        let start = mapped.text.find("hate").unwrap();
        let span = mapped.map.project(start, start + 4).unwrap();
        assert_eq!(&text[span], "h.a.t.e");
    }

    #[test]
    fn test_projection_through_multibyte_and_digit_words() {
        let n = normalizer();
        let text = "é one x";
        let mapped = n.normalize_mapped(text, false);
        assert_eq!(mapped.text, "e1x");
        assert_eq!(mapped.map.project(0, 1), Some(0..2));
        assert_eq!(mapped.map.project(1, 2), Some(3..6));
        assert_eq!(mapped.map.original_offset(2), Some(7));
        assert_eq!(mapped.map.project(2, 2), None);
    }
}
