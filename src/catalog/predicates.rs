//! Named text predicates a catalog can reference with `type: Predicate`.

pub type PredicateFn = fn(&str) -> bool;

const SHOUTING_MIN_LETTERS: usize = 24;
const SHOUTING_UPPERCASE_RATIO: f64 = 0.8;
const FLOOD_MIN_RUN: usize = 12;

pub fn lookup(name: &str) -> Option<PredicateFn> {
    match name {
        "shouting" => Some(is_shouting),
        "character_flood" => Some(is_character_flood),
        _ => None,
    }
}

pub fn names() -> &'static [&'static str] {
    &["shouting", "character_flood"]
}

/// Long text written almost entirely in capitals.
pub fn is_shouting(text: &str) -> bool {
    let mut letters = 0usize;
    let mut upper = 0usize;
    for ch in text.chars().filter(|c| c.is_alphabetic()) {
        letters += 1;
        if ch.is_uppercase() {
            upper += 1;
        }
    }
    letters >= SHOUTING_MIN_LETTERS && upper as f64 / letters as f64 >= SHOUTING_UPPERCASE_RATIO
}

/// One non-whitespace character repeated many times in a row ("!!!!!!!!!!!!").
pub fn is_character_flood(text: &str) -> bool {
    let mut previous = None;
    let mut run = 0usize;
    for ch in text.chars() {
        if ch.is_whitespace() {
            previous = None;
            run = 0;
            continue;
        }
        if Some(ch) == previous {
            run += 1;
        } else {
            previous = Some(ch);
            run = 1;
        }
        if run >= FLOOD_MIN_RUN {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shouting() {
        assert!(is_shouting("THIS ARTICLE IS COMPLETE GARBAGE AND WRONG"));
        assert!(!is_shouting("SHORT CAPS"));
        assert!(!is_shouting("This article is complete garbage and wrong"));
    }

    #[test]
    fn test_character_flood() {
        assert!(is_character_flood(&format!("lol{}", "!".repeat(12))));
        assert!(!is_character_flood(&format!("{0} {0}", "!".repeat(6))));
        assert!(!is_character_flood("a normal sentence"));
    }

    #[test]
    fn test_lookup_by_name() {
        for name in names() {
            assert!(lookup(name).is_some());
        }
        assert!(lookup("nope").is_none());
    }
}
