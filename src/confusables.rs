use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const BUILTIN_CONFUSABLES: &str = include_str!("../configs/confusables.yaml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfusableEntry {
    pub canonical: char,
    pub glyphs: Vec<char>,
}

/// A glyph that was registered for two different canonical characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collision {
    pub glyph: char,
    pub previous: char,
    pub replacement: char,
}

/// Canonical character -> look-alike glyphs, plus the inverted glyph -> canonical
/// lookup the normalizer folds with.
#[derive(Debug, Clone, Default)]
pub struct ConfusableTable {
    glyphs: HashMap<char, Vec<char>>,
    conversion: HashMap<char, char>,
    collisions: Vec<Collision>,
}

impl ConfusableTable {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_CONFUSABLES)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let entries: Vec<ConfusableEntry> =
            serde_yaml::from_str(content).map_err(|source| EngineError::Parse {
                what: "confusable table".to_string(),
                source,
            })?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ConfusableEntry>,
    {
        let mut table = Self::default();

        for entry in entries {
            let canonical = entry.canonical.to_ascii_lowercase();
            for glyph in entry.glyphs {
                if glyph == canonical {
                    continue;
                }
                if let Some(previous) = table.conversion.insert(glyph, canonical) {
                    if previous != canonical {
                        log::warn!(
                            "Confusable glyph {glyph:?} claimed by both {previous:?} and {canonical:?}; using {canonical:?}"
                        );
                        table.collisions.push(Collision {
                            glyph,
                            previous,
                            replacement: canonical,
                        });
                        if let Some(list) = table.glyphs.get_mut(&previous) {
                            list.retain(|g| *g != glyph);
                        }
                    }
                }
                let list = table.glyphs.entry(canonical).or_default();
                if !list.contains(&glyph) {
                    list.push(glyph);
                }
            }
        }

        log::debug!(
            "Confusable table loaded: {} canonical characters, {} glyphs",
            table.glyphs.len(),
            table.conversion.len()
        );
        table
    }

    /// The canonical character a glyph stands in for, if it is a known confusable.
    pub fn canonical(&self, glyph: char) -> Option<char> {
        self.conversion.get(&glyph).copied()
    }

    pub fn glyphs_for(&self, canonical: char) -> &[char] {
        self.glyphs
            .get(&canonical)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.conversion.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversion.is_empty()
    }
}
