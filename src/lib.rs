pub mod analysis;
pub mod catalog;
pub mod config;
pub mod confusables;
pub mod engine;
pub mod error;
pub mod normalization;
pub mod pattern_compiler;
pub mod risk;

pub use analysis::ObfuscationAnalyzer;
pub use catalog::{Catalog, CatalogCounts, TermRule};
pub use config::EngineConfig;
pub use confusables::ConfusableTable;
pub use engine::RiskEngine;
pub use error::{EngineError, Result};
pub use normalization::{NormalizedText, Normalizer, PositionMap};
pub use risk::{Diagnostics, Evaluation, Match, RiskLevel};
