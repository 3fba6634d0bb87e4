pub mod match_quality;
pub mod obfuscation;

pub use match_quality::{acceptance_threshold, apply_obfuscation, MatchQuality};
pub use obfuscation::{padding_likelihood, ObfuscationAnalyzer};
