//! URL matching for the advertisement measurement.
//!
//! Turns a domain allow-list into WebExtension-style match patterns,
//! evaluates those patterns against page URLs and normalizes page URLs
//! before they are written into telemetry records.

pub mod domains;
pub mod error;
pub mod normalize;
pub mod pattern;

pub use domains::domains_to_match_patterns;
pub use error::{MatchPatternError, Result};
pub use normalize::{normalize_url, NormalizedUrl};
pub use pattern::{MatchPattern, MatchPatternSet};
