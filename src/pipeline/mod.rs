//! Record processing pipeline
//!
//! Stages that turn raw extracted fields into a curated catalog:
//! - Normalization: total, pure field cleanup into canonical records
//! - Quality scoring: weighted completeness score and letter grade
//! - Deduplication: weighted similarity grouping and record merging
//! - Curation: rule-based include/exclude/flag decisions

pub mod curation;
pub mod dedup;
pub mod normalize;
pub mod quality;

pub use curation::{CurationEngine, CurationRule, RuleAction, RuleCondition};
pub use dedup::{DedupOutcome, Deduplicator};
pub use normalize::normalize_record;
pub use quality::QualityScorer;
