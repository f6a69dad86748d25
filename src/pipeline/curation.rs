//! Rule-based curation
//!
//! Decides which records enter the published catalog. Rules are evaluated
//! in ascending priority order; an exclude match short-circuits, include
//! matches add 1.0 to the running score and flag matches 0.5. A record is
//! included at a final score of 2.0, flagged at 1.0, excluded otherwise.

use serde::{Deserialize, Serialize};

use crate::types::{Availability, ProductRecord};

/// A closed set of rule predicates, so the engine stays exhaustively
/// checkable when new kinds are added
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Rating present and at least this value
    MinRating { value: f64 },
    /// Review count present and at least this value
    MinReviews { value: u64 },
    /// Availability equals this status
    AvailabilityIs { value: Availability },
    /// Category contains none of these fragments (case-insensitive);
    /// a record without a category matches
    CategoryNotIn { values: Vec<String> },
}

impl RuleCondition {
    fn matches(&self, record: &ProductRecord) -> bool {
        match self {
            RuleCondition::MinRating { value } => {
                record.rating.is_some_and(|r| r >= *value)
            }
            RuleCondition::MinReviews { value } => {
                record.review_count.is_some_and(|c| c >= *value)
            }
            RuleCondition::AvailabilityIs { value } => record.availability == *value,
            RuleCondition::CategoryNotIn { values } => {
                let category = record
                    .category
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase();
                !values.iter().any(|v| category.contains(&v.to_lowercase()))
            }
        }
    }
}

/// What a matching rule contributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Include,
    Exclude,
    Flag,
}

/// One curation rule; lower priority values are evaluated first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationRule {
    pub name: String,
    pub condition: RuleCondition,
    pub action: RuleAction,
    pub priority: u32,
}

impl CurationRule {
    pub fn new(
        name: impl Into<String>,
        condition: RuleCondition,
        action: RuleAction,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            condition,
            action,
            priority,
        }
    }
}

/// Evaluation outcome for one record
struct Verdict {
    action: RuleAction,
    score: f64,
    reason: String,
}

/// Rule engine; rules are priority-sorted once at construction
pub struct CurationEngine {
    rules: Vec<CurationRule>,
}

impl CurationEngine {
    pub fn new(mut rules: Vec<CurationRule>) -> Self {
        // Stable: equal priorities keep their given order
        rules.sort_by_key(|r| r.priority);
        Self { rules }
    }

    pub fn with_default_rules() -> Self {
        Self::new(Self::default_rules())
    }

    /// The stock rule set: well-rated, reviewed, purchasable products
    pub fn default_rules() -> Vec<CurationRule> {
        vec![
            CurationRule::new(
                "minimum_rating",
                RuleCondition::MinRating { value: 4.0 },
                RuleAction::Include,
                1,
            ),
            CurationRule::new(
                "minimum_reviews",
                RuleCondition::MinReviews { value: 10 },
                RuleAction::Include,
                2,
            ),
            CurationRule::new(
                "in_stock_only",
                RuleCondition::AvailabilityIs {
                    value: Availability::InStock,
                },
                RuleAction::Include,
                3,
            ),
        ]
    }

    /// Annotate every record with its curation outcome and return the
    /// curated subset (included and flagged records). Excluded records
    /// stay annotated in the source slice but are omitted from the output.
    pub fn apply(&self, records: &mut [ProductRecord]) -> Vec<ProductRecord> {
        let mut curated = Vec::new();
        for record in records.iter_mut() {
            let verdict = self.evaluate(record);
            record.curation_score = Some(verdict.score);
            record.curation_reason = Some(verdict.reason);
            record.is_curated = verdict.action == RuleAction::Include;
            if verdict.action != RuleAction::Exclude {
                curated.push(record.clone());
            }
        }
        curated
    }

    fn evaluate(&self, record: &ProductRecord) -> Verdict {
        let mut score = 0.0;
        let mut reasons: Vec<String> = Vec::new();

        for rule in &self.rules {
            if !rule.condition.matches(record) {
                continue;
            }
            match rule.action {
                RuleAction::Include => {
                    score += 1.0;
                    reasons.push(format!("Passed: {}", rule.name));
                }
                RuleAction::Flag => {
                    score += 0.5;
                    reasons.push(format!("Flagged: {}", rule.name));
                }
                RuleAction::Exclude => {
                    return Verdict {
                        action: RuleAction::Exclude,
                        score: 0.0,
                        reason: format!("Excluded by: {}", rule.name),
                    };
                }
            }
        }

        let action = if score >= 2.0 {
            RuleAction::Include
        } else if score >= 1.0 {
            RuleAction::Flag
        } else {
            RuleAction::Exclude
        };
        let normalized = if self.rules.is_empty() {
            0.0
        } else {
            score / self.rules.len() as f64
        };
        let reason = if reasons.is_empty() {
            "No rules matched".to_string()
        } else {
            reasons.join("; ")
        };

        Verdict {
            action,
            score: normalized,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(rating: Option<f64>, reviews: Option<u64>, availability: Availability) -> ProductRecord {
        let mut r = ProductRecord::new("https://example.com/p", "amazon", "B000000001", "Widget");
        r.rating = rating;
        r.review_count = reviews;
        r.availability = availability;
        r
    }

    #[test]
    fn test_strong_record_is_curated() {
        let engine = CurationEngine::with_default_rules();
        let mut records = vec![record(Some(4.5), Some(50), Availability::InStock)];
        let curated = engine.apply(&mut records);

        assert_eq!(curated.len(), 1);
        assert!(records[0].is_curated);
        // all three include rules hit: 3.0 accumulated over 3 rules
        assert_eq!(records[0].curation_score, Some(1.0));
        assert_eq!(
            records[0].curation_reason.as_deref(),
            Some("Passed: minimum_rating; Passed: minimum_reviews; Passed: in_stock_only")
        );
    }

    #[test]
    fn test_low_rating_record_is_excluded() {
        let engine = CurationEngine::with_default_rules();
        let mut records = vec![record(Some(3.0), None, Availability::Unknown)];
        let curated = engine.apply(&mut records);

        assert!(curated.is_empty());
        assert!(!records[0].is_curated);
        assert_eq!(records[0].curation_score, Some(0.0));
        assert_eq!(records[0].curation_reason.as_deref(), Some("No rules matched"));
    }

    #[test]
    fn test_middling_record_is_flagged_not_curated() {
        // one include (rating) + one flag (reviews as flag) = 1.5
        let engine = CurationEngine::new(vec![
            CurationRule::new(
                "minimum_rating",
                RuleCondition::MinRating { value: 4.0 },
                RuleAction::Include,
                1,
            ),
            CurationRule::new(
                "some_reviews",
                RuleCondition::MinReviews { value: 5 },
                RuleAction::Flag,
                2,
            ),
        ]);
        let mut records = vec![record(Some(4.2), Some(8), Availability::Unknown)];
        let curated = engine.apply(&mut records);

        assert_eq!(curated.len(), 1, "flagged records stay in the curated output");
        assert!(!records[0].is_curated);
        assert_eq!(records[0].curation_score, Some(0.75));
        assert_eq!(
            records[0].curation_reason.as_deref(),
            Some("Passed: minimum_rating; Flagged: some_reviews")
        );
    }

    #[test]
    fn test_exclude_short_circuits_in_priority_order() {
        let engine = CurationEngine::new(vec![
            CurationRule::new(
                "minimum_rating",
                RuleCondition::MinRating { value: 4.0 },
                RuleAction::Include,
                2,
            ),
            CurationRule::new(
                "no_adult_content",
                RuleCondition::CategoryNotIn {
                    values: vec!["adult".to_string(), "mature".to_string()],
                },
                RuleAction::Exclude,
                1,
            ),
        ]);

        // category is clean, so the exclude rule matches (category NOT in
        // the list) and fires first despite the include rule
        let mut records = vec![record(Some(4.9), Some(500), Availability::InStock)];
        records[0].category = Some("Electronics".to_string());
        let curated = engine.apply(&mut records);

        assert!(curated.is_empty());
        assert_eq!(records[0].curation_score, Some(0.0));
        assert_eq!(
            records[0].curation_reason.as_deref(),
            Some("Excluded by: no_adult_content")
        );
    }

    #[test]
    fn test_category_condition_matches_listed_fragment() {
        let condition = RuleCondition::CategoryNotIn {
            values: vec!["adult".to_string()],
        };
        let mut r = record(None, None, Availability::Unknown);

        r.category = Some("Adult Novelties".to_string());
        assert!(!condition.matches(&r), "listed category must not match");

        r.category = Some("Toys & Games".to_string());
        assert!(condition.matches(&r));

        r.category = None;
        assert!(condition.matches(&r), "absent category matches");
    }

    #[test]
    fn test_missing_fields_fail_threshold_conditions() {
        let r = record(None, None, Availability::Unknown);
        assert!(!RuleCondition::MinRating { value: 1.0 }.matches(&r));
        assert!(!RuleCondition::MinReviews { value: 1 }.matches(&r));
    }

    #[test]
    fn test_empty_rule_set_excludes_everything() {
        let engine = CurationEngine::new(Vec::new());
        let mut records = vec![record(Some(5.0), Some(1000), Availability::InStock)];
        let curated = engine.apply(&mut records);
        assert!(curated.is_empty());
        assert_eq!(records[0].curation_score, Some(0.0));
    }
}
