//! Data quality scoring
//!
//! Scores a record by the weighted presence of its fields. The weights
//! come from configuration and sum to 1.0, so the score is a completeness
//! fraction: adding data to a record can only raise it.

use crate::config::QualityWeights;
use crate::types::{Availability, ProductRecord};

/// Weighted completeness scorer
pub struct QualityScorer {
    weights: QualityWeights,
}

impl QualityScorer {
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }

    /// Completeness score in [0, 1]
    pub fn score(&self, record: &ProductRecord) -> f64 {
        let w = &self.weights;
        let mut score = 0.0;

        // Core information
        if !record.title.is_empty() {
            score += w.title;
        }
        if record.brand.is_some() {
            score += w.brand;
        }
        if record.description.is_some() || !record.bullet_points.is_empty() {
            score += w.description;
        }
        if record.category.is_some() {
            score += w.category;
        }

        // Pricing & availability
        if record.current_price.is_some() {
            score += w.price;
        }
        if record.availability != Availability::Unknown {
            score += w.availability;
        }

        // Media
        if record.primary_image_url.is_some() {
            score += w.primary_image;
        }
        if !record.additional_images.is_empty() {
            score += w.additional_images;
        }

        // Structured data
        if !record.specifications.is_empty() {
            score += w.specifications;
        }
        if !record.features.is_empty() {
            score += w.features;
        }

        // Social proof
        if record.rating.is_some() {
            score += w.rating;
        }
        if record.review_count.is_some() {
            score += w.review_count;
        }

        score.min(1.0)
    }

    /// Stamp `data_quality_score` on every record
    pub fn annotate(&self, records: &mut [ProductRecord]) {
        for record in records.iter_mut() {
            record.data_quality_score = self.score(record);
        }
    }

    /// Letter grade for a score
    pub fn grade(score: f64) -> &'static str {
        if score >= 0.9 {
            "A"
        } else if score >= 0.8 {
            "B"
        } else if score >= 0.7 {
            "C"
        } else if score >= 0.6 {
            "D"
        } else {
            "F"
        }
    }
}
