//! Near-duplicate detection and merging
//!
//! Two records describe the same product when the weighted sum of their
//! title, brand, price, and specification similarities clears the
//! configured threshold. Grouping is a greedy single pass: each unassigned
//! record seeds a group and claims every later record similar enough to
//! the seed itself. Records similar to a claimed member but not to the
//! seed stay out, so grouping is deliberately not a transitive closure.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::DedupConfig;
use crate::pipeline::normalize::normalize_title;
use crate::types::{DuplicateGroup, ProductId, ProductRecord};

/// Outcome of a full deduplication pass
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    /// Groups of records judged to be the same product
    pub groups: Vec<DuplicateGroup>,
    /// The catalog after merging: each group collapsed into one record at
    /// its seed's position, singletons passed through untouched
    pub merged: Vec<ProductRecord>,
}

/// Weighted-similarity deduplicator
pub struct Deduplicator {
    config: DedupConfig,
}

impl Deduplicator {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Weighted similarity between two records, in [0, 1]
    pub fn similarity(&self, a: &ProductRecord, b: &ProductRecord) -> f64 {
        let c = &self.config;
        text_similarity(&a.title, &b.title) * c.title_weight
            + text_similarity(
                a.brand.as_deref().unwrap_or(""),
                b.brand.as_deref().unwrap_or(""),
            ) * c.brand_weight
            + price_similarity(a.current_price, b.current_price) * c.price_weight
            + spec_similarity(&a.specifications, &b.specifications) * c.spec_weight
    }

    /// Greedy single-pass duplicate grouping.
    ///
    /// Order-dependent by design: earlier records seed groups first, and
    /// membership is always judged against the seed. Only groups with two
    /// or more members are returned.
    pub fn find_duplicates(&self, records: &[ProductRecord]) -> Vec<DuplicateGroup> {
        self.group_indexes(records)
            .iter()
            .map(|indexes| build_group(records, indexes))
            .collect()
    }

    /// Greedy grouping over record positions; each returned group lists
    /// member indexes with the seed first
    fn group_indexes(&self, records: &[ProductRecord]) -> Vec<Vec<usize>> {
        let mut groups = Vec::new();
        let mut assigned: HashSet<usize> = HashSet::new();

        for i in 0..records.len() {
            if assigned.contains(&i) {
                continue;
            }

            let mut member_indexes = vec![i];
            for j in (i + 1)..records.len() {
                if assigned.contains(&j) {
                    continue;
                }
                if self.similarity(&records[i], &records[j]) >= self.config.similarity_threshold {
                    member_indexes.push(j);
                    assigned.insert(j);
                }
            }

            if member_indexes.len() > 1 {
                assigned.insert(i);
                groups.push(member_indexes);
            }
        }

        groups
    }

    /// Collapse a group into one record.
    ///
    /// The canonical member is the base; the others contribute images and
    /// features the base lacks (base order first, then discovery order)
    /// and specification entries for keys the base does not carry.
    /// A single-member group comes back unchanged.
    pub fn merge(&self, group: &DuplicateGroup) -> ProductRecord {
        if group.members.len() == 1 {
            return group.members[0].clone();
        }

        let base_index = group
            .members
            .iter()
            .position(|m| m.id() == group.canonical_id)
            .unwrap_or(0);
        let mut merged = group.members[base_index].clone();

        for (index, member) in group.members.iter().enumerate() {
            if index == base_index {
                continue;
            }
            for image in &member.additional_images {
                if !merged.additional_images.contains(image) {
                    merged.additional_images.push(image.clone());
                }
            }
            for feature in &member.features {
                if !merged.features.contains(feature) {
                    merged.features.push(feature.clone());
                }
            }
            for (key, value) in &member.specifications {
                if !value.is_empty() && !merged.specifications.contains_key(key) {
                    merged.specifications.insert(key.clone(), value.clone());
                }
            }
        }

        merged.duplicate_count = group.members.len() as u32;
        merged.last_updated = Utc::now();
        merged
    }

    /// Group and merge in one pass over a catalog.
    ///
    /// Reconstruction is positional, so an ungrouped record that happens
    /// to share an id with a group member still passes through untouched.
    pub fn dedup(&self, records: Vec<ProductRecord>) -> DedupOutcome {
        let indexes = self.group_indexes(&records);
        let groups: Vec<DuplicateGroup> = indexes
            .iter()
            .map(|idx| build_group(&records, idx))
            .collect();

        let mut collapsed_by_seed: HashMap<usize, ProductRecord> = groups
            .iter()
            .zip(&indexes)
            .map(|(group, idx)| (idx[0], self.merge(group)))
            .collect();
        let grouped: HashSet<usize> = indexes.iter().flatten().copied().collect();

        let mut merged = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            if let Some(collapsed) = collapsed_by_seed.remove(&i) {
                merged.push(collapsed);
            } else if !grouped.contains(&i) {
                merged.push(record);
            }
        }

        DedupOutcome { groups, merged }
    }
}

fn build_group(records: &[ProductRecord], indexes: &[usize]) -> DuplicateGroup {
    let members: Vec<ProductRecord> = indexes.iter().map(|&k| records[k].clone()).collect();
    let canonical_id = select_canonical(&members);
    DuplicateGroup {
        members,
        canonical_id,
    }
}

/// Member with the highest quality score; earliest wins ties
fn select_canonical(members: &[ProductRecord]) -> ProductId {
    let mut best = 0;
    for (index, record) in members.iter().enumerate().skip(1) {
        if record.data_quality_score > members[best].data_quality_score {
            best = index;
        }
    }
    members[best].id()
}

/// Edit-distance ratio over boilerplate-stripped, lower-cased text.
/// Either side empty scores 0, not a match.
fn text_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a = normalize_title(a).to_lowercase();
    let b = normalize_title(b).to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

/// Relative price proximity: 1 − |Δ| / max, floored at 0
fn price_similarity(a: Option<f64>, b: Option<f64>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) if a > 0.0 && b > 0.0 => {
            let diff = (a - b).abs() / a.max(b);
            (1.0 - diff).max(0.0)
        }
        _ => 0.0,
    }
}

/// Mean value similarity over specification keys both records carry.
/// No shared keys, or either table empty, scores 0.
fn spec_similarity(a: &BTreeMap<String, String>, b: &BTreeMap<String, String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    let mut shared = 0usize;
    for (key, value_a) in a {
        if let Some(value_b) = b.get(key) {
            total += text_similarity(value_a, value_b);
            shared += 1;
        }
    }

    if shared == 0 {
        0.0
    } else {
        total / shared as f64
    }
}
