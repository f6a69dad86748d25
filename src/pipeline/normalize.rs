//! Field normalization
//!
//! Total, pure functions that turn the raw strings pulled off retailer
//! pages into canonical field values. Every function accepts arbitrary
//! text and degrades to `None`/defaults instead of failing; parse
//! problems never abort a record.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::scraping::extract::RawRecord;
use crate::types::{Availability, Dimensions, ProductRecord, Variation};
use crate::util::clean_text;

/// First embedded decimal number, e.g. "12.5" out of "12.5 x 8 inches"
static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.?\d*").unwrap());

/// First digit run allowing thousands separators, e.g. "1,234"
static RE_INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\d,]+").unwrap());

/// Retailer boilerplate stripped off the front of titles, applied in order
static TITLE_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^Amazon\.com: ",
        r"(?i)^Walmart\.com: ",
        r"(?i)^Target\.com: ",
        r"(?i)^Best Buy: ",
        r"^\[.*?\] ",
        r"^\(.*?\) ",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Corporate suffixes stripped off the end of brand names, applied in order
static BRAND_SUFFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i) Brand$",
        r"(?i)\.com$",
        r"(?i) Inc\.?$",
        r"(?i) LLC\.?$",
        r"(?i) Corp\.?$",
        r"(?i) Ltd\.?$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// Availability phrases, checked most-specific first: "unavailable"
// contains "available", and an in-stock banner ending in "only 2 left"
// really describes a limited listing. Count phrasing requires a number so
// banners like "Only from Amazon" or "Left-handed model" stay unclaimed.
static RE_STOCK_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:only\s+)?\d+\s+left\b").unwrap());
const LIMITED_STOCK_PHRASES: [&str; 3] = ["limited", "low stock", "few left"];
const PRE_ORDER_PHRASES: [&str; 3] = ["pre-order", "preorder", "coming soon"];
const OUT_OF_STOCK_PHRASES: [&str; 4] = ["out of stock", "sold out", "unavailable", "not available"];
const IN_STOCK_PHRASES: [&str; 3] = ["in stock", "available", "add to cart"];

/// Parse a price string into a float.
///
/// Currency symbols and other noise are stripped first. A comma next to a
/// period is a thousands separator; a lone comma followed by exactly two
/// digits is a decimal separator ("19,99"), otherwise commas are dropped.
pub fn normalize_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let candidate = if cleaned.contains(',') && cleaned.contains('.') {
        cleaned.replace(',', "")
    } else if cleaned.contains(',') {
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() == 2 && parts[1].len() == 2 {
            cleaned.replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else {
        cleaned
    };

    candidate.parse::<f64>().ok()
}

/// Collapse whitespace and strip retailer boilerplate off a title
pub fn normalize_title(raw: &str) -> String {
    let mut title = clean_text(raw);
    for prefix in TITLE_PREFIXES.iter() {
        if let Some(stripped) = prefix.find(&title).map(|m| title[m.end()..].to_string()) {
            title = stripped;
        }
    }
    title.trim().to_string()
}

/// Strip corporate suffixes off a brand name; empty results become `None`
pub fn normalize_brand(raw: &str) -> Option<String> {
    let mut brand = raw.trim().to_string();
    for suffix in BRAND_SUFFIXES.iter() {
        brand = suffix.replace(&brand, "").into_owned();
    }
    let brand = brand.trim();
    if brand.is_empty() {
        None
    } else {
        Some(brand.to_string())
    }
}

/// Map free-form availability text onto the closed status enum
pub fn normalize_availability(raw: &str) -> Availability {
    let text = raw.trim().to_lowercase();
    if text.is_empty() {
        return Availability::Unknown;
    }
    if LIMITED_STOCK_PHRASES.iter().any(|p| text.contains(p)) || RE_STOCK_COUNT.is_match(&text) {
        return Availability::LimitedStock;
    }
    if PRE_ORDER_PHRASES.iter().any(|p| text.contains(p)) {
        return Availability::PreOrder;
    }
    if OUT_OF_STOCK_PHRASES.iter().any(|p| text.contains(p)) {
        return Availability::OutOfStock;
    }
    if IN_STOCK_PHRASES.iter().any(|p| text.contains(p)) {
        return Availability::InStock;
    }
    Availability::Unknown
}

/// Parse a rating out of text like "4.5 out of 5 stars".
///
/// Values above 5 are assumed to come from a 10-point scale and halved;
/// anything still outside [0, 5] is discarded.
pub fn normalize_rating(raw: &str) -> Option<f64> {
    let mut rating: f64 = RE_NUMBER.find(raw)?.as_str().parse().ok()?;
    if rating > 5.0 {
        rating /= 2.0;
    }
    if (0.0..=5.0).contains(&rating) {
        Some(rating)
    } else {
        None
    }
}

/// Parse a review count out of text like "1,234 ratings"
pub fn normalize_review_count(raw: &str) -> Option<u64> {
    first_integer(raw)
}

fn first_integer(raw: &str) -> Option<u64> {
    RE_INTEGER.find(raw)?.as_str().replace(',', "").parse().ok()
}

/// Normalize a specification table.
///
/// Keys are lower-cased with whitespace collapsed, empty values dropped,
/// and the first non-empty value wins when normalized keys collide.
pub fn normalize_specifications(pairs: &[(String, String)]) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();
    for (key, value) in pairs {
        let key = clean_text(&key.to_lowercase());
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        specs.entry(key).or_insert_with(|| value.to_string());
    }
    specs
}

/// Pull physical dimensions out of a normalized specification table.
///
/// Each axis takes the first embedded number of its entry; non-numeric
/// entries leave the axis unset. Returns `None` when no axis resolved.
pub fn normalize_dimensions(specs: &BTreeMap<String, String>) -> Option<Dimensions> {
    let axis = |key: &str| specs.get(key).and_then(|v| first_number(v));
    let dims = Dimensions {
        length: axis("length"),
        width: axis("width"),
        height: axis("height"),
        weight: axis("weight"),
        ..Dimensions::default()
    };
    if dims.is_empty() {
        None
    } else {
        Some(dims)
    }
}

fn first_number(raw: &str) -> Option<f64> {
    RE_NUMBER.find(raw)?.as_str().parse().ok()
}

/// Discount relative to the original price, rounded to two decimals.
///
/// Present only when both prices are known, the original is positive, and
/// the listing is not more expensive than its original price.
pub fn derive_discount(current: Option<f64>, original: Option<f64>) -> Option<f64> {
    match (current, original) {
        (Some(current), Some(original)) if original > 0.0 && original >= current => {
            let discount = ((original - current) / original) * 100.0;
            Some((discount * 100.0).round() / 100.0)
        }
        _ => None,
    }
}

/// Best-seller rank from a specification entry naming it, when present
pub fn derive_best_seller_rank(specs: &BTreeMap<String, String>) -> Option<u32> {
    let (_, value) = specs.iter().find(|(k, _)| k.contains("best sellers rank"))?;
    let rank = u32::try_from(first_integer(value)?).ok()?;
    if rank >= 1 {
        Some(rank)
    } else {
        None
    }
}

/// Assemble a canonical record from raw extracted fields.
///
/// The timestamp is injected so a batch stamps every record consistently
/// and repeat runs over fixed markup produce identical records.
pub fn normalize_record(raw: &RawRecord, now: DateTime<Utc>) -> ProductRecord {
    let title = normalize_title(&raw.title);
    let mut record = ProductRecord::new(
        raw.source_url.clone(),
        raw.retailer.clone(),
        raw.external_id.clone(),
        title,
    );

    record.brand = raw.brand.as_deref().and_then(normalize_brand);
    record.category = raw
        .category
        .as_deref()
        .map(clean_text)
        .filter(|c| !c.is_empty());
    record.description = raw
        .description
        .as_deref()
        .map(clean_text)
        .filter(|d| !d.is_empty());
    record.bullet_points = raw.bullet_points.clone();
    record.features = raw.features.clone();

    record.current_price = raw.price.as_deref().and_then(normalize_price);
    record.original_price = raw.original_price.as_deref().and_then(normalize_price);
    record.discount_percentage = derive_discount(record.current_price, record.original_price);
    record.availability = raw
        .availability
        .as_deref()
        .map(normalize_availability)
        .unwrap_or_default();

    let mut seen = std::collections::HashSet::new();
    let mut images = Vec::new();
    for image in &raw.images {
        if seen.insert(image.as_str()) {
            images.push(image.clone());
        }
    }
    let mut images = images.into_iter();
    record.primary_image_url = images.next();
    record.additional_images = images.collect();

    record.specifications = normalize_specifications(&raw.specifications);
    record.dimensions = normalize_dimensions(&record.specifications);
    record.best_seller_rank = derive_best_seller_rank(&record.specifications);
    record.variations = raw
        .variations
        .iter()
        .map(|(kind, value)| Variation {
            variation_type: kind.clone(),
            variation_value: value.clone(),
            price: None,
            availability: None,
        })
        .collect();

    record.rating = raw.rating.as_deref().and_then(normalize_rating);
    record.review_count = raw.review_count.as_deref().and_then(normalize_review_count);

    record.last_updated = now;
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // normalize_price
    // ========================================================================

    #[test]
    fn price_with_currency_and_thousands_separator() {
        assert_eq!(normalize_price("$1,299.00"), Some(1299.00));
    }

    #[test]
    fn price_with_comma_decimal_separator() {
        assert_eq!(normalize_price("19,99"), Some(19.99));
    }

    #[test]
    fn price_with_comma_thousands_only() {
        assert_eq!(normalize_price("1,299"), Some(1299.0));
    }

    #[test]
    fn price_plain() {
        assert_eq!(normalize_price("$49.99"), Some(49.99));
        assert_eq!(normalize_price("Now: 5"), Some(5.0));
    }

    #[test]
    fn price_garbage_is_none() {
        assert_eq!(normalize_price(""), None);
        assert_eq!(normalize_price("call for price"), None);
        assert_eq!(normalize_price("..."), None);
    }

    // ========================================================================
    // normalize_title
    // ========================================================================

    #[test]
    fn title_strips_retailer_prefix() {
        assert_eq!(normalize_title("Amazon.com: Echo Dot (5th Gen)"), "Echo Dot (5th Gen)");
        assert_eq!(normalize_title("Walmart.com: Blender"), "Blender");
    }

    #[test]
    fn title_prefix_strip_is_case_insensitive() {
        assert_eq!(normalize_title("AMAZON.COM: Echo Dot"), "Echo Dot");
        assert_eq!(normalize_title("best buy: Laptop"), "Laptop");
    }

    #[test]
    fn title_strips_leading_bracket_group() {
        assert_eq!(normalize_title("[Sponsored] USB Cable"), "USB Cable");
        assert_eq!(normalize_title("(2-Pack) USB Cable"), "USB Cable");
    }

    #[test]
    fn title_collapses_whitespace() {
        assert_eq!(normalize_title("  Wireless\t\tMouse \n Black "), "Wireless Mouse Black");
    }

    #[test]
    fn title_strips_stacked_boilerplate() {
        assert_eq!(normalize_title("Amazon.com: [Official] Widget"), "Widget");
    }

    // ========================================================================
    // normalize_brand
    // ========================================================================

    #[test]
    fn brand_strips_corporate_suffixes() {
        assert_eq!(normalize_brand("Sony Corp."), Some("Sony".to_string()));
        assert_eq!(normalize_brand("Nike Inc"), Some("Nike".to_string()));
        assert_eq!(normalize_brand("Samsung.com"), Some("Samsung".to_string()));
        assert_eq!(normalize_brand("Acme Brand"), Some("Acme".to_string()));
        assert_eq!(normalize_brand("Initech LLC."), Some("Initech".to_string()));
    }

    #[test]
    fn brand_plain_passes_through() {
        assert_eq!(normalize_brand("  Logitech  "), Some("Logitech".to_string()));
    }

    #[test]
    fn brand_empty_is_none() {
        assert_eq!(normalize_brand(""), None);
        assert_eq!(normalize_brand("   "), None);
    }

    // ========================================================================
    // normalize_availability
    // ========================================================================

    #[test]
    fn availability_limited_wins_over_in_stock() {
        assert_eq!(
            normalize_availability("In Stock, only 2 left"),
            Availability::LimitedStock
        );
    }

    #[test]
    fn availability_unavailable_is_out_of_stock() {
        assert_eq!(
            normalize_availability("Currently unavailable"),
            Availability::OutOfStock
        );
    }

    #[test]
    fn availability_basic_phrases() {
        assert_eq!(normalize_availability("In Stock"), Availability::InStock);
        assert_eq!(normalize_availability("Add to Cart"), Availability::InStock);
        assert_eq!(normalize_availability("Sold out"), Availability::OutOfStock);
        assert_eq!(normalize_availability("Pre-order now"), Availability::PreOrder);
        assert_eq!(normalize_availability("Coming soon"), Availability::PreOrder);
        assert_eq!(normalize_availability("Low stock"), Availability::LimitedStock);
    }

    #[test]
    fn availability_count_phrasing_requires_a_number() {
        assert_eq!(
            normalize_availability("Only 3 left in stock"),
            Availability::LimitedStock
        );
        assert_eq!(normalize_availability("2 left"), Availability::LimitedStock);
        assert_eq!(normalize_availability("Only from Amazon"), Availability::Unknown);
        assert_eq!(
            normalize_availability("Left-handed model available"),
            Availability::InStock
        );
    }

    #[test]
    fn availability_unmapped_is_unknown() {
        assert_eq!(normalize_availability("zzz"), Availability::Unknown);
        assert_eq!(normalize_availability(""), Availability::Unknown);
    }

    // ========================================================================
    // normalize_rating / normalize_review_count
    // ========================================================================

    #[test]
    fn rating_from_star_text() {
        assert_eq!(normalize_rating("4.5 out of 5 stars"), Some(4.5));
    }

    #[test]
    fn rating_ten_point_scale_is_halved() {
        assert_eq!(normalize_rating("9.0"), Some(4.5));
    }

    #[test]
    fn rating_out_of_range_is_none() {
        assert_eq!(normalize_rating("11"), None); // 5.5 after halving
        assert_eq!(normalize_rating("no rating yet"), None);
    }

    #[test]
    fn review_count_with_thousands_separator() {
        assert_eq!(normalize_review_count("1,234 ratings"), Some(1234));
        assert_eq!(normalize_review_count("87"), Some(87));
    }

    #[test]
    fn review_count_without_digits_is_none() {
        assert_eq!(normalize_review_count("no reviews"), None);
    }

    // ========================================================================
    // normalize_specifications / normalize_dimensions
    // ========================================================================

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn specifications_normalize_keys_and_drop_empty_values() {
        let specs = normalize_specifications(&pairs(&[
            (" Screen  Size ", "6.1 inches"),
            ("Brand", ""),
            ("Weight", "1.2 lbs"),
        ]));
        assert_eq!(specs.get("screen size"), Some(&"6.1 inches".to_string()));
        assert_eq!(specs.get("weight"), Some(&"1.2 lbs".to_string()));
        assert!(!specs.contains_key("brand"));
    }

    #[test]
    fn specifications_first_value_wins_on_key_collision() {
        let specs = normalize_specifications(&pairs(&[
            ("Color", "Black"),
            ("COLOR", "Silver"),
        ]));
        assert_eq!(specs.get("color"), Some(&"Black".to_string()));
    }

    #[test]
    fn dimensions_take_first_number_per_axis() {
        let specs = normalize_specifications(&pairs(&[
            ("Length", "12.5 inches"),
            ("Width", "8 in"),
            ("Weight", "N/A"),
        ]));
        let dims = normalize_dimensions(&specs).unwrap();
        assert_eq!(dims.length, Some(12.5));
        assert_eq!(dims.width, Some(8.0));
        assert_eq!(dims.height, None);
        assert_eq!(dims.weight, None);
        assert_eq!(dims.unit, "inches");
    }

    #[test]
    fn dimensions_without_axes_is_none() {
        let specs = normalize_specifications(&pairs(&[("color", "red")]));
        assert!(normalize_dimensions(&specs).is_none());
    }

    // ========================================================================
    // derive_discount / derive_best_seller_rank
    // ========================================================================

    #[test]
    fn discount_from_both_prices() {
        assert_eq!(derive_discount(Some(80.0), Some(100.0)), Some(20.00));
    }

    #[test]
    fn discount_rounds_to_two_decimals() {
        assert_eq!(derive_discount(Some(66.67), Some(100.0)), Some(33.33));
    }

    #[test]
    fn discount_requires_both_prices_and_a_real_markdown() {
        assert_eq!(derive_discount(None, Some(100.0)), None);
        assert_eq!(derive_discount(Some(80.0), None), None);
        assert_eq!(derive_discount(Some(120.0), Some(100.0)), None);
        assert_eq!(derive_discount(Some(10.0), Some(0.0)), None);
    }

    #[test]
    fn discount_zero_when_prices_match() {
        assert_eq!(derive_discount(Some(100.0), Some(100.0)), Some(0.0));
    }

    #[test]
    fn best_seller_rank_from_spec_entry() {
        let specs = normalize_specifications(&pairs(&[(
            "Best Sellers Rank",
            "#1,234 in Electronics",
        )]));
        assert_eq!(derive_best_seller_rank(&specs), Some(1234));
    }

    // ========================================================================
    // normalize_record
    // ========================================================================

    #[test]
    fn record_assembly_normalizes_every_field() {
        let raw = RawRecord {
            source_url: "https://www.amazon.com/dp/B0TESTTEST".to_string(),
            retailer: "amazon".to_string(),
            external_id: "B0TESTTEST".to_string(),
            title: "Amazon.com:  Wireless  Mouse".to_string(),
            brand: Some("Logitech Inc.".to_string()),
            category: Some("Electronics".to_string()),
            description: Some("A  mouse.".to_string()),
            bullet_points: vec!["Ergonomic shape for long sessions".to_string()],
            features: vec![],
            price: Some("$24.99".to_string()),
            original_price: Some("$39.99".to_string()),
            availability: Some("In Stock".to_string()),
            rating: Some("4.6 out of 5 stars".to_string()),
            review_count: Some("2,481 ratings".to_string()),
            images: vec![
                "https://img.example.com/main.jpg".to_string(),
                "https://img.example.com/alt1.jpg".to_string(),
                "https://img.example.com/main.jpg".to_string(),
            ],
            specifications: vec![
                ("Weight".to_string(), "0.2 lbs".to_string()),
                ("Best Sellers Rank".to_string(), "#87 in Mice".to_string()),
            ],
            variations: vec![("color".to_string(), "Black".to_string())],
        };

        let now = Utc::now();
        let record = normalize_record(&raw, now);

        assert_eq!(record.title, "Wireless Mouse");
        assert_eq!(record.brand, Some("Logitech".to_string()));
        assert_eq!(record.current_price, Some(24.99));
        assert_eq!(record.original_price, Some(39.99));
        assert_eq!(record.discount_percentage, Some(37.51));
        assert_eq!(record.availability, Availability::InStock);
        assert_eq!(record.rating, Some(4.6));
        assert_eq!(record.review_count, Some(2481));
        assert_eq!(
            record.primary_image_url,
            Some("https://img.example.com/main.jpg".to_string())
        );
        assert_eq!(
            record.additional_images,
            vec!["https://img.example.com/alt1.jpg".to_string()]
        );
        assert_eq!(record.specifications.get("weight"), Some(&"0.2 lbs".to_string()));
        assert_eq!(record.best_seller_rank, Some(87));
        assert_eq!(record.dimensions.as_ref().unwrap().weight, Some(0.2));
        assert_eq!(record.variations.len(), 1);
        assert_eq!(record.variations[0].variation_value, "Black");
        assert_eq!(record.last_updated, now);
        assert_eq!(record.id(), "amazon:B0TESTTEST");
    }

    #[test]
    fn record_assembly_is_deterministic_for_fixed_timestamp() {
        let raw = RawRecord {
            source_url: "https://example.com/p/1".to_string(),
            retailer: "amazon".to_string(),
            external_id: "B000000001".to_string(),
            title: "Desk Lamp".to_string(),
            brand: None,
            category: None,
            description: None,
            bullet_points: vec![],
            features: vec![],
            price: Some("$10.00".to_string()),
            original_price: None,
            availability: None,
            rating: None,
            review_count: None,
            images: vec![],
            specifications: vec![],
            variations: vec![],
        };

        let now = Utc::now();
        assert_eq!(normalize_record(&raw, now), normalize_record(&raw, now));
    }
}
