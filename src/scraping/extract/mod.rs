//! Retailer field extraction
//!
//! One strategy per retailer, all implementing the same field contract so
//! the rest of the pipeline is retailer-agnostic. Every field is resolved
//! through an ordered chain of selectors tried most-reliable first; a
//! field with no match stays empty rather than failing the page.

mod amazon;
mod walmart;

pub use amazon::AmazonExtractor;
pub use walmart::WalmartExtractor;

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::config::ScrapingConfig;
use crate::util::clean_text;

/// Errors during product extraction
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The page has no recognizable product structure (no title matched)
    #[error("no usable product structure in page")]
    NoStructure,
}

/// Raw fields pulled off a product page before any normalization.
///
/// Values are the text as found in the markup; specifications keep their
/// source order so the normalizer's first-value-wins rule is meaningful.
/// Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub source_url: String,
    pub retailer: String,
    pub external_id: String,
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub bullet_points: Vec<String>,
    pub features: Vec<String>,
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub availability: Option<String>,
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub images: Vec<String>,
    pub specifications: Vec<(String, String)>,
    /// (variation type, variation value) pairs, e.g. ("color", "Black")
    pub variations: Vec<(String, String)>,
}

/// Caps applied while harvesting repeated page elements
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_images: usize,
    pub max_bullet_points: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_images: 10,
            max_bullet_points: 10,
        }
    }
}

impl From<&ScrapingConfig> for ExtractLimits {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            max_images: config.max_images,
            max_bullet_points: config.max_bullet_points,
        }
    }
}

/// Field-extraction strategy for one retailer
pub trait RetailerExtractor: Send + Sync {
    /// Lowercase retailer name, also used as the record's `retailer` field
    fn retailer(&self) -> &'static str;

    /// Extract raw product fields from a product page.
    ///
    /// Pure function of the markup; individual field misses leave the
    /// field empty and never fail the page.
    fn extract(&self, markup: &str, source_url: &str) -> Result<RawRecord, ExtractError>;

    /// Product page links found on a search/category results page,
    /// deduplicated preserving discovery order
    fn product_urls(&self, markup: &str) -> Vec<String>;

    /// Search URL for a named category, when the retailer defines one
    fn category_url(&self, category: &str) -> Option<String>;

    /// Search URL for a given result page
    fn page_url(&self, base: &str, page: u32) -> String {
        if page <= 1 {
            base.to_string()
        } else {
            format!("{}&page={}", base, page)
        }
    }
}

/// Look up the extraction strategy for a retailer name
pub fn extractor_for(
    retailer: &str,
    limits: ExtractLimits,
) -> Option<Box<dyn RetailerExtractor>> {
    match retailer.to_lowercase().as_str() {
        "amazon" => Some(Box::new(AmazonExtractor::new(limits))),
        "walmart" => Some(Box::new(WalmartExtractor::new(limits))),
        _ => None,
    }
}

/// Retailers with a registered extraction strategy
pub fn supported_retailers() -> &'static [&'static str] {
    &["amazon", "walmart"]
}

// ============================================================================
// Selector-chain helpers shared by the retailer strategies
// ============================================================================

/// Compile a chain of selector patterns, dropping any that fail to parse.
/// All patterns are string literals, so in practice nothing is dropped.
pub(crate) fn compile(patterns: &[&str]) -> Vec<Selector> {
    patterns
        .iter()
        .filter_map(|p| Selector::parse(p).ok())
        .collect()
}

/// First non-empty text match along a chain
pub(crate) fn first_text(document: &Html, chain: &[Selector]) -> Option<String> {
    for selector in chain {
        for element in document.select(selector) {
            let text = clean_text(&element.text().collect::<String>());
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Last non-empty text match of the first selector that matches anything.
/// Used for breadcrumbs, where the deepest entry names the category.
pub(crate) fn last_text(document: &Html, chain: &[Selector]) -> Option<String> {
    for selector in chain {
        let texts: Vec<String> = document
            .select(selector)
            .map(|e| clean_text(&e.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        if let Some(last) = texts.into_iter().last() {
            return Some(last);
        }
    }
    None
}

/// All distinct texts along a chain, at least `min_len` characters,
/// capped at `cap` entries, order preserved
pub(crate) fn collect_texts(
    document: &Html,
    chain: &[Selector],
    min_len: usize,
    cap: usize,
) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut texts = Vec::new();
    for selector in chain {
        for element in document.select(selector) {
            let text = clean_text(&element.text().collect::<String>());
            if text.len() > min_len && seen.insert(text.clone()) {
                texts.push(text);
                if texts.len() >= cap {
                    return texts;
                }
            }
        }
    }
    texts
}

/// Image source of an element, preferring `src` over lazy-load `data-src`
/// and skipping inline data URIs
pub(crate) fn image_src(element: &ElementRef) -> Option<String> {
    let src = element
        .value()
        .attr("src")
        .or_else(|| element.value().attr("data-src"))?;
    if src.starts_with("data:image") || src.is_empty() {
        return None;
    }
    Some(src.to_string())
}

/// First image along a chain
pub(crate) fn first_image(document: &Html, chain: &[Selector]) -> Option<String> {
    for selector in chain {
        for element in document.select(selector) {
            if let Some(src) = image_src(&element) {
                return Some(src);
            }
        }
    }
    None
}

/// Label/value pairs from two-column table rows matched by the chain
pub(crate) fn table_pairs(
    document: &Html,
    row_chain: &[Selector],
    cell: &Selector,
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for selector in row_chain {
        for row in document.select(selector) {
            let cells: Vec<String> = row
                .select(cell)
                .map(|c| clean_text(&c.text().collect::<String>()))
                .collect();
            if cells.len() >= 2 && !cells[0].is_empty() && !cells[1].is_empty() {
                pairs.push((cells[0].clone(), cells[1].clone()));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_case_insensitive() {
        let extractor = extractor_for("Amazon", ExtractLimits::default()).unwrap();
        assert_eq!(extractor.retailer(), "amazon");
        let extractor = extractor_for("WALMART", ExtractLimits::default()).unwrap();
        assert_eq!(extractor.retailer(), "walmart");
    }

    #[test]
    fn test_registry_rejects_unknown_retailer() {
        assert!(extractor_for("target", ExtractLimits::default()).is_none());
    }

    #[test]
    fn test_page_url_first_page_is_base() {
        let extractor = extractor_for("amazon", ExtractLimits::default()).unwrap();
        let base = "https://www.amazon.com/s?k=electronics";
        assert_eq!(extractor.page_url(base, 1), base);
        assert_eq!(
            extractor.page_url(base, 3),
            "https://www.amazon.com/s?k=electronics&page=3"
        );
    }

    #[test]
    fn test_first_text_takes_earliest_selector_with_content() {
        let document = Html::parse_document(
            r#"<div class="b">fallback</div><div class="a">  </div><div class="a">primary</div>"#,
        );
        let chain = compile(&[".a", ".b"]);
        assert_eq!(first_text(&document, &chain), Some("primary".to_string()));
    }

    #[test]
    fn test_collect_texts_dedupes_and_caps() {
        let document = Html::parse_document(
            "<li>first bullet point</li><li>first bullet point</li>\
             <li>second bullet point</li><li>x</li><li>third bullet point</li>",
        );
        let chain = compile(&["li"]);
        let texts = collect_texts(&document, &chain, 10, 2);
        assert_eq!(texts, vec!["first bullet point", "second bullet point"]);
    }

    #[test]
    fn test_image_src_skips_data_uris() {
        let document = Html::parse_document(
            r#"<img src="data:image/png;base64,xyz"><img data-src="https://img.example.com/1.jpg">"#,
        );
        let chain = compile(&["img"]);
        assert_eq!(
            first_image(&document, &chain),
            Some("https://img.example.com/1.jpg".to_string())
        );
    }

    #[test]
    fn test_table_pairs_needs_two_cells() {
        let document = Html::parse_document(
            "<table><tr><td>Brand</td><td>Acme</td></tr>\
             <tr><td>orphan</td></tr></table>",
        );
        let rows = compile(&["tr"]);
        let cell = Selector::parse("td").unwrap();
        assert_eq!(
            table_pairs(&document, &rows, &cell),
            vec![("Brand".to_string(), "Acme".to_string())]
        );
    }
}
