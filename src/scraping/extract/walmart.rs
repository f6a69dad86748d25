//! Walmart product page extraction

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

use super::{
    collect_texts, compile, first_image, first_text, last_text, table_pairs, ExtractError,
    ExtractLimits, RawRecord, RetailerExtractor,
};
use crate::types::url_fingerprint;

const BASE_URL: &str = "https://www.walmart.com";

/// Numeric item id at the end of an `/ip/` product path
static RE_ITEM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/ip/(?:[^/?]+/)?(\d+)").unwrap());

/// Thumbnail-sized dimensions in image query strings
static RE_ODN_SIZE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"odn(Height|Width)=\d+").unwrap());

/// Extraction strategy for Walmart product and search pages
pub struct WalmartExtractor {
    limits: ExtractLimits,
    title: Vec<Selector>,
    price: Vec<Selector>,
    original_price: Vec<Selector>,
    rating: Vec<Selector>,
    review_count: Vec<Selector>,
    availability: Vec<Selector>,
    primary_image: Vec<Selector>,
    gallery_images: Vec<Selector>,
    description: Vec<Selector>,
    highlights: Vec<Selector>,
    spec_rows: Vec<Selector>,
    spec_cell: Selector,
    variations: Vec<Selector>,
    brand: Vec<Selector>,
    breadcrumbs: Vec<Selector>,
    search_links: Vec<Selector>,
}

impl WalmartExtractor {
    pub fn new(limits: ExtractLimits) -> Self {
        Self {
            limits,
            title: compile(&[
                "h1[itemprop='name']",
                "h1[data-automation-id='product-title']",
                "h1.prod-ProductTitle",
            ]),
            price: compile(&[
                "span[itemprop='price']",
                "[data-automation-id='product-price'] span",
                ".price-characteristic",
            ]),
            original_price: compile(&[
                "[data-automation-id='strikethrough-price']",
                ".price-was",
                ".strike-through",
            ]),
            rating: compile(&[
                "span[itemprop='ratingValue']",
                "[data-testid='reviews-rating'] span",
                ".rating-number",
            ]),
            review_count: compile(&[
                "span[itemprop='reviewCount']",
                "[data-testid='reviews-count']",
                "a[link-identifier='reviewsLink']",
            ]),
            availability: compile(&[
                "[data-automation-id='fulfillment-section']",
                "[data-testid='fulfillment-badge']",
                ".prod-fulfillment",
            ]),
            primary_image: compile(&[
                "img[data-testid='hero-image']",
                ".hover-zoom-hero-image img",
                ".prod-hero-image img",
            ]),
            gallery_images: compile(&[
                "[data-testid='media-thumbnail'] img",
                ".prod-alt-image img",
            ]),
            description: compile(&[
                "[data-testid='product-description']",
                ".about-desc",
                "#product-about",
            ]),
            highlights: compile(&[
                "[data-testid='product-highlights'] li",
                ".product-highlights li",
                "#product-about li",
            ]),
            spec_rows: compile(&[
                "[data-testid='specifications'] tr",
                ".specifications-table tr",
            ]),
            // "td" always parses
            spec_cell: Selector::parse("td").unwrap(),
            variations: compile(&[
                "[data-testid='variant-tile'] span",
                ".variant-swatch span",
            ]),
            brand: compile(&[
                "a[link-identifier='brandName']",
                "span[itemprop='brand']",
                ".prod-brandName",
            ]),
            breadcrumbs: compile(&[
                "nav[aria-label='breadcrumb'] a",
                ".breadcrumb a",
            ]),
            search_links: compile(&[
                "[data-testid='item-stack'] a[href*='/ip/']",
                "[data-item-id] a[href*='/ip/']",
                "a[href*='/ip/']",
            ]),
        }
    }

    fn images(&self, document: &Html) -> Vec<String> {
        let mut images = Vec::new();
        if let Some(src) = first_image(document, &self.primary_image) {
            images.push(high_res(&src));
        }
        'chains: for selector in &self.gallery_images {
            for element in document.select(selector) {
                if let Some(src) = super::image_src(&element) {
                    let src = high_res(&src);
                    if !images.contains(&src) {
                        images.push(src);
                    }
                    if images.len() >= self.limits.max_images {
                        break 'chains;
                    }
                }
            }
        }
        images
    }
}

impl RetailerExtractor for WalmartExtractor {
    fn retailer(&self) -> &'static str {
        "walmart"
    }

    fn extract(&self, markup: &str, source_url: &str) -> Result<RawRecord, ExtractError> {
        let document = Html::parse_document(markup);

        let title = first_text(&document, &self.title).ok_or(ExtractError::NoStructure)?;
        let external_id =
            extract_item_id(source_url).unwrap_or_else(|| url_fingerprint(source_url));

        let highlights = collect_texts(
            &document,
            &self.highlights,
            10,
            self.limits.max_bullet_points,
        );

        Ok(RawRecord {
            source_url: source_url.to_string(),
            retailer: "walmart".to_string(),
            external_id,
            title,
            brand: first_text(&document, &self.brand),
            category: last_text(&document, &self.breadcrumbs),
            description: first_text(&document, &self.description),
            bullet_points: highlights.clone(),
            features: highlights,
            price: first_text(&document, &self.price),
            original_price: first_text(&document, &self.original_price),
            availability: first_text(&document, &self.availability),
            rating: first_text(&document, &self.rating),
            review_count: first_text(&document, &self.review_count),
            images: self.images(&document),
            specifications: table_pairs(&document, &self.spec_rows, &self.spec_cell),
            variations: self
                .variations
                .iter()
                .flat_map(|selector| document.select(selector))
                .map(|e| {
                    let value = crate::util::clean_text(&e.text().collect::<String>());
                    ("variant".to_string(), value)
                })
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        })
    }

    fn product_urls(&self, markup: &str) -> Vec<String> {
        let document = Html::parse_document(markup);
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for selector in &self.search_links {
            for element in document.select(selector) {
                if let Some(href) = element.value().attr("href") {
                    if !href.contains("/ip/") {
                        continue;
                    }
                    let full = if href.starts_with("http") {
                        href.to_string()
                    } else {
                        format!("{}{}", BASE_URL, href)
                    };
                    if seen.insert(full.clone()) {
                        urls.push(full);
                    }
                }
            }
        }
        urls
    }

    fn category_url(&self, category: &str) -> Option<String> {
        let query = match category {
            "electronics" => "electronics",
            "home" => "home+kitchen",
            "fashion" => "clothing",
            "books" => "books",
            "sports" => "sports+outdoors",
            _ => return None,
        };
        Some(format!("{}/search?q={}", BASE_URL, query))
    }
}

/// Item id from an `/ip/<slug>/<digits>` product path
fn extract_item_id(url: &str) -> Option<String> {
    RE_ITEM_ID.captures(url).map(|c| c[1].to_string())
}

/// Rewrite thumbnail dimensions in the image query to 1000px.
/// URLs without the size parameters pass through unchanged.
fn high_res(url: &str) -> String {
    RE_ODN_SIZE.replace_all(url, "odn${1}=1000").into_owned()
}
