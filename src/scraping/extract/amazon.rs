//! Amazon product page extraction

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

use super::{
    collect_texts, compile, first_image, first_text, last_text, table_pairs, ExtractError,
    ExtractLimits, RawRecord, RetailerExtractor,
};
use crate::types::url_fingerprint;

const BASE_URL: &str = "https://www.amazon.com";

/// ASIN embedded in a product URL
static RE_ASIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(?:dp|product)/([A-Z0-9]{10})").unwrap());

/// Low-resolution image size segment, e.g. `._AC_SX38_`
static RE_LOW_RES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\._AC_S([XY])\d+_").unwrap());

/// Extraction strategy for Amazon product and search pages.
///
/// Selector chains cover the handful of page layouts Amazon serves;
/// chains are ordered most-specific first and the first match wins.
pub struct AmazonExtractor {
    limits: ExtractLimits,
    title: Vec<Selector>,
    price: Vec<Selector>,
    original_price: Vec<Selector>,
    rating: Vec<Selector>,
    review_count: Vec<Selector>,
    availability: Vec<Selector>,
    primary_image: Vec<Selector>,
    gallery_images: Vec<Selector>,
    bullets: Vec<Selector>,
    spec_rows: Vec<Selector>,
    spec_cell: Selector,
    size_variations: Vec<Selector>,
    color_variations: Vec<Selector>,
    brand: Vec<Selector>,
    breadcrumbs: Vec<Selector>,
    search_links: Vec<Selector>,
}

impl AmazonExtractor {
    pub fn new(limits: ExtractLimits) -> Self {
        Self {
            limits,
            title: compile(&["#productTitle", "h1.a-size-large", ".product-title"]),
            price: compile(&[
                ".a-price .a-offscreen",
                "#priceblock_dealprice",
                "#priceblock_ourprice",
                ".a-price-whole",
            ]),
            original_price: compile(&[
                ".a-price-was .a-offscreen",
                ".a-text-strike",
                ".was-price .a-offscreen",
            ]),
            rating: compile(&[
                ".a-icon-star .a-icon-alt",
                ".review-rating .a-icon-alt",
                ".a-icon-alt",
            ]),
            review_count: compile(&["#acrCustomerReviewText", ".review-count"]),
            availability: compile(&[
                "#availability span",
                ".a-size-medium.a-color-success",
                ".a-size-medium.a-color-price",
            ]),
            primary_image: compile(&["#landingImage", "#imgBlkFront", ".product-image img"]),
            gallery_images: compile(&["#altImages img", ".imageThumbnail img", ".a-dynamic-image"]),
            bullets: compile(&["#feature-bullets .a-list-item", ".product-features li"]),
            spec_rows: compile(&["#prodDetails tr", ".a-section table tr"]),
            // "td" always parses
            spec_cell: Selector::parse("td").unwrap(),
            size_variations: compile(&[
                "#variation_size_name .a-button-text",
                ".size-button .a-button-text",
            ]),
            color_variations: compile(&[
                "#variation_color_name .a-button-text",
                ".color-button .a-button-text",
            ]),
            brand: compile(&["#bylineInfo", ".brand", "a.a-link-normal[href*='/brand/']"]),
            breadcrumbs: compile(&["#wayfinding-breadcrumbs_feature_div a", ".breadcrumb a"]),
            search_links: compile(&[
                "[data-component-type='s-search-result'] h2 a",
                ".s-result-item h2 a",
                "h2 a[href*='/dp/']",
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

    fn variations(&self, document: &Html) -> Vec<(String, String)> {
        let mut variations = Vec::new();
        for (kind, chain) in [
            ("size", &self.size_variations),
            ("color", &self.color_variations),
        ] {
            for selector in chain {
                for element in document.select(selector) {
                    let value = crate::util::clean_text(&element.text().collect::<String>());
                    if !value.is_empty() {
                        variations.push((kind.to_string(), value));
                    }
                }
            }
        }
        variations
    }
}

impl RetailerExtractor for AmazonExtractor {
    fn retailer(&self) -> &'static str {
        "amazon"
    }

    fn extract(&self, markup: &str, source_url: &str) -> Result<RawRecord, ExtractError> {
        let document = Html::parse_document(markup);

        let title = first_text(&document, &self.title).ok_or(ExtractError::NoStructure)?;
        let external_id =
            extract_asin(source_url).unwrap_or_else(|| url_fingerprint(source_url));

        let bullet_points = collect_texts(
            &document,
            &self.bullets,
            10,
            self.limits.max_bullet_points,
        );
        let description = if bullet_points.is_empty() {
            None
        } else {
            Some(bullet_points.join(" "))
        };

        Ok(RawRecord {
            source_url: source_url.to_string(),
            retailer: "amazon".to_string(),
            external_id,
            title,
            brand: first_text(&document, &self.brand),
            category: last_text(&document, &self.breadcrumbs),
            description,
            bullet_points,
            features: Vec::new(),
            price: first_text(&document, &self.price),
            original_price: first_text(&document, &self.original_price),
            availability: first_text(&document, &self.availability),
            rating: first_text(&document, &self.rating),
            review_count: first_text(&document, &self.review_count),
            images: self.images(&document),
            specifications: table_pairs(&document, &self.spec_rows, &self.spec_cell),
            variations: self.variations(&document),
        })
    }

    fn product_urls(&self, markup: &str) -> Vec<String> {
        let document = Html::parse_document(markup);
        let mut seen = std::collections::HashSet::new();
        let mut urls = Vec::new();
        for selector in &self.search_links {
            for element in document.select(selector) {
                if let Some(href) = element.value().attr("href") {
                    if !href.contains("/dp/") {
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
        Some(format!("{}/s?k={}", BASE_URL, query))
    }
}

/// ASIN from `/dp/` or `/product/` URL segments
fn extract_asin(url: &str) -> Option<String> {
    RE_ASIN
        .captures(url)
        .map(|c| c[1].to_string())
}

/// Rewrite a size-tagged image URL to its 1000px variant.
/// URLs without a size segment pass through unchanged.
fn high_res(url: &str) -> String {
    RE_LOW_RES.replace_all(url, "._AC_S${1}1000_").into_owned()
}
