use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use utoipa::ToSchema;

use crate::normalizer::TitleNormalizer;
use crate::tagger::Tagger;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    ]
});

static RATING_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(\.\d+)?").unwrap());

const SEARCH_BASE: &str = "https://www.amazon.com/s";
const MAX_ATTEMPTS: u32 = 3;

// ============================================================================
// Data Structures
// ============================================================================

/// One search result as scraped, before any cleaning.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RawListing {
    pub product_name: Option<String>,
    /// Whole-unit price text, commas and the trailing decimal point removed
    pub price: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<String>,
    /// Search keyword the listing was found under
    pub category: String,
}

/// Cleaned product row, keyed by its normalized name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct Product {
    pub product_name: String,
    pub price: f64,
    pub rating: f64,
    pub review_count: i64,
    pub category: String,
}

impl Product {
    /// Normalizes the name and coerces numeric fields. Rows missing any of them are dropped.
    pub fn from_listing<T: Tagger>(listing: &RawListing, normalizer: &TitleNormalizer<T>) -> Option<Self> {
        let product_name = normalizer.normalize_field(listing.product_name.as_deref());
        let price = listing.price.as_deref()?.parse::<f64>().ok()?;
        let rating = listing.rating?;
        let review_count = parse_review_count(listing.review_count.as_deref()?)?;

        Some(Product {
            product_name,
            price,
            rating,
            review_count,
            category: listing.category.clone(),
        })
    }
}

// ============================================================================
// Parsing Helpers
// ============================================================================

/// Search URL for one results page. Spaces in the keyword become `+`.
pub fn search_url(keyword: &str, page: u32) -> String {
    let query = keyword
        .split(' ')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("+");
    format!("{}?k={}&page={}", SEARCH_BASE, query, page)
}

/// "1,299." -> "1299"
pub fn parse_price(text: &str) -> Option<String> {
    let price = text.trim().replace(',', "");
    let price = price.strip_suffix('.').unwrap_or(&price).to_string();
    if price.is_empty() {
        None
    } else {
        Some(price)
    }
}

/// "4.5 out of 5 stars" -> 4.5
pub fn parse_rating(text: &str) -> Option<f64> {
    let text = text.trim();
    if !RATING_PREFIX.is_match(text) {
        return None;
    }
    text.split_whitespace().next()?.parse().ok()
}

/// "12,345" -> 12345. Anything else non-numeric is rejected.
pub fn parse_review_count(text: &str) -> Option<i64> {
    let cleaned = text.trim().trim_matches(|c| c == '(' || c == ')').replace(',', "");
    cleaned.parse().ok()
}

fn select_text(element: &ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
}

/// Extracts listings from a search results page. Items without a name or price are skipped.
pub fn parse_listings(html: &str, category: &str) -> Vec<RawListing> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("div.s-main-slot div.s-result-item").unwrap();
    let name_sel = Selector::parse("h2 span").unwrap();
    let price_sel = Selector::parse("span.a-price-whole").unwrap();
    let rating_sel = Selector::parse("span.a-icon-alt").unwrap();
    let reviews_sel = Selector::parse("span.a-size-base").unwrap();

    document
        .select(&item_sel)
        .map(|item| RawListing {
            product_name: select_text(&item, &name_sel).filter(|n| !n.is_empty()),
            price: select_text(&item, &price_sel).and_then(|p| parse_price(&p)),
            rating: select_text(&item, &rating_sel).and_then(|r| parse_rating(&r)),
            review_count: select_text(&item, &reviews_sel).filter(|r| !r.is_empty()),
            category: category.to_string(),
        })
        .filter(|l| l.product_name.is_some() && l.price.is_some())
        .collect()
}

// ============================================================================
// Scraper
// ============================================================================

/// Fetches search result pages with a polite random pause after each one.
pub struct AmazonScraper {
    client: reqwest::Client,
    delay_secs: (f64, f64),
}

impl AmazonScraper {
    pub fn new(delay_min_secs: f64, delay_max_secs: f64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        let low = delay_min_secs.max(0.0);
        let high = delay_max_secs.max(low);
        Ok(Self {
            client,
            delay_secs: (low, high),
        })
    }

    async fn polite_delay(&self) {
        let (low, high) = self.delay_secs;
        let secs = if high > low {
            rand::thread_rng().gen_range(low..high)
        } else {
            low
        };
        tracing::debug!("😴 Polite delay: {:.1}s", secs);
        sleep(Duration::from_millis((secs * 1000.0) as u64)).await;
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        use rand::seq::SliceRandom;
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let mut last_error = String::from("no attempt made");
        for attempt in 1..=MAX_ATTEMPTS {
            match self.fetch_page(url).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    tracing::warn!("❌ Attempt {}/{} for {} failed: {}", attempt, MAX_ATTEMPTS, url, e);
                    last_error = e.to_string();
                    if attempt < MAX_ATTEMPTS {
                        sleep(Duration::from_secs(5 * attempt as u64)).await;
                    }
                }
            }
        }
        Err(anyhow::anyhow!("Fetch failed after {} attempts. Last error: {}", MAX_ATTEMPTS, last_error))
    }

    /// Scrapes `pages` result pages for one keyword. Failed pages are logged and skipped.
    pub async fn scrape_keyword(&self, keyword: &str, pages: u32) -> Vec<RawListing> {
        let mut listings = Vec::new();
        for page in 1..=pages {
            let url = search_url(keyword, page);
            match self.fetch_with_retry(&url).await {
                Ok(html) => {
                    let found = parse_listings(&html, keyword);
                    tracing::info!("🛒 '{}' page {}: {} listings", keyword, page, found.len());
                    listings.extend(found);
                }
                Err(e) => tracing::error!("⚠️ Skipping '{}' page {}: {}", keyword, page, e),
            }
            self.polite_delay().await;
        }
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::RuleTagger;

    const SEARCH_PAGE: &str = r#"
        <html><body>
        <div class="s-main-slot">
          <div class="s-result-item">
            <h2><span>Apple Watch Series 8 GPS 41mm (Midnight)</span></h2>
            <span class="a-price-whole">1,299.</span>
            <span class="a-icon-alt">4.7 out of 5 stars</span>
            <span class="a-size-base">12,345</span>
          </div>
          <div class="s-result-item">
            <h2><span>Sponsored thing without a price</span></h2>
          </div>
          <div class="s-result-item">
            <h2><span>JBL Flip 6 Speaker</span></h2>
            <span class="a-price-whole">99.</span>
            <span class="a-icon-alt">No rating yet</span>
          </div>
          <div class="s-result-item"></div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_search_url() {
        assert_eq!(
            search_url("Bluetooth Speakers", 2),
            "https://www.amazon.com/s?k=Bluetooth+Speakers&page=2"
        );
        assert_eq!(search_url("4k tv & more", 1), "https://www.amazon.com/s?k=4k+tv+%26+more&page=1");
    }

    #[test]
    fn test_parse_listings() {
        let listings = parse_listings(SEARCH_PAGE, "Smartwatches");
        assert_eq!(listings.len(), 2);

        let watch = &listings[0];
        assert_eq!(watch.product_name.as_deref(), Some("Apple Watch Series 8 GPS 41mm (Midnight)"));
        assert_eq!(watch.price.as_deref(), Some("1299"));
        assert_eq!(watch.rating, Some(4.7));
        assert_eq!(watch.review_count.as_deref(), Some("12,345"));
        assert_eq!(watch.category, "Smartwatches");

        let speaker = &listings[1];
        assert_eq!(speaker.rating, None);
        assert_eq!(speaker.review_count, None);
    }

    #[test]
    fn test_field_coercion() {
        assert_eq!(parse_price(" 49. "), Some("49".to_string()));
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_rating("4.5 out of 5 stars"), Some(4.5));
        assert_eq!(parse_rating("4 out of 5 stars"), Some(4.0));
        assert_eq!(parse_rating("out of 5"), None);
        assert_eq!(parse_review_count("(2,048)"), Some(2048));
        assert_eq!(parse_review_count("Best Seller"), None);
    }

    #[test]
    fn test_product_from_listing() {
        let normalizer = TitleNormalizer::new(RuleTagger::with_stopwords(&["for", "the"]));
        let listings = parse_listings(SEARCH_PAGE, "Smartwatches");

        let product = Product::from_listing(&listings[0], &normalizer).unwrap();
        assert_eq!(product.product_name, "Apple Watch 8 41mm");
        assert_eq!(product.price, 1299.0);
        assert_eq!(product.review_count, 12345);

        // no rating, no review count
        assert!(Product::from_listing(&listings[1], &normalizer).is_none());
    }
}
