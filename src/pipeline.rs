//! One end-to-end collection run: listings -> products -> mentions -> database.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::amazon::{AmazonScraper, Product, RawListing};
use crate::config::Config;
use crate::db;
use crate::export;
use crate::normalizer::TitleNormalizer;
use crate::reddit::{Mention, RawMention, RedditClient};
use crate::sentiment::SentimentAnalyzer;
use crate::tagger::{RuleTagger, Tagger};

#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema, PartialEq)]
pub struct RunStats {
    pub listings: usize,
    pub products: usize,
    pub raw_mentions: usize,
    pub mentions: usize,
}

/// Normalizes listing names and keeps only rows with every numeric field present.
pub fn build_products<T: Tagger>(listings: &[RawListing], normalizer: &TitleNormalizer<T>) -> Vec<Product> {
    listings
        .iter()
        .filter_map(|l| Product::from_listing(l, normalizer))
        .collect()
}

/// Distinct non-empty product names, first occurrence order.
pub fn distinct_labels(products: &[Product]) -> Vec<String> {
    let mut seen = HashSet::new();
    products
        .iter()
        .map(|p| p.product_name.clone())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

pub fn score_mentions(raw: &[RawMention], analyzer: &SentimentAnalyzer) -> Vec<Mention> {
    raw.iter().map(|m| Mention::score(m, analyzer)).collect()
}

pub struct Pipeline {
    config: Config,
    normalizer: Arc<TitleNormalizer<RuleTagger>>,
    analyzer: Arc<SentimentAnalyzer>,
    pool: SqlitePool,
}

impl Pipeline {
    pub fn new(
        config: Config,
        normalizer: Arc<TitleNormalizer<RuleTagger>>,
        analyzer: Arc<SentimentAnalyzer>,
        pool: SqlitePool,
    ) -> Self {
        Self {
            config,
            normalizer,
            analyzer,
            pool,
        }
    }

    async fn collect_listings(&self) -> Result<Vec<RawListing>> {
        let scraper = AmazonScraper::new(self.config.scrape_delay_min_secs, self.config.scrape_delay_max_secs)?;
        let mut listings = Vec::new();
        for keyword in &self.config.keywords {
            tracing::info!("🛒 Scraping Amazon for: {}", keyword);
            listings.extend(scraper.scrape_keyword(keyword, self.config.amazon_pages).await);
        }
        Ok(listings)
    }

    async fn collect_mentions(&self, labels: &[String]) -> Result<Vec<RawMention>> {
        let Some(credentials) = &self.config.reddit else {
            tracing::warn!("⚠️ REDDIT_CLIENT_ID/REDDIT_CLIENT_SECRET not set. Skipping mention search.");
            return Ok(Vec::new());
        };
        let client = RedditClient::connect(credentials).await?;

        let mut mentions = Vec::new();
        for subreddit in &self.config.subreddits {
            tracing::info!("🔎 Searching subreddit: r/{}", subreddit);
            for label in labels {
                let short: String = label.chars().take(60).collect();
                match client.search(subreddit, label, self.config.reddit_search_limit).await {
                    Ok(found) => {
                        tracing::debug!("  r/{} '{}': {} submissions", subreddit, short, found.len());
                        mentions.extend(found.iter().map(|s| RawMention::from_submission(s, subreddit, label)));
                    }
                    Err(e) => {
                        tracing::warn!("  ❌ Error searching r/{} for {}: {}", subreddit, short, e);
                        continue;
                    }
                }
            }
        }
        Ok(mentions)
    }

    /// Runs every stage. CSV snapshots are written after each stage.
    pub async fn execute(&self) -> Result<RunStats> {
        let mut stats = RunStats::default();

        let listings = self.collect_listings().await?;
        stats.listings = listings.len();

        let products = build_products(&listings, &self.normalizer);
        stats.products = products.len();
        export::write_products(&self.config.products_csv(), &products)?;
        tracing::info!("✅ {} products kept from {} listings", products.len(), listings.len());

        let labels = distinct_labels(&products);
        let raw_mentions = self.collect_mentions(&labels).await?;
        stats.raw_mentions = raw_mentions.len();
        export::write_raw_mentions(&self.config.raw_mentions_csv(), &raw_mentions)?;

        tracing::info!("🧠 Scoring sentiment for {} mentions", raw_mentions.len());
        let mentions = score_mentions(&raw_mentions, &self.analyzer);
        stats.mentions = mentions.len();
        export::write_mentions(&self.config.mentions_csv(), &mentions)?;

        db::replace_products(&self.pool, &products).await?;
        db::replace_mentions(&self.pool, &mentions).await?;

        Ok(stats)
    }

    /// Runs the pipeline and records the outcome on the `pipeline_runs` row
    /// created by [`db::create_run`]. A run that cannot be marked completed is marked
    /// failed, so the row never stays `running`.
    pub async fn run(&self, run_id: &str) -> Result<RunStats> {
        let outcome = match self.execute().await {
            Ok(stats) => db::finish_run(&self.pool, run_id, stats.products as i64, stats.mentions as i64)
                .await
                .context("Failed to record run completion")
                .map(|_| stats),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(stats) => {
                tracing::info!("✅ Run {} completed: {:?}", run_id, stats);
                Ok(stats)
            }
            Err(e) => {
                tracing::error!("❌ Run {} failed: {:#}", run_id, e);
                if let Err(record_err) = db::fail_run(&self.pool, run_id, &format!("{:#}", e)).await {
                    tracing::error!("❌ Could not record failure of run {}: {:#}", run_id, record_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reddit::timestamp_to_datetime;
    use crate::sentiment::SentimentLabel;

    fn listing(name: &str, price: &str, rating: Option<f64>, reviews: Option<&str>) -> RawListing {
        RawListing {
            product_name: Some(name.to_string()),
            price: Some(price.to_string()),
            rating,
            review_count: reviews.map(String::from),
            category: "Headphones".to_string(),
        }
    }

    fn normalizer() -> TitleNormalizer<RuleTagger> {
        TitleNormalizer::new(RuleTagger::with_stopwords(&["for", "the", "with"]))
    }

    #[test]
    fn test_build_products_filters_incomplete_rows() {
        let listings = vec![
            listing("SONY Sony WH-1000XM5 Headphones", "348", Some(4.6), Some("9,876")),
            listing("Mystery Buds", "19", None, Some("10")),
            listing("Cheap Buds", "n/a", Some(3.0), Some("10")),
            listing("Samsung S22", "499", Some(4.1), Some("Amazon's Choice")),
        ];
        let products = build_products(&listings, &normalizer());
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_name, "SONY WH-1000XM5 Headphones");
        assert_eq!(products[0].review_count, 9876);
    }

    #[test]
    fn test_distinct_labels() {
        let product = |name: &str| Product {
            product_name: name.to_string(),
            price: 1.0,
            rating: 1.0,
            review_count: 1,
            category: String::new(),
        };
        let labels = distinct_labels(&[product("B"), product("A"), product("B"), product("")]);
        assert_eq!(labels, vec!["B", "A"]);
    }

    #[test]
    fn test_score_mentions() {
        let raw = vec![RawMention {
            title: "Worst earbuds ever,\nthey broke".to_string(),
            subreddit: "gadgets".to_string(),
            product_name: "Earbuds".to_string(),
            upvotes: 3,
            num_comments: 1,
            date: timestamp_to_datetime(1_700_000_000.0),
        }];
        let mentions = score_mentions(&raw, &SentimentAnalyzer::new());
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].sentiment_label, SentimentLabel::Negative);
        assert_eq!(mentions[0].upvotes, 3);
    }

    #[tokio::test]
    async fn test_run_without_sources_records_empty_run() {
        let dir = std::env::temp_dir().join(format!("marketmorph-run-{}", uuid::Uuid::new_v4()));
        let config = Config {
            data_dir: dir.clone(),
            keywords: Vec::new(),
            reddit: None,
            ..Config::default()
        };
        let pool = db::test_pool().await;
        let pipeline = Pipeline::new(
            config,
            Arc::new(normalizer()),
            Arc::new(SentimentAnalyzer::new()),
            pool.clone(),
        );

        assert!(db::create_run(&pool, "empty").await.unwrap());
        let stats = pipeline.run("empty").await.unwrap();
        assert_eq!(stats, RunStats::default());
        assert!(dir.join("amazon_products.csv").exists());
        assert!(dir.join("raw").join("reddit_raw.csv").exists());

        let run = db::get_run(&pool, "empty").await.unwrap().unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.products, Some(0));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_unrecorded_completion_marks_run_failed() {
        let dir = std::env::temp_dir().join(format!("marketmorph-run-{}", uuid::Uuid::new_v4()));
        let config = Config {
            data_dir: dir.clone(),
            keywords: Vec::new(),
            reddit: None,
            ..Config::default()
        };
        let pool = db::test_pool().await;
        sqlx::query(
            "CREATE TRIGGER block_complete BEFORE UPDATE ON pipeline_runs
             WHEN NEW.status = 'completed'
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&pool)
        .await
        .unwrap();
        let pipeline = Pipeline::new(
            config,
            Arc::new(normalizer()),
            Arc::new(SentimentAnalyzer::new()),
            pool.clone(),
        );

        assert!(db::create_run(&pool, "stuck").await.unwrap());
        let err = pipeline.run("stuck").await.unwrap_err();
        assert!(format!("{:#}", err).contains("disk full"));

        let run = db::get_run(&pool, "stuck").await.unwrap().unwrap();
        assert_eq!(run.status, "failed");
        assert!(run.error.unwrap().contains("disk full"));
        assert!(run.finished_at.is_some());

        std::fs::remove_dir_all(dir).ok();
    }
}
