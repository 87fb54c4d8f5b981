//! Environment-driven settings. Call `dotenv().ok()` before [`Config::from_env`].

use std::env;
use std::path::PathBuf;

use crate::normalizer::NoiseFilter;
use crate::reddit::RedditCredentials;

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "Smartphones", "Smart TVs", "Refrigerators", "Bluetooth Speakers", "Laptops",
    "Headphones", "Smartwatches", "Gaming Consoles", "Wireless Earbuds", "Tablets",
    "Monitors", "Printers", "Air Conditioners", "Microwaves", "Washing Machines",
    "Robot Vacuums", "Drones", "Projectors", "Fitness Trackers", "Power Banks",
];

pub const DEFAULT_SUBREDDITS: &[&str] = &[
    "BuyItForLife", "buildapcsales", "techsupport", "AskElectronics", "hardware",
    "gadgets", "smarthome", "homeautomation", "diyelectronics", "electronics",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub reddit: Option<RedditCredentials>,
    pub keywords: Vec<String>,
    pub subreddits: Vec<String>,
    pub amazon_pages: u32,
    pub reddit_search_limit: u32,
    pub scrape_delay_min_secs: f64,
    pub scrape_delay_max_secs: f64,
    pub noise_filter: NoiseFilter,
    /// Extra `word<TAB>valence` entries merged over the bundled sentiment lexicon.
    pub sentiment_lexicon: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://marketmorph.db?mode=rwc".to_string(),
            data_dir: PathBuf::from("data"),
            bind_addr: "0.0.0.0:3000".to_string(),
            reddit: None,
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
            amazon_pages: 5,
            reddit_search_limit: 20,
            scrape_delay_min_secs: 2.0,
            scrape_delay_max_secs: 5.0,
            noise_filter: NoiseFilter::PatternSource,
            sentiment_lexicon: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unparseable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let reddit = match (get("REDDIT_CLIENT_ID"), get("REDDIT_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(RedditCredentials {
                client_id,
                client_secret,
                user_agent: get("REDDIT_USER_AGENT").unwrap_or_else(|| "marketmorph".to_string()),
            }),
            _ => None,
        };

        Config {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            reddit,
            keywords: get("PRODUCT_KEYWORDS")
                .map(|v| parse_list(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.keywords),
            subreddits: get("SUBREDDITS")
                .map(|v| parse_list(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.subreddits),
            amazon_pages: get("AMAZON_PAGES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.amazon_pages),
            reddit_search_limit: get("REDDIT_SEARCH_LIMIT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reddit_search_limit),
            scrape_delay_min_secs: get("SCRAPE_DELAY_MIN_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.scrape_delay_min_secs),
            scrape_delay_max_secs: get("SCRAPE_DELAY_MAX_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.scrape_delay_max_secs),
            noise_filter: get("NOISE_FILTER")
                .and_then(|v| NoiseFilter::parse(&v))
                .unwrap_or(defaults.noise_filter),
            sentiment_lexicon: get("SENTIMENT_LEXICON").map(PathBuf::from),
        }
    }

    pub fn products_csv(&self) -> PathBuf {
        self.data_dir.join("amazon_products.csv")
    }

    pub fn raw_mentions_csv(&self) -> PathBuf {
        self.data_dir.join("raw").join("reddit_raw.csv")
    }

    pub fn mentions_csv(&self) -> PathBuf {
        self.data_dir.join("reddit_mentions.csv")
    }
}

/// Comma-separated list, blanks dropped.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
