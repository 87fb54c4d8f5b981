//! Reddit search client (application-only OAuth).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;

use crate::sentiment::{SentimentAnalyzer, SentimentLabel};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const MAX_PAGE_SIZE: u32 = 100;

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\n\r\t]+").unwrap());

/// Script-app credentials.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

/// The submission fields the pipeline uses.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Submission {
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    pub created_utc: f64,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// A submission found while searching for a product label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawMention {
    pub title: String,
    pub subreddit: String,
    pub product_name: String,
    pub upvotes: i64,
    pub num_comments: i64,
    pub date: NaiveDateTime,
}

impl RawMention {
    pub fn from_submission(submission: &Submission, subreddit: &str, product_name: &str) -> Self {
        Self {
            title: submission.title.clone(),
            subreddit: subreddit.to_string(),
            product_name: product_name.to_string(),
            upvotes: submission.score,
            num_comments: submission.num_comments,
            date: timestamp_to_datetime(submission.created_utc),
        }
    }
}

/// A scored mention, ready for storage. Title and subreddit are dropped after scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Mention {
    pub product_name: String,
    pub upvotes: i64,
    pub num_comments: i64,
    #[schema(value_type = String)]
    pub date: NaiveDateTime,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
}

impl Mention {
    /// Cleans the title and scores it.
    pub fn score(raw: &RawMention, analyzer: &SentimentAnalyzer) -> Self {
        let title = clean_mention_title(&raw.title);
        let sentiment_score = analyzer.score(Some(&title));
        Self {
            product_name: raw.product_name.clone(),
            upvotes: raw.upvotes,
            num_comments: raw.num_comments,
            date: raw.date,
            sentiment_score,
            sentiment_label: SentimentLabel::from_score(sentiment_score),
        }
    }
}

/// Unix seconds to a naive UTC timestamp. Out-of-range values map to the epoch.
pub fn timestamp_to_datetime(secs: f64) -> NaiveDateTime {
    let whole = secs.trunc() as i64;
    let nanos = ((secs.fract()) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole, nanos)
        .unwrap_or_default()
        .naive_utc()
}

/// Flattens a mention title for CSV storage: line breaks to spaces, `"` to `'`, `,` to space.
pub fn clean_mention_title(title: &str) -> String {
    LINE_BREAKS
        .replace_all(title, " ")
        .replace('"', "'")
        .replace(',', " ")
        .trim()
        .to_string()
}

fn parse_listing(body: &str) -> Result<(Vec<Submission>, Option<String>)> {
    let listing: Listing = serde_json::from_str(body).context("Failed to parse search listing")?;
    let submissions = listing.data.children.into_iter().map(|c| c.data).collect();
    Ok((submissions, listing.data.after))
}

/// Authenticated client. Tokens are app-only and last an hour, enough for one run.
pub struct RedditClient {
    client: reqwest::Client,
    token: String,
    user_agent: String,
}

impl RedditClient {
    pub async fn connect(credentials: &RedditCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        let response = client
            .post(TOKEN_URL)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .header(reqwest::header::USER_AGENT, &credentials.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("Token request failed")?
            .error_for_status()
            .context("Reddit rejected the credentials")?;

        let token: TokenResponse = response.json().await.context("Malformed token response")?;
        tracing::info!("🔑 Reddit client authenticated");

        Ok(Self {
            client,
            token: token.access_token,
            user_agent: credentials.user_agent.clone(),
        })
    }

    /// Searches one subreddit, following pagination until `limit` submissions are collected.
    pub async fn search(&self, subreddit: &str, query: &str, limit: u32) -> Result<Vec<Submission>> {
        let url = format!("{}/r/{}/search", API_BASE, subreddit);
        let mut results = Vec::new();
        let mut after: Option<String> = None;

        while (results.len() as u32) < limit {
            let page_size = (limit - results.len() as u32).min(MAX_PAGE_SIZE).to_string();
            let mut params = vec![
                ("q", query.to_string()),
                ("restrict_sr", "on".to_string()),
                ("sort", "relevance".to_string()),
                ("limit", page_size),
            ];
            if let Some(cursor) = &after {
                params.push(("after", cursor.clone()));
            }

            let body = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .query(&params)
                .send()
                .await
                .with_context(|| format!("Search request to r/{} failed", subreddit))?
                .error_for_status()?
                .text()
                .await?;

            let (page, next) = parse_listing(&body)?;
            let exhausted = page.is_empty() || next.is_none();
            results.extend(page);
            if exhausted {
                break;
            }
            after = next;
        }

        results.truncate(limit as usize);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_abc",
            "children": [
                {"kind": "t3", "data": {
                    "title": "Sony WH-1000XM5 worth it?",
                    "selftext": "Thinking of upgrading",
                    "score": 42,
                    "num_comments": 17,
                    "created_utc": 1700000000.0,
                    "url": "https://reddit.com/r/headphones/abc",
                    "subreddit": "headphones"
                }},
                {"kind": "t3", "data": {
                    "title": "Link post",
                    "created_utc": 1700000100
                }}
            ]
        }
    }"#;

    #[test]
    fn test_parse_listing() {
        let (submissions, after) = parse_listing(LISTING).unwrap();
        assert_eq!(after.as_deref(), Some("t3_abc"));
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].score, 42);
        assert_eq!(submissions[0].num_comments, 17);
        assert_eq!(submissions[1].selftext, "");
        assert_eq!(submissions[1].score, 0);
    }

    #[test]
    fn test_parse_listing_rejects_garbage() {
        assert!(parse_listing("<html>rate limited</html>").is_err());
    }

    #[test]
    fn test_raw_mention_from_submission() {
        let (submissions, _) = parse_listing(LISTING).unwrap();
        let mention = RawMention::from_submission(&submissions[0], "headphones", "Sony WH-1000XM5");
        assert_eq!(mention.subreddit, "headphones");
        assert_eq!(mention.product_name, "Sony WH-1000XM5");
        assert_eq!(mention.upvotes, 42);
        assert_eq!(mention.date.to_string(), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_clean_mention_title() {
        assert_eq!(
            clean_mention_title("  \"Best\" buds,\n\tcheap\r\n ones "),
            "'Best' buds  cheap  ones"
        );
        assert_eq!(clean_mention_title("plain"), "plain");
    }

    #[test]
    fn test_mention_scoring() {
        let raw = RawMention {
            title: "Love my new \"XM5\", amazing\nnoise cancelling".to_string(),
            subreddit: "headphones".to_string(),
            product_name: "Sony WH-1000XM5".to_string(),
            upvotes: 5,
            num_comments: 2,
            date: timestamp_to_datetime(1700000000.0),
        };
        let mention = Mention::score(&raw, &SentimentAnalyzer::new());
        assert_eq!(mention.product_name, "Sony WH-1000XM5");
        assert_eq!(mention.sentiment_label, SentimentLabel::Positive);
        assert!(mention.sentiment_score > 0.2);
    }

    #[test]
    fn test_timestamp_fraction() {
        let date = timestamp_to_datetime(1.5);
        assert_eq!(date.to_string(), "1970-01-01 00:00:01.500");
    }
}
