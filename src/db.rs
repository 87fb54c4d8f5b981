use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::{sqlite::SqlitePool, Row};
use utoipa::ToSchema;

use crate::amazon::Product;
use crate::reddit::Mention;
use crate::sentiment::SentimentLabel;

pub async fn init_db(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_name TEXT NOT NULL,
            price REAL NOT NULL,
            rating REAL NOT NULL,
            review_count INTEGER NOT NULL,
            category TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mentions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_name TEXT NOT NULL,
            upvotes INTEGER NOT NULL,
            num_comments INTEGER NOT NULL,
            date TEXT NOT NULL,
            sentiment_score REAL NOT NULL,
            sentiment_label TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            finished_at TEXT,
            products INTEGER,
            mentions INTEGER,
            error TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_mentions_product ON mentions (product_name);")
        .execute(pool)
        .await?;

    Ok(())
}

// ============================================================================
// Products & Mentions
// ============================================================================

/// Replaces the whole `products` table in one transaction.
pub async fn replace_products(pool: &SqlitePool, products: &[Product]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM products").execute(&mut *tx).await?;

    for product in products {
        sqlx::query(
            "INSERT INTO products (product_name, price, rating, review_count, category) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&product.product_name)
        .bind(product.price)
        .bind(product.rating)
        .bind(product.review_count)
        .bind(&product.category)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("🗄️ Loaded {} products", products.len());
    Ok(())
}

/// Replaces the whole `mentions` table in one transaction.
pub async fn replace_mentions(pool: &SqlitePool, mentions: &[Mention]) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM mentions").execute(&mut *tx).await?;

    for mention in mentions {
        sqlx::query(
            r#"
            INSERT INTO mentions (product_name, upvotes, num_comments, date, sentiment_score, sentiment_label)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&mention.product_name)
        .bind(mention.upvotes)
        .bind(mention.num_comments)
        .bind(mention.date)
        .bind(mention.sentiment_score)
        .bind(mention.sentiment_label.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::info!("🗄️ Loaded {} mentions", mentions.len());
    Ok(())
}

pub async fn list_products(pool: &SqlitePool, limit: i64) -> Result<Vec<Product>> {
    let rows = sqlx::query(
        "SELECT product_name, price, rating, review_count, category FROM products ORDER BY id LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Product {
            product_name: row.get("product_name"),
            price: row.get("price"),
            rating: row.get("rating"),
            review_count: row.get("review_count"),
            category: row.get("category"),
        })
        .collect())
}

pub async fn list_mentions(pool: &SqlitePool, product: Option<&str>, limit: i64) -> Result<Vec<Mention>> {
    let rows = sqlx::query(
        r#"
        SELECT product_name, upvotes, num_comments, date, sentiment_score, sentiment_label
        FROM mentions
        WHERE ?1 IS NULL OR product_name = ?1
        ORDER BY date DESC
        LIMIT ?2
        "#,
    )
    .bind(product)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let label: String = row.get("sentiment_label");
            Mention {
                product_name: row.get("product_name"),
                upvotes: row.get("upvotes"),
                num_comments: row.get("num_comments"),
                date: row.get("date"),
                sentiment_score: row.get("sentiment_score"),
                sentiment_label: SentimentLabel::parse(&label).unwrap_or(SentimentLabel::Neutral),
            }
        })
        .collect())
}

/// Per-product mention statistics.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct MentionSummary {
    pub product_name: String,
    pub mentions: i64,
    pub avg_sentiment: f64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
}

pub async fn mention_summary(pool: &SqlitePool) -> Result<Vec<MentionSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT product_name,
               COUNT(*) AS mentions,
               AVG(sentiment_score) AS avg_sentiment,
               SUM(CASE WHEN sentiment_label = 'positive' THEN 1 ELSE 0 END) AS positive,
               SUM(CASE WHEN sentiment_label = 'negative' THEN 1 ELSE 0 END) AS negative,
               SUM(CASE WHEN sentiment_label = 'neutral' THEN 1 ELSE 0 END) AS neutral
        FROM mentions
        GROUP BY product_name
        ORDER BY mentions DESC, product_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| MentionSummary {
            product_name: row.get("product_name"),
            mentions: row.get("mentions"),
            avg_sentiment: row.get("avg_sentiment"),
            positive: row.get("positive"),
            negative: row.get("negative"),
            neutral: row.get("neutral"),
        })
        .collect())
}

// ============================================================================
// Pipeline Runs
// ============================================================================

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct PipelineRun {
    pub id: String,
    pub status: String,
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>)]
    pub finished_at: Option<NaiveDateTime>,
    pub products: Option<i64>,
    pub mentions: Option<i64>,
    pub error: Option<String>,
}

/// Inserts a `running` row unless another run is still running. Returns whether the
/// row was created. The check and insert are one statement.
pub async fn create_run(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO pipeline_runs (id, status, created_at)
         SELECT ?1, 'running', ?2
         WHERE NOT EXISTS (SELECT 1 FROM pipeline_runs WHERE status = 'running')",
    )
    .bind(id)
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn finish_run(pool: &SqlitePool, id: &str, products: i64, mentions: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE pipeline_runs SET status = 'completed', finished_at = ?2, products = ?3, mentions = ?4
         WHERE id = ?1 AND status = 'running'",
    )
    .bind(id)
    .bind(Utc::now().naive_utc())
    .bind(products)
    .bind(mentions)
    .execute(pool)
    .await?;
    anyhow::ensure!(result.rows_affected() == 1, "No running pipeline run with id {}", id);
    Ok(())
}

pub async fn fail_run(pool: &SqlitePool, id: &str, error: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE pipeline_runs SET status = 'failed', finished_at = ?2, error = ?3
         WHERE id = ?1 AND status = 'running'",
    )
    .bind(id)
    .bind(Utc::now().naive_utc())
    .bind(error)
    .execute(pool)
    .await?;
    anyhow::ensure!(result.rows_affected() == 1, "No running pipeline run with id {}", id);
    Ok(())
}

/// Marks runs left `running` by a previous process as failed. Call once at startup,
/// before any run is spawned.
pub async fn abandon_stale_runs(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE pipeline_runs SET status = 'failed', finished_at = ?1, error = 'interrupted by restart'
         WHERE status = 'running'",
    )
    .bind(Utc::now().naive_utc())
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

fn run_from_row(row: &sqlx::sqlite::SqliteRow) -> PipelineRun {
    PipelineRun {
        id: row.get("id"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        finished_at: row.get("finished_at"),
        products: row.get("products"),
        mentions: row.get("mentions"),
        error: row.get("error"),
    }
}

pub async fn get_run(pool: &SqlitePool, id: &str) -> Result<Option<PipelineRun>> {
    let row = sqlx::query(
        "SELECT id, status, created_at, finished_at, products, mentions, error FROM pipeline_runs WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(run_from_row))
}

pub async fn list_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<PipelineRun>> {
    let rows = sqlx::query(
        "SELECT id, status, created_at, finished_at, products, mentions, error FROM pipeline_runs ORDER BY created_at DESC LIMIT ?1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(run_from_row).collect())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // One connection: every in-memory connection is its own database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_db(&pool).await.expect("schema");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reddit::timestamp_to_datetime;

    fn product(name: &str) -> Product {
        Product {
            product_name: name.to_string(),
            price: 99.0,
            rating: 4.5,
            review_count: 100,
            category: "Headphones".to_string(),
        }
    }

    fn mention(name: &str, score: f64, ts: f64) -> Mention {
        Mention {
            product_name: name.to_string(),
            upvotes: 1,
            num_comments: 0,
            date: timestamp_to_datetime(ts),
            sentiment_score: score,
            sentiment_label: SentimentLabel::from_score(score),
        }
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let pool = test_pool().await;
        init_db(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_products() {
        let pool = test_pool().await;
        replace_products(&pool, &[product("Old One"), product("Old Two")]).await.unwrap();
        replace_products(&pool, &[product("SONY WH-1000XM5 Headphones")]).await.unwrap();

        let products = list_products(&pool, 10).await.unwrap();
        assert_eq!(products, vec![product("SONY WH-1000XM5 Headphones")]);
    }

    #[tokio::test]
    async fn test_mentions_and_summary() {
        let pool = test_pool().await;
        let mentions = vec![
            mention("Samsung S22", 0.6, 1_700_000_000.0),
            mention("Samsung S22", -0.4, 1_700_000_100.0),
            mention("Apple Watch 8", 0.0, 1_700_000_200.0),
        ];
        replace_mentions(&pool, &mentions).await.unwrap();

        let all = list_mentions(&pool, None, 10).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].product_name, "Apple Watch 8");
        assert_eq!(all[0].date, mentions[2].date);

        let samsung = list_mentions(&pool, Some("Samsung S22"), 10).await.unwrap();
        assert_eq!(samsung.len(), 2);
        assert_eq!(samsung[1].sentiment_label, SentimentLabel::Positive);

        let summary = mention_summary(&pool).await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].product_name, "Samsung S22");
        assert_eq!(summary[0].mentions, 2);
        assert_eq!(summary[0].positive, 1);
        assert_eq!(summary[0].negative, 1);
        assert!((summary[0].avg_sentiment - 0.1).abs() < 1e-9);
        assert_eq!(summary[1].neutral, 1);
    }

    #[tokio::test]
    async fn test_run_lifecycle() {
        let pool = test_pool().await;
        assert!(create_run(&pool, "run-1").await.unwrap());
        let run = get_run(&pool, "run-1").await.unwrap().unwrap();
        assert_eq!(run.status, "running");
        assert!(run.finished_at.is_none());

        finish_run(&pool, "run-1", 12, 34).await.unwrap();
        let run = get_run(&pool, "run-1").await.unwrap().unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.products, Some(12));
        assert_eq!(run.mentions, Some(34));
        assert!(run.finished_at.is_some());

        assert!(finish_run(&pool, "run-1", 1, 1).await.is_err());

        assert!(create_run(&pool, "run-2").await.unwrap());
        fail_run(&pool, "run-2", "boom").await.unwrap();
        let run = get_run(&pool, "run-2").await.unwrap().unwrap();
        assert_eq!(run.status, "failed");
        assert_eq!(run.error.as_deref(), Some("boom"));

        assert_eq!(list_runs(&pool, 10).await.unwrap().len(), 2);
        assert!(get_run(&pool, "missing").await.unwrap().is_none());
        assert!(fail_run(&pool, "missing", "boom").await.is_err());
    }

    #[tokio::test]
    async fn test_one_running_run_at_a_time() {
        let pool = test_pool().await;
        assert!(create_run(&pool, "first").await.unwrap());
        assert!(!create_run(&pool, "second").await.unwrap());
        assert!(get_run(&pool, "second").await.unwrap().is_none());

        finish_run(&pool, "first", 0, 0).await.unwrap();
        assert!(create_run(&pool, "second").await.unwrap());
    }

    #[tokio::test]
    async fn test_abandon_stale_runs() {
        let pool = test_pool().await;
        assert!(create_run(&pool, "done").await.unwrap());
        finish_run(&pool, "done", 1, 2).await.unwrap();
        assert!(create_run(&pool, "orphan").await.unwrap());

        assert_eq!(abandon_stale_runs(&pool).await.unwrap(), 1);
        let run = get_run(&pool, "orphan").await.unwrap().unwrap();
        assert_eq!(run.status, "failed");
        assert_eq!(run.error.as_deref(), Some("interrupted by restart"));
        assert_eq!(get_run(&pool, "done").await.unwrap().unwrap().status, "completed");

        assert!(create_run(&pool, "next").await.unwrap());
        assert_eq!(abandon_stale_runs(&pool).await.unwrap(), 1);
        assert_eq!(abandon_stale_runs(&pool).await.unwrap(), 0);
    }
}
