use anyhow::Result;
use dotenv::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use marketmorph::{
    config::Config, db, normalizer::TitleNormalizer, pipeline::Pipeline, sentiment::SentimentAnalyzer,
    tagger::RuleTagger,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let normalizer = TitleNormalizer::new(RuleTagger::new()).with_noise_filter(config.noise_filter);
    let analyzer = SentimentAnalyzer::from_lexicon_path(config.sentiment_lexicon.as_deref())?;
    tracing::info!(
        "🚀 One-shot run: {} keywords, {} subreddits, noise filter {:?}, {} lexicon entries",
        config.keywords.len(),
        config.subreddits.len(),
        normalizer.noise_filter(),
        analyzer.lexicon_len()
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    db::init_db(&pool).await?;

    let pipeline = Pipeline::new(config, Arc::new(normalizer), Arc::new(analyzer), pool.clone());

    let run_id = Uuid::new_v4().to_string();
    if !db::create_run(&pool, &run_id).await? {
        anyhow::bail!("Another pipeline run is still in progress");
    }
    let stats = pipeline.run(&run_id).await?;

    println!(
        "✅ Run {} done: {} listings, {} products, {} raw mentions, {} scored mentions",
        run_id, stats.listings, stats.products, stats.raw_mentions, stats.mentions
    );
    Ok(())
}
