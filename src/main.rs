use axum::{
    routing::{get, post},
    Router,
};
use dotenv::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use marketmorph::{api, config::Config, db};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::normalize_title,
        api::score_sentiment,
        api::trigger_pipeline,
        api::get_pipeline_run,
        api::list_pipeline_runs,
        api::list_products,
        api::list_mentions,
        api::mention_summary
    ),
    components(
        schemas(
            api::NormalizeRequest,
            api::NormalizeResponse,
            api::SentimentRequest,
            api::SentimentResponse,
            api::PipelineResponse,
            marketmorph::amazon::Product,
            marketmorph::reddit::Mention,
            marketmorph::sentiment::PolarityScores,
            marketmorph::sentiment::SentimentLabel,
            db::MentionSummary,
            db::PipelineRun
        )
    ),
    tags(
        (name = "normalizer", description = "Product title normalization"),
        (name = "sentiment", description = "Mention sentiment scoring"),
        (name = "pipeline", description = "Collection runs"),
        (name = "data", description = "Stored products and mentions")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    db::init_db(&pool).await?;
    let abandoned = db::abandon_stale_runs(&pool).await?;
    if abandoned > 0 {
        tracing::warn!("⚠️ Marked {} interrupted pipeline run(s) as failed", abandoned);
    }

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(api::AppState::new(pool, config)?);

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/normalize", post(api::normalize_title))
        .route("/sentiment", post(api::score_sentiment))
        .route("/pipeline", post(api::trigger_pipeline).get(api::list_pipeline_runs))
        .route("/pipeline/:run_id", get(api::get_pipeline_run))
        .route("/products", get(api::list_products))
        .route("/mentions", get(api::list_mentions))
        .route("/mentions/summary", get(api::mention_summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
