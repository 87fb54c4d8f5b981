use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::amazon::Product;
use crate::config::Config;
use crate::db::{self, MentionSummary, PipelineRun};
use crate::normalizer::TitleNormalizer;
use crate::pipeline::Pipeline;
use crate::reddit::Mention;
use crate::sentiment::{PolarityScores, SentimentAnalyzer, SentimentLabel};
use crate::tagger::RuleTagger;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub normalizer: Arc<TitleNormalizer<RuleTagger>>,
    pub analyzer: Arc<SentimentAnalyzer>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> anyhow::Result<Self> {
        let normalizer = TitleNormalizer::new(RuleTagger::new()).with_noise_filter(config.noise_filter);
        let analyzer = SentimentAnalyzer::from_lexicon_path(config.sentiment_lexicon.as_deref())?;
        Ok(Self {
            pool,
            config,
            normalizer: Arc::new(normalizer),
            analyzer: Arc::new(analyzer),
        })
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.config.clone(),
            self.normalizer.clone(),
            self.analyzer.clone(),
            self.pool.clone(),
        )
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NormalizeRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NormalizeResponse {
    pub normalized: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SentimentRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SentimentResponse {
    pub scores: PolarityScores,
    pub label: SentimentLabel,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PipelineResponse {
    pub run_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MentionsQuery {
    /// Exact normalized product name.
    pub product: Option<String>,
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    tracing::error!("❌ Request failed: {:#}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

#[utoipa::path(
    post,
    path = "/normalize",
    request_body = NormalizeRequest,
    responses(
        (status = 200, description = "Normalized product title", body = NormalizeResponse)
    ),
    tag = "normalizer"
)]
pub async fn normalize_title(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NormalizeRequest>,
) -> Json<NormalizeResponse> {
    Json(NormalizeResponse {
        normalized: state.normalizer.normalize_field(req.title.as_deref()),
    })
}

#[utoipa::path(
    post,
    path = "/sentiment",
    request_body = SentimentRequest,
    responses(
        (status = 200, description = "Polarity scores and label", body = SentimentResponse)
    ),
    tag = "sentiment"
)]
pub async fn score_sentiment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SentimentRequest>,
) -> Json<SentimentResponse> {
    let scores = state.analyzer.polarity_scores(&req.text);
    Json(SentimentResponse {
        label: SentimentLabel::from_score(scores.compound),
        scores,
    })
}

#[utoipa::path(
    post,
    path = "/pipeline",
    responses(
        (status = 200, description = "Pipeline run started", body = PipelineResponse),
        (status = 409, description = "Another run is still in progress"),
        (status = 500, description = "Run could not be recorded")
    ),
    tag = "pipeline"
)]
pub async fn trigger_pipeline(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PipelineResponse>, StatusCode> {
    let run_id = Uuid::new_v4().to_string();
    if !db::create_run(&state.pool, &run_id).await.map_err(internal_error)? {
        tracing::warn!("⚠️ Pipeline trigger rejected: another run is in progress");
        return Err(StatusCode::CONFLICT);
    }
    tracing::info!("🚀 Pipeline run {} started", run_id);

    let pipeline = state.pipeline();
    let id = run_id.clone();
    tokio::spawn(async move {
        if let Err(e) = pipeline.run(&id).await {
            tracing::debug!("Run {} ended with error (recorded): {:#}", id, e);
        }
    });

    Ok(Json(PipelineResponse {
        run_id,
        status: "running".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/pipeline/{run_id}",
    params(
        ("run_id" = String, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Run status", body = PipelineRun),
        (status = 404, description = "Run not found")
    ),
    tag = "pipeline"
)]
pub async fn get_pipeline_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<PipelineRun>, StatusCode> {
    match db::get_run(&state.pool, &run_id).await.map_err(internal_error)? {
        Some(run) => Ok(Json(run)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

#[utoipa::path(
    get,
    path = "/pipeline",
    params(LimitQuery),
    responses(
        (status = 200, description = "Recent runs, newest first", body = Vec<PipelineRun>)
    ),
    tag = "pipeline"
)]
pub async fn list_pipeline_runs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PipelineRun>>, StatusCode> {
    let runs = db::list_runs(&state.pool, clamp_limit(query.limit))
        .await
        .map_err(internal_error)?;
    Ok(Json(runs))
}

#[utoipa::path(
    get,
    path = "/products",
    params(LimitQuery),
    responses(
        (status = 200, description = "Stored products", body = Vec<Product>)
    ),
    tag = "data"
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Product>>, StatusCode> {
    let products = db::list_products(&state.pool, clamp_limit(query.limit))
        .await
        .map_err(internal_error)?;
    Ok(Json(products))
}

#[utoipa::path(
    get,
    path = "/mentions",
    params(MentionsQuery),
    responses(
        (status = 200, description = "Scored mentions, newest first", body = Vec<Mention>)
    ),
    tag = "data"
)]
pub async fn list_mentions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MentionsQuery>,
) -> Result<Json<Vec<Mention>>, StatusCode> {
    let mentions = db::list_mentions(&state.pool, query.product.as_deref(), clamp_limit(query.limit))
        .await
        .map_err(internal_error)?;
    Ok(Json(mentions))
}

#[utoipa::path(
    get,
    path = "/mentions/summary",
    responses(
        (status = 200, description = "Mention counts and average sentiment per product", body = Vec<MentionSummary>)
    ),
    tag = "data"
)]
pub async fn mention_summary(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MentionSummary>>, StatusCode> {
    let summary = db::mention_summary(&state.pool).await.map_err(internal_error)?;
    Ok(Json(summary))
}
