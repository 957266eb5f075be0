use anyhow::Result;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::db::Database;
use crate::environment::get_env_var_parsed;
use crate::ranking::{Article, RankingEngine, RankingResult, UserPreferences};
use crate::{TARGET_API, TARGET_DB};

/// Request payload for a ranking call.
#[derive(Deserialize)]
pub struct RankingRequest {
    pub articles: Vec<Article>,
    pub user_id: String,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub reading_history: Vec<String>,
}

/// Request payload for a feedback call.
#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub user_id: String,
    pub article_id: String,
    pub reward: f64,
}

/// Acknowledgement for a feedback call. `applied` is false when no bandit
/// state or cached context exists for the user and article.
#[derive(Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
    pub applied: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

/// Main application loop, setting up and running the Axum-based API server.
pub async fn api_loop(engine: Arc<RankingEngine>) -> Result<()> {
    let app = Router::new()
        .route("/rank", post(rank_articles))
        .route("/feedback", post(record_feedback))
        .route("/health", get(health_check))
        .with_state(engine);

    let port: u16 = get_env_var_parsed("PORT", 8000);
    let addr = format!("0.0.0.0:{}", port);

    let listener = TcpListener::bind(&addr).await?;
    info!(target: TARGET_API, "Server running on http://{}", addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Ranks the submitted candidate articles for the requesting user.
async fn rank_articles(
    State(engine): State<Arc<RankingEngine>>,
    Json(request): Json<RankingRequest>,
) -> Result<Json<RankingResult>, StatusCode> {
    info!(
        target: TARGET_API,
        "Ranking {} articles for user {}",
        request.articles.len(),
        request.user_id
    );

    match engine.rank(
        &request.articles,
        &request.user_id,
        &request.preferences,
        &request.reading_history,
    ) {
        Ok(result) => {
            log_ranking(request.user_id, result.clone());
            Ok(Json(result))
        }
        Err(e) => {
            error!(target: TARGET_API, "Error ranking articles for user {}: {}", request.user_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Records user feedback so the bandit can learn from observed rewards.
async fn record_feedback(
    State(engine): State<Arc<RankingEngine>>,
    Json(request): Json<FeedbackRequest>,
) -> Json<FeedbackResponse> {
    let outcome = engine.record_feedback(&request.user_id, &request.article_id, request.reward);
    Json(FeedbackResponse {
        status: "success",
        applied: outcome.applied(),
    })
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Persists a ranking response for transparency, off the request path.
/// Failures are logged and never surfaced to the caller.
fn log_ranking(user_id: String, result: RankingResult) {
    tokio::spawn(async move {
        let db = Database::instance().await;
        if let Err(e) = db.log_ranking(&user_id, &result).await {
            error!(target: TARGET_DB, "Error logging ranking for user {}: {}", user_id, e);
        }
    });
}
