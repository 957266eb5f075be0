use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use newsrank::api::api_loop;
use newsrank::bandit::CapacityPolicy;
use newsrank::db::Database;
use newsrank::environment::get_env_var_parsed;
use newsrank::logging::configure_logging;
use newsrank::ranking::RankingEngine;

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    // Open the ranking log store up front so a misconfigured database path
    // fails at startup rather than on the first request.
    Database::instance().await;

    let alpha: f64 = get_env_var_parsed("BANDIT_ALPHA", 1.0);
    let policy = match get_env_var_parsed("MAX_BANDIT_USERS", 0usize) {
        0 => CapacityPolicy::Unbounded,
        max => CapacityPolicy::MaxUsers(max),
    };

    let engine = Arc::new(RankingEngine::new(alpha, policy));

    info!("Starting news ranking service");
    api_loop(engine).await
}
