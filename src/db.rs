use anyhow::Result;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Pool, Sqlite,
};
use std::str::FromStr;
use tokio::sync::OnceCell;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::environment::get_env_var_or;
use crate::ranking::RankingResult;
use crate::TARGET_DB;

/// How long ranking log rows are retained, in seconds (7 days).
const LOG_RETENTION_SECS: i64 = 604_800;

/// Sqlite-backed store for the per-request ranking log.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Get access to the database pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        info!(target: TARGET_DB, "Creating database pool for: {}", database_url);

        let connect_options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", database_url))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5))
                .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;

        info!(target: TARGET_DB, "Database pool created");

        let db = Database { pool };
        db.initialize_schema().await?;

        Ok(db)
    }

    pub async fn instance() -> &'static Database {
        static INSTANCE: OnceCell<Database> = OnceCell::const_new();

        INSTANCE
            .get_or_init(|| async {
                let database_url = get_env_var_or("DATABASE_PATH", "newsrank.db");
                Database::new(&database_url)
                    .await
                    .expect("Failed to initialize database")
            })
            .await
    }

    async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ranking_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                logged_at TEXT NOT NULL,
                logged_at_unix INTEGER NOT NULL,
                ranking TEXT NOT NULL,
                explanation TEXT NOT NULL,
                diversity_score REAL NOT NULL,
                novelty_score REAL NOT NULL,
                freshness_score REAL NOT NULL
            )
            "#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ranking_logs_user_time
             ON ranking_logs (user_id, logged_at_unix)",
        )
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Persists one ranking response, keyed by user id and timestamp, and
    /// opportunistically purges rows past the retention window.
    pub async fn log_ranking(&self, user_id: &str, result: &RankingResult) -> Result<()> {
        let now = Utc::now();
        let ranking = serde_json::to_string(&result.ranked_articles)?;

        sqlx::query(
            r#"
            INSERT INTO ranking_logs
                (user_id, logged_at, logged_at_unix, ranking, explanation,
                 diversity_score, novelty_score, freshness_score)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(now.to_rfc3339())
        .bind(now.timestamp())
        .bind(ranking)
        .bind(&result.ranking_explanation)
        .bind(result.diversity_score)
        .bind(result.novelty_score)
        .bind(result.freshness_score)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Logged ranking for user {}", user_id);

        self.purge_expired().await?;

        Ok(())
    }

    /// Deletes ranking log rows older than the retention window.
    pub async fn purge_expired(&self) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - LOG_RETENTION_SECS;
        let deleted = sqlx::query("DELETE FROM ranking_logs WHERE logged_at_unix < ?")
            .bind(cutoff)
            .execute(self.pool())
            .await?
            .rows_affected();

        if deleted > 0 {
            debug!(target: TARGET_DB, "Purged {} expired ranking log rows", deleted);
        }

        Ok(deleted)
    }
}
