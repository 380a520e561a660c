use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use oncall_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Session pragmas applied to every pooled connection. The roster takes
/// bursts of upserts when the buffer flushes, so WAL plus a busy timeout
/// keeps `view on call` reads from erroring out behind the flush writer.
const SESSION_PRAGMAS: [&str; 3] =
    ["PRAGMA foreign_keys = ON", "PRAGMA journal_mode = WAL", "PRAGMA busy_timeout = 5000"];

/// Opens the roster pool from the loaded configuration. The pool is shared
/// by the webhook handlers, the health probe, and the background flush task.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                for pragma in SESSION_PRAGMAS {
                    sqlx::query(pragma).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(database_url)
        .await
}
