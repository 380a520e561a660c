use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use oncall_core::config::{AppConfig, ConfigError, LoadOptions};
use oncall_core::pending::PendingSelectionStore;
use oncall_db::{connect, migrations, DbPool, ScheduleWriter, SqlOnCallRepository};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub writer: Arc<ScheduleWriter>,
    pub pending: Arc<PendingSelectionStore>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the process together: database pool, migrations, the write-behind
/// buffer, and the pending-selection store. Configuration is assumed to be
/// validated already.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let repository = Arc::new(SqlOnCallRepository::new(db_pool.clone()));
    let writer = Arc::new(ScheduleWriter::new(repository, config.buffer.capacity));
    let pending = Arc::new(PendingSelectionStore::new());

    Ok(Application { config, db_pool, writer, pending })
}

#[cfg(test)]
mod tests {
    use oncall_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, BootstrapError};

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                signing_secret: Some("test-signing-secret".to_string()),
                bot_token: Some("xoxb-test".to_string()),
                directory_token: Some("xoxp-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_connects_and_migrates_an_in_memory_database() {
        let app = bootstrap(memory_options()).await.expect("bootstrap");

        assert_eq!(app.writer.buffered_len().await, 0);
        assert!(app.pending.is_empty());

        let ready: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM on_call")
            .fetch_one(&app.db_pool)
            .await
            .expect("roster table exists");
        assert_eq!(ready, 0);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_slack_secrets() {
        let mut options = memory_options();
        options.overrides.bot_token = Some(String::new());

        let result = bootstrap(options).await;
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }
}
