use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    #[tokio::test]
    async fn migrations_create_the_roster_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let table_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'on_call'",
        )
        .fetch_one(&pool)
        .await
        .expect("check on_call table")
        .get::<i64, _>("count");
        assert_eq!(table_count, 1, "on_call table should exist after migration");

        let index_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'index' AND name = 'idx_on_call_start_date'",
        )
        .fetch_one(&pool)
        .await
        .expect("check start_date index")
        .get::<i64, _>("count");
        assert_eq!(index_count, 1, "start_date index should exist after migration");
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
