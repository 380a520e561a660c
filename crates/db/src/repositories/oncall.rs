use sqlx::{sqlite::SqliteRow, Row};

use oncall_core::date::CalendarDate;
use oncall_core::domain::{OnCallRecord, UserId};

use super::{OnCallRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOnCallRepository {
    pool: DbPool,
}

impl SqlOnCallRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OnCallRepository for SqlOnCallRepository {
    async fn find_all(&self) -> Result<Vec<OnCallRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT user_id, display_name, start_date, end_date
             FROM on_call
             ORDER BY user_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OnCallRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_id, display_name, start_date, end_date
             FROM on_call
             WHERE user_id = ?",
        )
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn upsert(&self, record: OnCallRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO on_call (user_id, display_name, start_date, end_date, updated_at)
             VALUES (?, ?, ?, ?, datetime('now'))
             ON CONFLICT(user_id) DO UPDATE SET
                 display_name = excluded.display_name,
                 start_date = excluded.start_date,
                 end_date = excluded.end_date,
                 updated_at = excluded.updated_at",
        )
        .bind(&record.user_id.0)
        .bind(&record.display_name)
        .bind(record.start_date.as_ref().map(|date| date.to_string()))
        .bind(record.end_date.as_ref().map(|date| date.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reset_dates(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO on_call (user_id, display_name, start_date, end_date, updated_at)
             VALUES (?, ?, NULL, NULL, datetime('now'))
             ON CONFLICT(user_id) DO UPDATE SET
                 start_date = NULL,
                 end_date = NULL,
                 updated_at = excluded.updated_at",
        )
        .bind(&user_id.0)
        .bind(display_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn record_from_row(row: SqliteRow) -> Result<OnCallRecord, RepositoryError> {
    let user_id: String = row.try_get("user_id")?;
    let display_name: String = row.try_get("display_name")?;
    let start_date = decode_date(row.try_get::<Option<String>, _>("start_date")?)?;
    let end_date = decode_date(row.try_get::<Option<String>, _>("end_date")?)?;

    Ok(OnCallRecord { user_id: UserId(user_id), display_name, start_date, end_date })
}

fn decode_date(stored: Option<String>) -> Result<Option<CalendarDate>, RepositoryError> {
    stored
        .map(|text| {
            CalendarDate::parse(&text)
                .map_err(|err| RepositoryError::Decode(format!("stored date `{text}`: {err}")))
        })
        .transpose()
}
