use async_trait::async_trait;
use thiserror::Error;

use oncall_core::domain::{OnCallRecord, UserId};

pub mod memory;
pub mod oncall;

pub use memory::InMemoryOnCallRepository;
pub use oncall::SqlOnCallRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable storage for the on-call roster, keyed by Slack user id.
#[async_trait]
pub trait OnCallRepository: Send + Sync {
    /// Every known record, scheduled or not, ordered by user id.
    async fn find_all(&self) -> Result<Vec<OnCallRecord>, RepositoryError>;

    async fn find_by_user(&self, user_id: &UserId)
        -> Result<Option<OnCallRecord>, RepositoryError>;

    /// Insert-or-replace: an existing row for the same user is overwritten.
    async fn upsert(&self, record: OnCallRecord) -> Result<(), RepositoryError>;

    /// Upsert with both dates null: an existing row keeps its display name
    /// and loses its dates; an absent row is created unscheduled under the
    /// given name.
    async fn reset_dates(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<(), RepositoryError>;
}
