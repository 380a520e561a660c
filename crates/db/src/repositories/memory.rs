use std::collections::HashMap;

use tokio::sync::RwLock;

use oncall_core::domain::{OnCallRecord, UserId};

use super::{OnCallRepository, RepositoryError};

/// Test double backed by a map, same upsert semantics as the SQL repository.
#[derive(Default)]
pub struct InMemoryOnCallRepository {
    records: RwLock<HashMap<UserId, OnCallRecord>>,
}

#[async_trait::async_trait]
impl OnCallRepository for InMemoryOnCallRepository {
    async fn find_all(&self) -> Result<Vec<OnCallRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut all: Vec<OnCallRecord> = records.values().cloned().collect();
        all.sort_by(|left, right| left.user_id.0.cmp(&right.user_id.0));
        Ok(all)
    }

    async fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OnCallRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(user_id).cloned())
    }

    async fn upsert(&self, record: OnCallRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.user_id.clone(), record);
        Ok(())
    }

    async fn reset_dates(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let record = records
            .entry(user_id.clone())
            .or_insert_with(|| OnCallRecord::unscheduled(user_id.0.clone(), display_name));
        record.start_date = None;
        record.end_date = None;
        Ok(())
    }
}
