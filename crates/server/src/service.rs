use std::sync::Arc;

use async_trait::async_trait;

use oncall_core::domain::{OnCallRecord, UserId};
use oncall_db::ScheduleWriter;
use oncall_slack::flow::{ScheduleService, ScheduleServiceError};

/// Adapts the write-behind [`ScheduleWriter`] to the persistence seam the
/// scheduling flow expects.
#[derive(Clone)]
pub struct BufferedScheduleService {
    writer: Arc<ScheduleWriter>,
}

impl BufferedScheduleService {
    pub fn new(writer: Arc<ScheduleWriter>) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl ScheduleService for BufferedScheduleService {
    async fn enqueue(&self, record: OnCallRecord) -> Result<(), ScheduleServiceError> {
        self.writer.enqueue(record).await.map_err(|error| ScheduleServiceError(error.to_string()))
    }

    async fn reset(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<(), ScheduleServiceError> {
        self.writer
            .reset(user_id, display_name)
            .await
            .map_err(|error| ScheduleServiceError(error.to_string()))
    }

    async fn visible_records(&self) -> Result<Vec<OnCallRecord>, ScheduleServiceError> {
        self.writer
            .visible_records()
            .await
            .map_err(|error| ScheduleServiceError(error.to_string()))
    }

    async fn record_for(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OnCallRecord>, ScheduleServiceError> {
        self.writer
            .record_for(user_id)
            .await
            .map_err(|error| ScheduleServiceError(error.to_string()))
    }
}
