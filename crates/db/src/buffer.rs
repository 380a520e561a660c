use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use oncall_core::domain::{OnCallRecord, UserId};

use crate::repositories::{OnCallRepository, RepositoryError};

/// Write-behind buffer in front of the roster repository.
///
/// Records accumulate in memory and reach the database when the buffer
/// fills, when the periodic flush fires, or when a read needs a current
/// view. At most one buffered record per user: a newer enqueue for the
/// same user replaces the older one before it is ever written.
pub struct ScheduleWriter {
    repository: Arc<dyn OnCallRepository>,
    capacity: usize,
    buffer: Mutex<Vec<OnCallRecord>>,
}

impl ScheduleWriter {
    pub fn new(repository: Arc<dyn OnCallRepository>, capacity: usize) -> Self {
        Self { repository, capacity: capacity.max(1), buffer: Mutex::new(Vec::new()) }
    }

    /// Buffer a record for eventual persistence. If the buffer is already at
    /// capacity after deduplication, it is flushed first; a failed flush
    /// propagates and the new record is NOT appended, so the caller can
    /// surface the failure instead of silently growing the backlog.
    pub async fn enqueue(&self, record: OnCallRecord) -> Result<(), RepositoryError> {
        let mut buffer = self.buffer.lock().await;
        buffer.retain(|buffered| buffered.user_id != record.user_id);

        if buffer.len() >= self.capacity {
            self.flush_locked(&mut buffer).await?;
        }

        buffer.push(record);
        debug!(buffered = buffer.len(), capacity = self.capacity, "record buffered");
        Ok(())
    }

    /// Write every buffered record through to the repository. All-or-nothing:
    /// on any failure the whole buffer is retained for the next attempt,
    /// which is safe because upserts are idempotent.
    pub async fn flush(&self) -> Result<(), RepositoryError> {
        let mut buffer = self.buffer.lock().await;
        self.flush_locked(&mut buffer).await
    }

    async fn flush_locked(&self, buffer: &mut Vec<OnCallRecord>) -> Result<(), RepositoryError> {
        if buffer.is_empty() {
            return Ok(());
        }

        for record in buffer.iter() {
            self.repository.upsert(record.clone()).await?;
        }

        debug!(flushed = buffer.len(), "buffer flushed");
        buffer.clear();
        Ok(())
    }

    /// Immediate reset, bypassing the buffer: any not-yet-written entry for
    /// the user is dropped so a later flush cannot resurrect the old range,
    /// then an unscheduled row is written through.
    pub async fn reset(
        &self,
        user_id: &UserId,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        {
            let mut buffer = self.buffer.lock().await;
            buffer.retain(|buffered| &buffered.user_id != user_id);
        }

        self.repository.reset_dates(user_id, display_name).await
    }

    /// A read-your-writes view of the roster: flush, then read everything.
    pub async fn visible_records(&self) -> Result<Vec<OnCallRecord>, RepositoryError> {
        self.flush().await?;
        self.repository.find_all().await
    }

    /// Current record for one user, buffered writes included.
    pub async fn record_for(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OnCallRecord>, RepositoryError> {
        self.flush().await?;
        self.repository.find_by_user(user_id).await
    }

    pub async fn buffered_len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Background task that flushes on a fixed period so buffered records
    /// never wait longer than `period` to become durable. Flush failures are
    /// logged and retried on the next tick.
    pub fn spawn_scheduled_flush(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let writer = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately; skip it so startup does not
            // race the migration runner.
            interval.tick().await;

            loop {
                interval.tick().await;
                if let Err(error) = writer.flush().await {
                    warn!(error = %error, "scheduled flush failed, will retry next tick");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use oncall_core::date::CalendarDate;
    use oncall_core::domain::{OnCallRecord, UserId};

    use super::ScheduleWriter;
    use crate::repositories::{InMemoryOnCallRepository, OnCallRepository, RepositoryError};

    fn record(user_id: &str, start: &str, end: &str) -> OnCallRecord {
        OnCallRecord::scheduled(
            user_id,
            user_id.to_lowercase(),
            CalendarDate::parse(start).expect("start"),
            CalendarDate::parse(end).expect("end"),
        )
    }

    /// Repository that fails every write while `failing` is set.
    struct FlakyRepository {
        inner: InMemoryOnCallRepository,
        failing: AtomicBool,
    }

    impl FlakyRepository {
        fn new() -> Self {
            Self { inner: InMemoryOnCallRepository::default(), failing: AtomicBool::new(false) }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl OnCallRepository for FlakyRepository {
        async fn find_all(&self) -> Result<Vec<OnCallRecord>, RepositoryError> {
            self.inner.find_all().await
        }

        async fn find_by_user(
            &self,
            user_id: &UserId,
        ) -> Result<Option<OnCallRecord>, RepositoryError> {
            self.inner.find_by_user(user_id).await
        }

        async fn upsert(&self, record: OnCallRecord) -> Result<(), RepositoryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RepositoryError::Decode("simulated write failure".to_string()));
            }
            self.inner.upsert(record).await
        }

        async fn reset_dates(
            &self,
            user_id: &UserId,
            display_name: &str,
        ) -> Result<(), RepositoryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RepositoryError::Decode("simulated write failure".to_string()));
            }
            self.inner.reset_dates(user_id, display_name).await
        }
    }

    #[tokio::test]
    async fn records_stay_buffered_below_capacity() {
        let repository = Arc::new(InMemoryOnCallRepository::default());
        let writer = ScheduleWriter::new(repository.clone(), 3);

        writer.enqueue(record("U1", "2024-03-01", "2024-03-10")).await.expect("enqueue");
        writer.enqueue(record("U2", "2024-04-01", "2024-04-05")).await.expect("enqueue");

        assert_eq!(writer.buffered_len().await, 2);
        assert!(repository.find_all().await.expect("find all").is_empty());
    }

    #[tokio::test]
    async fn reaching_capacity_flushes_before_accepting_the_new_record() {
        let repository = Arc::new(InMemoryOnCallRepository::default());
        let writer = ScheduleWriter::new(repository.clone(), 2);

        writer.enqueue(record("U1", "2024-03-01", "2024-03-10")).await.expect("enqueue");
        writer.enqueue(record("U2", "2024-04-01", "2024-04-05")).await.expect("enqueue");
        writer.enqueue(record("U3", "2024-05-01", "2024-05-03")).await.expect("enqueue");

        // U1 and U2 were flushed to make room; U3 is still buffered.
        assert_eq!(writer.buffered_len().await, 1);
        assert_eq!(repository.find_all().await.expect("find all").len(), 2);
    }

    #[tokio::test]
    async fn newer_enqueue_for_the_same_user_replaces_the_buffered_one() {
        let repository = Arc::new(InMemoryOnCallRepository::default());
        let writer = ScheduleWriter::new(repository.clone(), 3);

        writer.enqueue(record("U1", "2024-03-01", "2024-03-10")).await.expect("enqueue");
        writer.enqueue(record("U1", "2024-06-01", "2024-06-07")).await.expect("enqueue");

        assert_eq!(writer.buffered_len().await, 1);
        writer.flush().await.expect("flush");

        let stored = repository
            .find_by_user(&UserId::from("U1"))
            .await
            .expect("find")
            .expect("present");
        assert_eq!(stored.start_date.as_ref().map(|d| d.to_string()).as_deref(), Some("2024-06-01"));
    }

    #[tokio::test]
    async fn failed_flush_keeps_the_whole_buffer_for_retry() {
        let repository = Arc::new(FlakyRepository::new());
        let writer = ScheduleWriter::new(repository.clone(), 3);

        writer.enqueue(record("U1", "2024-03-01", "2024-03-10")).await.expect("enqueue");
        writer.enqueue(record("U2", "2024-04-01", "2024-04-05")).await.expect("enqueue");

        repository.set_failing(true);
        assert!(writer.flush().await.is_err());
        assert_eq!(writer.buffered_len().await, 2, "failed flush must not drop records");

        repository.set_failing(false);
        writer.flush().await.expect("retry succeeds");
        assert_eq!(writer.buffered_len().await, 0);
        assert_eq!(repository.find_all().await.expect("find all").len(), 2);
    }

    #[tokio::test]
    async fn enqueue_propagates_a_failed_capacity_flush_without_appending() {
        let repository = Arc::new(FlakyRepository::new());
        let writer = ScheduleWriter::new(repository.clone(), 1);

        writer.enqueue(record("U1", "2024-03-01", "2024-03-10")).await.expect("enqueue");
        repository.set_failing(true);

        assert!(writer.enqueue(record("U2", "2024-04-01", "2024-04-05")).await.is_err());
        assert_eq!(writer.buffered_len().await, 1, "rejected record must not be buffered");
    }

    #[tokio::test]
    async fn reset_drops_buffered_entries_and_clears_stored_dates() {
        let repository = Arc::new(InMemoryOnCallRepository::default());
        let writer = ScheduleWriter::new(repository.clone(), 3);

        writer.enqueue(record("U1", "2024-03-01", "2024-03-10")).await.expect("enqueue");
        writer.flush().await.expect("flush");
        writer.enqueue(record("U1", "2024-06-01", "2024-06-07")).await.expect("enqueue");

        writer.reset(&UserId::from("U1"), "u1").await.expect("reset");
        assert_eq!(writer.buffered_len().await, 0, "buffered entry must be discarded");

        writer.flush().await.expect("flush after reset");
        let stored = repository
            .find_by_user(&UserId::from("U1"))
            .await
            .expect("find")
            .expect("row kept");
        assert!(!stored.is_scheduled(), "a flush after reset must not resurrect the range");
    }

    #[tokio::test]
    async fn visible_records_flushes_before_reading() {
        let repository = Arc::new(InMemoryOnCallRepository::default());
        let writer = ScheduleWriter::new(repository.clone(), 3);

        writer.enqueue(record("U1", "2024-03-01", "2024-03-10")).await.expect("enqueue");
        let visible = writer.visible_records().await.expect("visible records");

        assert_eq!(visible.len(), 1);
        assert_eq!(writer.buffered_len().await, 0);
    }
}
