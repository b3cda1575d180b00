//! Test doubles for the engine's collaborator traits
//!
//! These are hand-written in-memory implementations that record what the
//! engine asked of them, so assertions can be made without a real store
//! or real handlers.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use scheduler_core::{
    models::{ExecutionLogDetail, ExecutionLogEntry, JobDefinition, TriggerRequest},
    traits::{JobContext, JobHandler, JobStore, TriggerDispatcher},
    Clock, SchedulerError, SchedulerResult,
};

/// Clock whose time only moves when the test says so
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A dispatched request together with the clock reading at submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub at_ms: i64,
    pub request: TriggerRequest,
}

/// Dispatcher that records every submitted request instead of executing it
#[derive(Clone)]
pub struct RecordingDispatcher {
    clock: Arc<dyn Clock>,
    records: Arc<Mutex<Vec<DispatchRecord>>>,
}

impl RecordingDispatcher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn records(&self) -> Vec<DispatchRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn records_for(&self, job_id: i64) -> Vec<DispatchRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.request.job_id == job_id)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }
}

#[async_trait]
impl TriggerDispatcher for RecordingDispatcher {
    async fn submit(&self, request: TriggerRequest) -> SchedulerResult<()> {
        let at_ms = self.clock.now_millis();
        self.records
            .lock()
            .unwrap()
            .push(DispatchRecord { at_ms, request });
        Ok(())
    }
}

/// Job store wrapper whose `query_due` fails a configurable number of times
pub struct FlakyJobStore {
    inner: Arc<dyn JobStore>,
    remaining_failures: AtomicUsize,
    query_calls: AtomicUsize,
}

impl FlakyJobStore {
    pub fn new(inner: Arc<dyn JobStore>, failures: usize) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(failures),
            query_calls: AtomicUsize::new(0),
        }
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn load_by_id(&self, id: i64) -> SchedulerResult<Option<JobDefinition>> {
        self.inner.load_by_id(id).await
    }

    async fn load_by_name(&self, name: &str) -> SchedulerResult<Option<JobDefinition>> {
        self.inner.load_by_name(name).await
    }

    async fn query_all(&self) -> SchedulerResult<Vec<JobDefinition>> {
        self.inner.query_all().await
    }

    async fn query_by_handler(&self, handler: &str) -> SchedulerResult<Vec<JobDefinition>> {
        self.inner.query_by_handler(handler).await
    }

    async fn query_due(
        &self,
        before_epoch_ms: i64,
        limit: usize,
    ) -> SchedulerResult<Vec<JobDefinition>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SchedulerError::Store("simulated store outage".to_string()));
        }
        self.inner.query_due(before_epoch_ms, limit).await
    }

    async fn insert(&self, job: &JobDefinition) -> SchedulerResult<i64> {
        self.inner.insert(job).await
    }

    async fn update(&self, job: &JobDefinition) -> SchedulerResult<()> {
        self.inner.update(job).await
    }

    async fn delete(&self, id: i64) -> SchedulerResult<bool> {
        self.inner.delete(id).await
    }

    async fn batch_update_trigger_info(&self, jobs: &[JobDefinition]) -> SchedulerResult<()> {
        self.inner.batch_update_trigger_info(jobs).await
    }

    async fn insert_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<i64> {
        self.inner.insert_log(entry).await
    }

    async fn update_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<()> {
        self.inner.update_log(entry).await
    }

    async fn insert_log_detail(&self, detail: &ExecutionLogDetail) -> SchedulerResult<i64> {
        self.inner.insert_log_detail(detail).await
    }
}

/// Job store wrapper that parks the first `query_due` call until released
///
/// Lets a test hold a scan cycle between its pre-read and its write-back
/// and run something else in that gap.
pub struct GatedJobStore {
    inner: Arc<dyn JobStore>,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedJobStore {
    pub fn new(inner: Arc<dyn JobStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Waits until a scan has completed its pre-read and is parked
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// Lets the parked scan continue
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl JobStore for GatedJobStore {
    async fn load_by_id(&self, id: i64) -> SchedulerResult<Option<JobDefinition>> {
        self.inner.load_by_id(id).await
    }

    async fn load_by_name(&self, name: &str) -> SchedulerResult<Option<JobDefinition>> {
        self.inner.load_by_name(name).await
    }

    async fn query_all(&self) -> SchedulerResult<Vec<JobDefinition>> {
        self.inner.query_all().await
    }

    async fn query_by_handler(&self, handler: &str) -> SchedulerResult<Vec<JobDefinition>> {
        self.inner.query_by_handler(handler).await
    }

    async fn query_due(
        &self,
        before_epoch_ms: i64,
        limit: usize,
    ) -> SchedulerResult<Vec<JobDefinition>> {
        let jobs = self.inner.query_due(before_epoch_ms, limit).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(jobs)
    }

    async fn insert(&self, job: &JobDefinition) -> SchedulerResult<i64> {
        self.inner.insert(job).await
    }

    async fn update(&self, job: &JobDefinition) -> SchedulerResult<()> {
        self.inner.update(job).await
    }

    async fn delete(&self, id: i64) -> SchedulerResult<bool> {
        self.inner.delete(id).await
    }

    async fn batch_update_trigger_info(&self, jobs: &[JobDefinition]) -> SchedulerResult<()> {
        self.inner.batch_update_trigger_info(jobs).await
    }

    async fn insert_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<i64> {
        self.inner.insert_log(entry).await
    }

    async fn update_log(&self, entry: &ExecutionLogEntry) -> SchedulerResult<()> {
        self.inner.update_log(entry).await
    }

    async fn insert_log_detail(&self, detail: &ExecutionLogDetail) -> SchedulerResult<i64> {
        self.inner.insert_log_detail(detail).await
    }
}

/// Handler that counts invocations and keeps the contexts it saw
#[derive(Clone, Default)]
pub struct CountingHandler {
    contexts: Arc<Mutex<Vec<JobContext>>>,
}

impl CountingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }

    pub fn contexts(&self) -> Vec<JobContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobHandler for CountingHandler {
    async fn execute(&self, context: &JobContext) -> SchedulerResult<()> {
        self.contexts.lock().unwrap().push(context.clone());
        Ok(())
    }
}

/// Handler that sleeps on tokio time before succeeding
#[derive(Debug, Clone)]
pub struct SleepingHandler {
    duration: Duration,
}

impl SleepingHandler {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl JobHandler for SleepingHandler {
    async fn execute(&self, _context: &JobContext) -> SchedulerResult<()> {
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// Handler that always returns an execution error
#[derive(Debug, Clone)]
pub struct FailingHandler(pub &'static str);

#[async_trait]
impl JobHandler for FailingHandler {
    async fn execute(&self, _context: &JobContext) -> SchedulerResult<()> {
        Err(SchedulerError::HandlerExecution(self.0.to_string()))
    }
}

/// Handler that panics with the given message
#[derive(Debug, Clone)]
pub struct PanickingHandler(pub &'static str);

#[async_trait]
impl JobHandler for PanickingHandler {
    async fn execute(&self, _context: &JobContext) -> SchedulerResult<()> {
        panic!("{}", self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.advance(500), 1_500);
        assert_eq!(clock.now_millis(), 1_500);
        clock.set(10);
        assert_eq!(clock.now_millis(), 10);
    }

    #[tokio::test]
    async fn test_recording_dispatcher_stamps_clock() {
        let clock = ManualClock::new(2_000);
        let dispatcher = RecordingDispatcher::new(Arc::new(clock.clone()));

        dispatcher.submit(TriggerRequest::cron(1)).await.unwrap();
        clock.advance(1_000);
        dispatcher.submit(TriggerRequest::misfire(2)).await.unwrap();

        let records = dispatcher.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].at_ms, 2_000);
        assert_eq!(records[1].at_ms, 3_000);
        assert_eq!(dispatcher.records_for(2).len(), 1);
    }
}
