//! Test data builders for job definitions

use scheduler_core::models::{JobDefinition, MisfireStrategy, ScheduleKind, TriggerStatus};

/// Builder for creating test `JobDefinition` entities
///
/// Defaults to an enabled FIXED_INTERVAL job firing every 5 seconds
/// with the `noop` handler.
pub struct JobBuilder {
    job: JobDefinition,
}

impl JobBuilder {
    pub fn new(id: i64) -> Self {
        let mut job = JobDefinition::new(id, ScheduleKind::FixedInterval, "5", "noop");
        job.name = format!("test_job_{id}");
        Self { job }
    }

    pub fn fixed_interval(mut self, seconds: u64) -> Self {
        self.job.schedule_kind = ScheduleKind::FixedInterval;
        self.job.schedule_expr = seconds.to_string();
        self
    }

    pub fn cron(mut self, expr: &str) -> Self {
        self.job.schedule_kind = ScheduleKind::Cron;
        self.job.schedule_expr = expr.to_string();
        self
    }

    pub fn without_schedule(mut self) -> Self {
        self.job.schedule_kind = ScheduleKind::None;
        self.job.schedule_expr = String::new();
        self
    }

    pub fn with_schedule_expr(mut self, expr: &str) -> Self {
        self.job.schedule_expr = expr.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.job.name = name.to_string();
        self
    }

    pub fn with_handler(mut self, handler: &str) -> Self {
        self.job.handler = handler.to_string();
        self
    }

    pub fn with_next_fire_time(mut self, next_fire_time: i64) -> Self {
        self.job.next_fire_time = next_fire_time;
        self
    }

    pub fn with_last_fire_time(mut self, last_fire_time: i64) -> Self {
        self.job.last_fire_time = last_fire_time;
        self
    }

    pub fn with_misfire_strategy(mut self, strategy: MisfireStrategy) -> Self {
        self.job.misfire_strategy = Some(strategy);
        self
    }

    pub fn with_param(mut self, param: &str) -> Self {
        self.job.executor_param = Some(param.to_string());
        self
    }

    pub fn with_fail_retry_count(mut self, count: i32) -> Self {
        self.job.fail_retry_count = Some(count);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.job.trigger_status = TriggerStatus::Disabled;
        self
    }

    pub fn build(self) -> JobDefinition {
        self.job
    }
}
