use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use tracing::debug;

use scheduler_core::{
    models::{JobDefinition, ScheduleKind},
    SchedulerError, SchedulerResult,
};

/// 下次触发时间计算器
///
/// 无副作用。CRON 使用 `cron` crate 语法（秒在首位）按 UTC 计算，
/// FIXED_INTERVAL 的表达式是正整数秒数，NONE 没有下次触发时间。
#[derive(Debug, Default, Clone, Copy)]
pub struct NextFireTimeCalculator;

impl NextFireTimeCalculator {
    pub fn new() -> Self {
        Self
    }

    /// 计算严格晚于 `from_ms` 的下一次触发时间（epoch毫秒）
    pub fn compute(&self, job: &JobDefinition, from_ms: i64) -> SchedulerResult<Option<i64>> {
        match job.schedule_kind {
            ScheduleKind::Cron => {
                let schedule = parse_cron(&job.schedule_expr)?;
                let from = DateTime::<Utc>::from_timestamp_millis(from_ms).ok_or_else(|| {
                    SchedulerError::schedule_expression(
                        ScheduleKind::Cron.as_str(),
                        &job.schedule_expr,
                        format!("起始时间超出范围: {from_ms}"),
                    )
                })?;
                let next = schedule.after(&from).next().ok_or_else(|| {
                    SchedulerError::schedule_expression(
                        ScheduleKind::Cron.as_str(),
                        &job.schedule_expr,
                        "没有后续触发时间",
                    )
                })?;
                debug!("任务 {} 下次触发时间: {}", job.id, next.format("%Y-%m-%d %H:%M:%S UTC"));
                Ok(Some(next.timestamp_millis()))
            }
            ScheduleKind::FixedInterval => {
                let seconds = parse_interval(&job.schedule_expr)?;
                let next = seconds
                    .checked_mul(1000)
                    .and_then(|ms| from_ms.checked_add(ms))
                    .ok_or_else(|| {
                        SchedulerError::schedule_expression(
                            ScheduleKind::FixedInterval.as_str(),
                            &job.schedule_expr,
                            "下次触发时间溢出",
                        )
                    })?;
                Ok(Some(next))
            }
            ScheduleKind::None => Ok(None),
        }
    }

    /// 校验调度表达式
    pub fn validate(kind: ScheduleKind, expr: &str) -> SchedulerResult<()> {
        match kind {
            ScheduleKind::Cron => parse_cron(expr).map(|_| ()),
            ScheduleKind::FixedInterval => parse_interval(expr).map(|_| ()),
            ScheduleKind::None => Ok(()),
        }
    }

    /// 从指定时间开始的多个触发时间
    pub fn upcoming(&self, job: &JobDefinition, from_ms: i64, count: usize) -> SchedulerResult<Vec<i64>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = from_ms;
        while times.len() < count {
            match self.compute(job, cursor)? {
                Some(next) => {
                    times.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        Ok(times)
    }
}

fn parse_cron(expr: &str) -> SchedulerResult<Schedule> {
    Schedule::from_str(expr.trim()).map_err(|e| {
        SchedulerError::schedule_expression(ScheduleKind::Cron.as_str(), expr, e.to_string())
    })
}

fn parse_interval(expr: &str) -> SchedulerResult<i64> {
    let invalid = |message: String| {
        SchedulerError::schedule_expression(ScheduleKind::FixedInterval.as_str(), expr, message)
    };
    let seconds: i64 = expr
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?;
    if seconds <= 0 {
        return Err(invalid("间隔秒数必须大于0".to_string()));
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(kind: ScheduleKind, expr: &str) -> JobDefinition {
        JobDefinition::new(1, kind, expr, "noop")
    }

    #[test]
    fn test_fixed_interval() {
        let calc = NextFireTimeCalculator::new();
        let next = calc
            .compute(&job(ScheduleKind::FixedInterval, "5"), 1_000_000)
            .unwrap();
        assert_eq!(next, Some(1_005_000));
    }

    #[test]
    fn test_invalid_fixed_interval() {
        let calc = NextFireTimeCalculator::new();
        for expr in ["0", "-3", "abc", ""] {
            let result = calc.compute(&job(ScheduleKind::FixedInterval, expr), 0);
            assert!(
                matches!(result, Err(SchedulerError::ScheduleExpression { .. })),
                "expr {expr:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_cron_strictly_after() {
        let calc = NextFireTimeCalculator::new();
        let every_ten = job(ScheduleKind::Cron, "0/10 * * * * *");

        // 2023-11-14T22:14:00Z
        let minute = 1_700_000_040_000;
        assert_eq!(calc.compute(&every_ten, minute).unwrap(), Some(minute + 10_000));
        assert_eq!(calc.compute(&every_ten, minute + 500).unwrap(), Some(minute + 10_000));
        assert_eq!(calc.compute(&every_ten, minute - 1_000).unwrap(), Some(minute));
    }

    #[test]
    fn test_invalid_cron() {
        let calc = NextFireTimeCalculator::new();
        let result = calc.compute(&job(ScheduleKind::Cron, "not a cron"), 0);
        assert!(matches!(result, Err(SchedulerError::ScheduleExpression { .. })));
        assert!(NextFireTimeCalculator::validate(ScheduleKind::Cron, "* * *").is_err());
        assert!(NextFireTimeCalculator::validate(ScheduleKind::Cron, "0 * * * * *").is_ok());
    }

    #[test]
    fn test_cron_without_future_occurrence() {
        let calc = NextFireTimeCalculator::new();
        let past_year = job(ScheduleKind::Cron, "0 0 0 1 1 * 2020");
        let result = calc.compute(&past_year, 1_700_000_040_000);
        assert!(matches!(result, Err(SchedulerError::ScheduleExpression { .. })));
    }

    #[test]
    fn test_none_has_no_next() {
        let calc = NextFireTimeCalculator::new();
        assert_eq!(calc.compute(&job(ScheduleKind::None, ""), 42).unwrap(), None);
    }

    #[test]
    fn test_upcoming() {
        let calc = NextFireTimeCalculator::new();
        let times = calc
            .upcoming(&job(ScheduleKind::FixedInterval, "2"), 0, 3)
            .unwrap();
        assert_eq!(times, vec![2_000, 4_000, 6_000]);
        assert!(calc.upcoming(&job(ScheduleKind::None, ""), 0, 3).unwrap().is_empty());
    }
}
