use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

pub const ONE_DAY_IN_MILLISECONDS: i64 = 86_400_000;

/// Whole 24-hour periods from `start` to `end`, floored.
///
/// Returns 0 when either side is missing so a prediction pass over a
/// malformed record degrades instead of failing.
pub fn days_between(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> i64 {
    match (start, end) {
        (Some(start), Some(end)) => {
            (end - start).num_milliseconds().div_euclid(ONE_DAY_IN_MILLISECONDS)
        }
        _ => 0,
    }
}

/// `base` moved `offset_days` days forward. Non-finite offsets count as 0.
pub fn add_days(base: DateTime<Utc>, offset_days: f64) -> DateTime<Utc> {
    let offset = if offset_days.is_finite() { offset_days } else { 0.0 };
    let millis = (offset * ONE_DAY_IN_MILLISECONDS as f64).round() as i64;
    Duration::try_milliseconds(millis)
        .and_then(|delta| base.checked_add_signed(delta))
        .unwrap_or(base)
}

/// Source of "now" for classification and estimation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance_days(&self, days: f64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = add_days(*guard, days);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
