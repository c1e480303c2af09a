//! Maps user retention preferences to cache TTLs.

use crate::types::{Retention, RetentionUnit};
use chrono::{DateTime, Utc};

pub const MIN_RETENTION_HOURS: i64 = 1;
pub const MAX_RETENTION_HOURS: i64 = 168;
pub const MIN_RETENTION_DAYS: i64 = 1;
pub const MAX_RETENTION_DAYS: i64 = 7;

const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_DAY: u64 = 86_400;

/// Out-of-range retention values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    default_ttl_secs: u64,
}

impl RetentionPolicy {
    pub fn new(default_ttl_secs: u64) -> Self {
        Self { default_ttl_secs }
    }

    pub fn from_hours(default_hours: u64) -> Self {
        Self::new(default_hours * SECS_PER_HOUR)
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    pub fn ttl_seconds(&self, retention: Option<Retention>) -> u64 {
        match retention {
            None => self.default_ttl_secs,
            Some(Retention {
                value,
                unit: RetentionUnit::Hour,
            }) => value.clamp(MIN_RETENTION_HOURS, MAX_RETENTION_HOURS) as u64 * SECS_PER_HOUR,
            Some(Retention {
                value,
                unit: RetentionUnit::Day,
            }) => value.clamp(MIN_RETENTION_DAYS, MAX_RETENTION_DAYS) as u64 * SECS_PER_DAY,
        }
    }

    pub fn is_valid(&self, last_updated: DateTime<Utc>, retention: Option<Retention>) -> bool {
        self.is_valid_at(Utc::now(), last_updated, retention)
    }

    pub fn is_valid_at(
        &self,
        now: DateTime<Utc>,
        last_updated: DateTime<Utc>,
        retention: Option<Retention>,
    ) -> bool {
        // A timestamp from the future counts as age zero.
        let age_secs = (now - last_updated).num_seconds().max(0) as u64;
        age_secs < self.ttl_seconds(retention)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_hours(2)
    }
}
