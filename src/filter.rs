//! Freshness and duplicate rules deciding whether a candidate is published.

use crate::models::{NewsItem, PublicationRecord};
use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: i64 = 86_400;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outcome of evaluating one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Stale { age_days: i64 },
    Duplicate,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NoveltyFilter {
    threshold_days: i64,
}

impl NoveltyFilter {
    pub fn new(threshold_days: i64) -> Self {
        Self { threshold_days }
    }

    /// Accept iff the item is younger than the threshold and is not the
    /// previously published item.
    pub fn evaluate(
        &self,
        item: &NewsItem,
        persisted: Option<&PublicationRecord>,
        now: DateTime<Utc>,
    ) -> Verdict {
        let age_days = age_in_days(item, now);
        if age_days >= self.threshold_days {
            return Verdict::Stale { age_days };
        }
        match persisted {
            Some(record) if record.guid == item.guid => Verdict::Duplicate,
            _ => Verdict::Accept,
        }
    }
}

/// Whole days elapsed since publication, rounded down.
pub fn age_in_days(item: &NewsItem, now: DateTime<Utc>) -> i64 {
    let elapsed = now.signed_duration_since(item.published_at.with_timezone(&Utc));
    elapsed.num_seconds().div_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock(pub DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }
}
