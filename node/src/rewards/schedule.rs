//! Fixed daily distribution instants.
//!
//! Distributions fire once a day at a fixed UTC time-of-day. A period runs
//! from one distribution instant up to (not including) the next.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DistributionSchedule {
    time_of_day: NaiveTime,
}

impl DistributionSchedule {
    pub fn new(time_of_day: NaiveTime) -> Self {
        Self { time_of_day }
    }

    /// `None` for an out-of-range hour or minute.
    pub fn daily_at(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self::new)
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.time_of_day
    }

    fn on(&self, date: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date.and_time(self.time_of_day))
    }

    /// The first distribution instant strictly after `now`: today's if it
    /// has not been reached yet, otherwise tomorrow's.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.on(now.date_naive());
        if now < today {
            today
        } else {
            today + Duration::days(1)
        }
    }

    /// The most recent distribution instant at or before `now`; the start
    /// of the period `now` belongs to.
    pub fn period_start_for(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.on(now.date_naive());
        if now >= today {
            today
        } else {
            today - Duration::days(1)
        }
    }

    /// Every distribution instant in `(last, now]`.
    pub fn missed_since(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut missed = Vec::new();
        let mut at = self.next_after(last);
        while at <= now {
            missed.push(at);
            at += Duration::days(1);
        }
        missed
    }
}

impl Default for DistributionSchedule {
    /// 06:30 UTC.
    fn default() -> Self {
        Self::new(NaiveTime::from_hms_opt(6, 30, 0).unwrap_or(NaiveTime::MIN))
    }
}
