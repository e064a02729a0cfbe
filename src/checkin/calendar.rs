//! Calendar arithmetic in the user's time zone.
//!
//! A check-in "day" is the local calendar date shifted by a grace window:
//! any local time before `grace_hour` belongs to the previous day. Weekly
//! limits reset at Monday 00:00 local time.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

/// Source of the current time. Injected so tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually driven clock.
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

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
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

/// Parse an IANA zone name, falling back to `fallback` with a warning.
pub fn parse_timezone(name: &str, fallback: Tz) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(timezone = %name, fallback = %fallback, "unknown time zone, using fallback");
            fallback
        }
    }
}

/// The check-in date for `now` in `tz`, applying the grace window.
pub fn checkin_date(now: DateTime<Utc>, tz: Tz, grace_hour: u32) -> NaiveDate {
    let local = now.with_timezone(&tz);
    let date = local.date_naive();
    if local.hour() < grace_hour {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// The instant of the most recent Monday 00:00 local time at or before `now`.
pub fn week_start(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_date = now.with_timezone(&tz).date_naive();
    let monday = local_date - Duration::days(i64::from(local_date.weekday().num_days_from_monday()));
    local_midnight(monday, tz)
}

/// Local midnight of `date` as a UTC instant. A midnight skipped by a DST
/// transition resolves to the first valid local time after it.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut probe = midnight;
    for _ in 0..4 {
        if let Some(resolved) = tz.from_local_datetime(&probe).earliest() {
            return resolved.with_timezone(&Utc);
        }
        probe += Duration::minutes(30);
    }
    Utc.from_utc_datetime(&midnight)
}

/// Whole calendar days from `from` to `to` (negative if `to` is earlier).
pub fn day_gap(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
