use chrono::{NaiveDate, Utc};

/// Source of "today" for every day-boundary truncation: recommendation
/// keys, streak walks, batch sweeps. All dates are UTC days; mixing
/// timezones here would silently break the one-per-day invariant.
pub trait DayClock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct UtcClock;

impl DayClock for UtcClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}
