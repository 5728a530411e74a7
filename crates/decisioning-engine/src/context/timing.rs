use chrono::{DateTime, Datelike, Utc};

/// Wall-clock attributes, computed in UTC at the moment of the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimingContext {
    /// Epoch milliseconds.
    pub current_timestamp: i64,
    /// 24-hour `HHmm`.
    pub current_time: String,
    /// 1 = Monday ... 7 = Sunday.
    pub current_day: u32,
}

impl TimingContext {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            current_timestamp: instant.timestamp_millis(),
            current_time: instant.format("%H%M").to_string(),
            current_day: instant.weekday().number_from_monday(),
        }
    }
}
