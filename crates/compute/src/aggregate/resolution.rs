use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Resolution {
    /// Pick a bucket width from the length of the queried span.
    ///
    /// | whole days | resolution |
    /// |---|---|
    /// | < 30 | hourly |
    /// | 30..365 | daily |
    /// | 365..=3650 | weekly |
    /// | > 3650 | monthly |
    pub fn for_span(span: Duration) -> Self {
        let days = span.num_days();
        if days < 30 {
            Resolution::Hourly
        } else if days < 365 {
            Resolution::Daily
        } else if days <= 3650 {
            Resolution::Weekly
        } else {
            Resolution::Monthly
        }
    }

    /// Hourly and daily series are zero-filled; weekly and monthly are sparse.
    pub fn is_dense(self) -> bool {
        matches!(self, Resolution::Hourly | Resolution::Daily)
    }

    /// Nominal bucket width.
    pub fn step(self) -> Duration {
        match self {
            Resolution::Hourly => Duration::hours(1),
            Resolution::Daily => Duration::days(1),
            Resolution::Weekly => Duration::weeks(1),
            Resolution::Monthly => Duration::days(30),
        }
    }

    /// Start of the bucket containing `ts`.
    ///
    /// Weeks start on Monday; months on the 1st. All boundaries are UTC.
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Resolution::Hourly => ts
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap_or(ts),
            Resolution::Daily => midnight(ts.date_naive()),
            Resolution::Weekly => {
                let date = ts.date_naive();
                let offset = date.weekday().num_days_from_monday() as i64;
                midnight(date - Duration::days(offset))
            }
            Resolution::Monthly => {
                let date = ts.date_naive();
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
                    .map(midnight)
                    .unwrap_or(ts)
            }
        }
    }

    /// Start of the bucket following the one starting at `bucket_start`.
    pub fn next(self, bucket_start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Resolution::Monthly => {
                let date = bucket_start.date_naive();
                let (year, month) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(year, month, 1)
                    .map(midnight)
                    .unwrap_or(bucket_start + self.step())
            }
            _ => bucket_start + self.step(),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Hourly => write!(f, "hourly"),
            Resolution::Daily => write!(f, "daily"),
            Resolution::Weekly => write!(f, "weekly"),
            Resolution::Monthly => write!(f, "monthly"),
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn span_thresholds() {
        assert_eq!(Resolution::for_span(Duration::days(29)), Resolution::Hourly);
        assert_eq!(Resolution::for_span(Duration::days(30)), Resolution::Daily);
        assert_eq!(Resolution::for_span(Duration::days(364)), Resolution::Daily);
        assert_eq!(Resolution::for_span(Duration::days(365)), Resolution::Weekly);
        assert_eq!(Resolution::for_span(Duration::days(3650)), Resolution::Weekly);
        assert_eq!(Resolution::for_span(Duration::days(3651)), Resolution::Monthly);
    }

    #[test]
    fn truncation() {
        let ts = at(2024, 3, 14, 15, 42); // a Thursday
        assert_eq!(Resolution::Hourly.truncate(ts), at(2024, 3, 14, 15, 0));
        assert_eq!(Resolution::Daily.truncate(ts), at(2024, 3, 14, 0, 0));
        assert_eq!(Resolution::Weekly.truncate(ts), at(2024, 3, 11, 0, 0));
        assert_eq!(Resolution::Monthly.truncate(ts), at(2024, 3, 1, 0, 0));
    }

    #[test]
    fn monthly_next_rolls_year() {
        assert_eq!(Resolution::Monthly.next(at(2023, 12, 1, 0, 0)), at(2024, 1, 1, 0, 0));
        assert_eq!(Resolution::Monthly.next(at(2024, 1, 1, 0, 0)), at(2024, 2, 1, 0, 0));
        assert_eq!(Resolution::Weekly.next(at(2024, 3, 11, 0, 0)), at(2024, 3, 18, 0, 0));
    }
}
