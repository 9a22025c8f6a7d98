use chrono::{DateTime, NaiveDate, Utc};

/// Source of "now" for scoring and link expiry. Streak days are UTC
/// calendar dates.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Instant(DateTime<Utc>);

    impl Clock for Instant {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn today_is_the_utc_date() {
        let late = DateTime::parse_from_rfc3339("2024-01-01T23:30:00-02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Instant(late).today(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }
}
