//! Wall-clock access for day rollover, streaks and subscription expiry.

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Source of the current calendar date and instant.
pub trait Clock {
    /// The device-local calendar date.
    fn today(&self) -> NaiveDate;

    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::Clock;
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use std::cell::Cell;

    /// Clock whose date and instant only move when told to.
    #[derive(Debug)]
    pub struct ManualClock {
        today: Cell<NaiveDate>,
        now: Cell<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(today: NaiveDate) -> Self {
            let now = today
                .and_hms_opt(12, 0, 0)
                .expect("valid time")
                .and_utc();
            Self {
                today: Cell::new(today),
                now: Cell::new(now),
            }
        }

        pub fn advance_days(&self, days: i64) {
            self.today.set(self.today.get() + Duration::days(days));
            self.now.set(self.now.get() + Duration::days(days));
        }
    }

    impl Clock for ManualClock {
        fn today(&self) -> NaiveDate {
            self.today.get()
        }

        fn now(&self) -> DateTime<Utc> {
            self.now.get()
        }
    }
}
