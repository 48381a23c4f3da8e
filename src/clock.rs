use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;

/// source of the current instant
///
/// injected into the service and scheduler so schedules can be driven by a
/// controlled clock in tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl Clock for SafeTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        SafeTimeProvider::now(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;
    use std::sync::Arc;

    #[test]
    fn test_controlled_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(start)));
        let control = time.test_control().unwrap();
        let clock: Arc<dyn Clock> = time.clone();

        assert_eq!(clock.now(), start);
        control.advance(chrono::Duration::days(2));
        assert_eq!(clock.now(), start + chrono::Duration::days(2));
    }
}
