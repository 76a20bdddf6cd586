//! Time service port
//!
//! The single source of "now" for the sync engine. Injected so conflict and
//! rival resolution are deterministic under test.

use chrono::{DateTime, Utc};

/// Provides the current date and time
pub trait TimeService: Send + Sync {
    fn current_date_time(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeService;

impl TimeService for SystemTimeService {
    fn current_date_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_service_is_monotonic_enough() {
        let service = SystemTimeService;
        let first = service.current_date_time();
        let second = service.current_date_time();
        assert!(second >= first);
    }
}
