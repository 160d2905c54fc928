//! # Helpdesk Testing
//!
//! Test doubles for the helpdesk ticket engine.
//!
//! This crate provides:
//! - [`InMemoryTicketStore`]: a `TicketStore` with failure injection
//! - [`InMemoryUserDirectory`]: a `UserDirectory` with failure injection
//! - [`RecordingEventBus`]: an `EventBus` that keeps everything it was given
//! - [`mocks::FixedClock`] and [`mocks::ManualClock`]: deterministic time
//! - [`ManualTicker`]: a `Ticker` driven by the test
//! - [`fixtures`]: ready-made users
//!
//! ## Example
//!
//! ```
//! use helpdesk_testing::{fixtures, InMemoryUserDirectory};
//!
//! let directory = InMemoryUserDirectory::with_users([
//!     fixtures::customer("u1"),
//!     fixtures::technician("t1"),
//! ]);
//! assert_eq!(directory.len(), 2);
//! ```

mod directory;
mod event_bus;
mod store;
mod ticker;

pub use directory::InMemoryUserDirectory;
pub use event_bus::RecordingEventBus;
pub use store::{InMemoryTicketStore, draft_ticket};
pub use ticker::{ManualTicker, TickHandle};

/// Mock implementations of Environment traits
pub mod mocks {
    use chrono::{DateTime, Duration, Utc};
    use helpdesk_core::environment::Clock;
    use std::sync::{PoisonError, RwLock};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use helpdesk_testing::mocks::FixedClock;
    /// use helpdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock the test moves forward explicitly.
    ///
    /// ```
    /// use helpdesk_testing::mocks::{ManualClock, test_time};
    /// use helpdesk_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::new(test_time());
    /// clock.advance(Duration::hours(5));
    /// assert_eq!(clock.now(), test_time() + Duration::hours(5));
    /// ```
    #[derive(Debug)]
    pub struct ManualClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Starts the clock at `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Moves the clock forward.
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jumps to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// The reference instant used across tests: 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(1_735_689_600)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }
}

/// Ready-made directory users.
pub mod fixtures {
    use helpdesk_core::user::{User, UserRole, UserStatus};

    /// An active ticket submitter.
    #[must_use]
    pub fn customer(id: &str) -> User {
        User::new(id, format!("Customer {id}"), UserRole::User)
    }

    /// An active technician.
    #[must_use]
    pub fn technician(id: &str) -> User {
        User::new(id, format!("Technician {id}"), UserRole::Technician)
    }

    /// An active administrator.
    #[must_use]
    pub fn admin(id: &str) -> User {
        User::new(id, format!("Admin {id}"), UserRole::Admin)
    }

    /// A technician whose account was deactivated.
    #[must_use]
    pub fn inactive_technician(id: &str) -> User {
        technician(id).with_status(UserStatus::Inactive)
    }
}

pub use mocks::test_clock;

#[cfg(test)]
mod tests {
    use super::mocks::{ManualClock, test_clock, test_time};
    use chrono::{Datelike, Duration, Timelike};
    use helpdesk_core::environment::Clock;

    #[test]
    fn test_time_is_new_year_2025() {
        let t = test_time();
        assert_eq!((t.year(), t.month(), t.day(), t.hour()), (2025, 1, 1, 0));
        assert_eq!(test_clock().now(), t);
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(test_time());
        assert_eq!(clock.now(), test_time());
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), test_time() + Duration::minutes(90));
        clock.set(test_time());
        assert_eq!(clock.now(), test_time());
    }
}
