//! Error types for the stashkit library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when cache or store construction parameters
//!   are invalid (zero prune period, zero soft capacity, a capacity handed to
//!   a policy that has no capacity concept).
//! - [`ScheduleError`]: Returned by [`Scheduler::schedule`](crate::scheduler::Scheduler::schedule)
//!   when a task cannot be registered.
//!
//! Supplier failures are never wrapped: `try_get_or_insert_with` hands the
//! supplier's own error back to the caller untouched.
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//! use stashkit::builder::CacheBuilder;
//! use stashkit::error::ConfigError;
//!
//! // A timed cache has no capacity concept
//! let bad = CacheBuilder::new(10).try_timed::<u64, u64>();
//! assert!(bad.is_err());
//!
//! let ok: Result<_, ConfigError> = CacheBuilder::new(0)
//!     .timeout(Duration::from_secs(1))
//!     .try_timed::<u64, u64>();
//! assert!(ok.is_ok());
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by fallible constructors such as
/// [`CacheBuilder::try_timed`](crate::builder::CacheBuilder::try_timed) and
/// [`ReferenceStore::try_soft`](crate::store::ReferenceStore::try_soft).
/// Carries a human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use stashkit::store::ReferenceStore;
///
/// let err = ReferenceStore::<u64, u64>::try_soft(0).unwrap_err();
/// assert!(err.to_string().contains("capacity"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// ScheduleError
// ---------------------------------------------------------------------------

/// Error returned when a periodic prune task cannot be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// The scheduler was shut down and has not been re-initialised.
    Shutdown,
    /// A zero period would spin the worker.
    ZeroPeriod,
    /// The worker thread could not be spawned.
    WorkerUnavailable,
    /// The first due time would overflow the clock.
    PeriodTooLong,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Shutdown => f.write_str("scheduler is shut down"),
            ScheduleError::ZeroPeriod => f.write_str("prune period must be > 0"),
            ScheduleError::WorkerUnavailable => f.write_str("prune worker thread could not be spawned"),
            ScheduleError::PeriodTooLong => f.write_str("prune period overflows the clock"),
        }
    }
}

impl std::error::Error for ScheduleError {}

impl From<ScheduleError> for ConfigError {
    fn from(err: ScheduleError) -> Self {
        ConfigError::new(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("soft capacity must be > 0");
        assert_eq!(err.to_string(), "soft capacity must be > 0");
    }

    #[test]
    fn config_message_accessor() {
        let err = ConfigError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn config_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn config_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ConfigError>();
    }

    // -- ScheduleError ----------------------------------------------------

    #[test]
    fn schedule_display_per_variant() {
        assert_eq!(ScheduleError::Shutdown.to_string(), "scheduler is shut down");
        assert!(ScheduleError::ZeroPeriod.to_string().contains("period"));
    }

    #[test]
    fn schedule_error_converts_into_config_error() {
        let err: ConfigError = ScheduleError::ZeroPeriod.into();
        assert!(err.message().contains("period"));
    }

    #[test]
    fn schedule_implements_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<ScheduleError>();
    }
}
