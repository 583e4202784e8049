//! Clock Abstraction
//!
//! The aggregate stamps `persisted_at` through a [`TimeProvider`] so that a
//! persistence command can record the write time it actually used, and so
//! tests can pin the clock.
//!
//! # Examples
//!
//! ```rust
//! use docspace_core::models::time::{FixedTimeProvider, TimeProvider};
//! use chrono::{Duration, Utc};
//!
//! let written_at = Utc::now() - Duration::seconds(5);
//! let clock = FixedTimeProvider::at(written_at);
//! assert_eq!(clock.now(), written_at);
//! ```

use chrono::{DateTime, Utc};

/// Source of the current UTC time
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, the default for aggregates
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
///
/// Useful when a write command already knows its commit time and every
/// document of the aggregate must carry exactly that stamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeProvider {
    instant: DateTime<Utc>,
}

impl FixedTimeProvider {
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self { instant }
    }

    /// Move the frozen instant forward
    pub fn advance(&mut self, duration: chrono::Duration) {
        self.instant += duration;
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        self.instant
    }
}
