//! Simulation clock
//!
//! The scheduler runs in continuous time. The clock holds a single
//! monotonically non-decreasing `f64` and only moves forward when the
//! scheduler fires a valid event.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when the clock is asked to move illegally
#[derive(Debug, Error, PartialEq)]
pub enum ClockError {
    #[error("Clock cannot move backwards: current {current}, requested {requested}")]
    Backwards { current: f64, requested: f64 },

    #[error("Clock time must be finite, got {0}")]
    NonFinite(f64),
}

/// Continuous simulation clock
///
/// # Example
/// ```
/// use event_queue_core_rs::SimClock;
///
/// let mut clock = SimClock::new();
/// assert_eq!(clock.now(), 0.0);
///
/// clock.advance_to(1.5).unwrap();
/// assert_eq!(clock.now(), 1.5);
/// assert!(clock.advance_to(1.0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    /// Current simulated time
    current_time: f64,
}

impl SimClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self { current_time: 0.0 }
    }

    /// Create a clock starting at an arbitrary time
    ///
    /// Used when restoring from a checkpoint or when a model starts its
    /// history at a non-zero time.
    pub fn starting_at(time: f64) -> Result<Self, ClockError> {
        if !time.is_finite() {
            return Err(ClockError::NonFinite(time));
        }
        Ok(Self { current_time: time })
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.current_time
    }

    /// Move the clock to `time`
    ///
    /// Equal times are allowed (simultaneous events); earlier times are
    /// rejected so the clock can never run backwards.
    pub fn advance_to(&mut self, time: f64) -> Result<(), ClockError> {
        if !time.is_finite() {
            return Err(ClockError::NonFinite(time));
        }
        if time < self.current_time {
            return Err(ClockError::Backwards {
                current: self.current_time,
                requested: time,
            });
        }
        self.current_time = time;
        Ok(())
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}
