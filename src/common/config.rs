// src/common/config.rs

use super::timing::{DEFAULT_MEASUREMENT_INTERVAL, MIN_MEASUREMENT_INTERVAL};
use core::time::Duration;

/// Which sensors are fitted, and how often to measure.
///
/// Addresses and pins belong to the individual drivers, which are constructed
/// by the caller and handed to the orchestrator already wired.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Settings {
    /// Period of the measurement timer.
    pub interval: Duration,
    pub has_particulate: bool,
    pub has_gas: bool,
    pub has_humidity: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::full()
    }
}

impl Settings {
    /// All three sensors at the default interval.
    pub const fn full() -> Self {
        Self {
            interval: DEFAULT_MEASUREMENT_INTERVAL,
            has_particulate: true,
            has_gas: true,
            has_humidity: true,
        }
    }

    /// Temperature/humidity only, e.g. a board without the particulate header populated.
    pub const fn climate_only() -> Self {
        Self {
            interval: DEFAULT_MEASUREMENT_INTERVAL,
            has_particulate: false,
            has_gas: false,
            has_humidity: true,
        }
    }

    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The interval actually used: never below [`MIN_MEASUREMENT_INTERVAL`].
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_MEASUREMENT_INTERVAL)
    }
}
