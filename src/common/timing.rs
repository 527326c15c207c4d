// src/common/timing.rs

use core::time::Duration;

// === Measurement cycle ===

/// Period between measurement cycles when none is configured.
pub const DEFAULT_MEASUREMENT_INTERVAL: Duration = Duration::from_secs(120);
/// Shortest accepted cycle period. Requests below this are ignored.
pub const MIN_MEASUREMENT_INTERVAL: Duration = Duration::from_secs(10);

// === Particulate sensor ===

/// One-shot bound on how long a cycle waits for an accepted particulate reading.
/// Covers fan spin-up plus the warm-up frames at the sensor's ~1 Hz output rate.
pub const PARTICULATE_TIMEOUT: Duration = Duration::from_secs(10);
/// Settling time after reconfiguring the sensor during setup.
pub const PARTICULATE_SETTLE: Duration = Duration::from_millis(50);
/// Consecutive checksum-valid frames required before a reading is accepted.
pub const PARTICULATE_WARMUP_FRAMES: u8 = 3;
/// Line rate of the particulate sensor's UART.
pub const PARTICULATE_BAUD: u32 = 9600;
