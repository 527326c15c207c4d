// src/common/mod.rs

// --- Declare all public modules within common ---
pub mod arbiter;
pub mod config;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod reading;
pub mod timing;

// --- Re-export key types/traits/functions for easier access ---

// From arbiter.rs
pub use arbiter::{ArbiterError, TransportArbiter, TransportOwner, TransportUser};

// From config.rs
pub use config::Settings;

// From crc.rs
pub use self::crc::{calculate_crc8, decode_word, decode_words, encode_word, Baseline, CrcError};

// From error.rs
pub use error::CycleError;

// From frame.rs
pub use frame::{decode_frame, FrameError, ParticulateCommand};

// From hal_traits.rs
pub use hal_traits::{ByteTransport, MeasurementTimer};

// From reading.rs
pub use reading::{ClimateReading, CompositeReading, GasReading, ParticulateReading, Slot};

// From timing.rs (constants - users can access via common::timing::*)
pub use timing::MIN_MEASUREMENT_INTERVAL;
