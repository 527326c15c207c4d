// src/lib.rs

#![cfg_attr(not(test), no_std)] // Host tests get std for mocks

pub mod common;
pub mod recorder;
pub mod sensor;

// Re-export key types for convenience
pub use common::{CompositeReading, CycleError, Settings, TransportArbiter};
pub use recorder::{CycleSignals, Orchestrator};
pub use sensor::{NoSensor, ParticulateLink, PeerLink, RxSignal};
