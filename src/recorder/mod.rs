// src/recorder/mod.rs

// The measurement cycle driving all sensors.
pub mod cycle;

pub use cycle::{CycleHandler, CyclePhase, CycleSignals, Orchestrator};
