// src/sensor/mod.rs

// Collaborator interfaces consumed by the measurement cycle, plus the two
// transport users that share the UART.

pub mod particulate;
pub mod peer;

use crate::common::{
    arbiter::ArbiterError,
    reading::{ClimateReading, GasReading, ParticulateReading},
};
use core::convert::Infallible;
use core::fmt::Debug;

pub use particulate::{LinkState, ParticulateLink, RxSignal};
pub use peer::PeerLink;

/// Errors from a link on the shared transport.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum LinkError<E>
where
    E: Debug,
{
    /// The transport is held by the other user.
    #[error(transparent)]
    Busy(#[from] ArbiterError),

    /// Underlying I/O error from the transport.
    #[error("I/O error: {0:?}")]
    Io(E),

    /// The power-enable pin could not be driven.
    #[error("enable pin error")]
    Pin,
}

/// Result of a gas sensor read that did not produce data.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum GasReadError<E>
where
    E: Debug,
{
    /// The sensor has not signalled a new sample since the last read.
    #[error("no data available yet")]
    NoDataYet,

    /// Communication or data integrity failure.
    #[error("device error: {0:?}")]
    Device(E),
}

/// Blocking temperature/humidity sensor.
pub trait HumiditySensor {
    type Error: Debug;

    /// Checks the device responds. Called once from the orchestrator's setup.
    fn setup(&mut self) -> Result<(), Self::Error>;

    /// Performs a complete, bounded-duration measurement.
    fn read(&mut self) -> Result<ClimateReading, Self::Error>;
}

/// Interrupt-driven gas sensor, read without blocking.
pub trait GasSensor {
    type Error: Debug;

    fn setup(&mut self) -> Result<(), Self::Error>;

    /// Starts continuous sampling.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Pushes the latest ambient conditions for on-chip compensation.
    fn set_env(&mut self, temperature: f32, humidity: f32);

    /// Returns the latest sample, or [`GasReadError::NoDataYet`] if none is pending.
    fn read(&mut self) -> Result<GasReading, GasReadError<Self::Error>>;

    /// Loads a previously saved calibration baseline into the chip.
    fn restore_baseline(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Persists the chip's current calibration baseline.
    fn save_baseline(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Asynchronous particulate sensor behind the shared transport.
///
/// See [`ParticulateLink`] for the frame-level contract.
pub trait ParticulateSensor {
    type Error: Debug;

    fn setup(&mut self) -> Result<(), LinkError<Self::Error>>;

    /// Acquires the transport and starts measuring. Fails with
    /// [`LinkError::Busy`] without side effects if the peer holds it.
    fn enable(&mut self) -> Result<(), LinkError<Self::Error>>;

    /// Stops measuring and releases the transport. Valid in any state.
    fn disable(&mut self) -> Result<(), LinkError<Self::Error>>;

    fn is_enabled(&self) -> bool;

    /// Consumes buffered bytes. Never blocks.
    fn poll(&mut self) -> Result<(), LinkError<Self::Error>>;

    /// Takes the accepted reading, if one is pending.
    fn take_reading(&mut self) -> Option<ParticulateReading>;
}

/// Stand-in for a sensor that is not fitted.
///
/// The orchestrator never calls into an absent sensor's read path; these
/// implementations only exist so every slot has a concrete type.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoSensor;

impl HumiditySensor for NoSensor {
    type Error = Infallible;

    fn setup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn read(&mut self) -> Result<ClimateReading, Self::Error> {
        Ok(ClimateReading::default())
    }
}

impl GasSensor for NoSensor {
    type Error = Infallible;

    fn setup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_env(&mut self, _temperature: f32, _humidity: f32) {}

    fn read(&mut self) -> Result<GasReading, GasReadError<Self::Error>> {
        Err(GasReadError::NoDataYet)
    }
}

impl ParticulateSensor for NoSensor {
    type Error = Infallible;

    fn setup(&mut self) -> Result<(), LinkError<Self::Error>> {
        Ok(())
    }

    fn enable(&mut self) -> Result<(), LinkError<Self::Error>> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), LinkError<Self::Error>> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn poll(&mut self) -> Result<(), LinkError<Self::Error>> {
        Ok(())
    }

    fn take_reading(&mut self) -> Option<ParticulateReading> {
        None
    }
}
