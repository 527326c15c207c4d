// src/common/hal_traits.rs

use core::fmt::Debug;
use core::time::Duration;

/// Abstraction over the UART shared by the particulate sensor and its peer.
///
/// Reads and writes are non-blocking in the `nb` sense. `open`/`close` map to
/// starting and stopping the peripheral; only the current owner in the
/// [`TransportArbiter`](super::arbiter::TransportArbiter) may call anything here.
pub trait ByteTransport {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Configures and starts the peripheral. For the particulate sensor this
    /// means 8N1 at [`PARTICULATE_BAUD`](super::timing::PARTICULATE_BAUD).
    fn open(&mut self) -> Result<(), Self::Error>;

    /// Stops the peripheral and drops any buffered input.
    fn close(&mut self);

    /// Number of received bytes waiting in the driver's buffer.
    fn bytes_available(&self) -> usize;

    /// Attempts to read a single buffered byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if nothing is buffered.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to queue a single byte for transmission.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Attempts to drain the transmit buffer.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}

/// A software or hardware timer owned by the orchestrator.
///
/// The expiry callback is wired by the integrator and must do nothing but
/// call the matching `on_*` method of [`CycleSignals`](crate::recorder::CycleSignals).
pub trait MeasurementTimer {
    /// Arms the timer. Restarts it if already running.
    fn start(&mut self);

    /// Disarms the timer. Stopping a stopped timer is a no-op.
    fn stop(&mut self);

    /// Changes the period. A running timer continues with the new period.
    fn set_period(&mut self, period: Duration);
}
