// src/common/error.rs

use super::arbiter::ArbiterError;

/// Outcome of `setup()`, `begin()` and each `process()` call, besides success.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CycleError {
    /// Humidity/temperature sensor failed. Fatal for setup or the current cycle.
    #[error("humidity/temperature sensor error")]
    Humidity,

    /// Gas sensor failed during setup, enable or baseline handling.
    /// Read failures inside a cycle are absorbed instead.
    #[error("gas sensor error")]
    Gas,

    /// Particulate sensor failed during setup.
    #[error("particulate sensor error")]
    Particulate,

    /// No particulate reading arrived before the timeout. Fatal for this cycle only.
    #[error("particulate sensor timed out")]
    ParticulateTimeout,

    /// The shared transport is held by another user.
    ///
    /// `Orchestrator::process` never returns this: a busy transport only skips
    /// that cycle's particulate reading. It exists for callers driving a link
    /// themselves who want `?` on [`ArbiterError`] to land in `CycleError`.
    #[error("shared transport busy")]
    TransportBusy,
}

impl From<ArbiterError> for CycleError {
    fn from(_: ArbiterError) -> Self {
        CycleError::TransportBusy
    }
}
