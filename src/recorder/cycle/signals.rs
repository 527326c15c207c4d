// src/recorder/cycle/signals.rs

use portable_atomic::{AtomicBool, Ordering};

/// Flags raised from timer context and consumed by [`Orchestrator::process`].
///
/// Timer callbacks must only call the `on_*` methods. Everything else is for
/// the polling side. Place it in a `static` (or anywhere that outlives the
/// orchestrator) so both contexts can reach it.
///
/// [`Orchestrator::process`]: super::Orchestrator::process
#[derive(Debug)]
pub struct CycleSignals {
    start_requested: AtomicBool,
    cycle_complete: AtomicBool,
    particulate_timed_out: AtomicBool,
}

impl CycleSignals {
    pub const fn new() -> Self {
        CycleSignals {
            start_requested: AtomicBool::new(false),
            cycle_complete: AtomicBool::new(false),
            particulate_timed_out: AtomicBool::new(false),
        }
    }

    /// Periodic timer callback: request a new cycle.
    #[inline]
    pub fn on_interval_elapsed(&self) {
        self.start_requested.store(true, Ordering::Release);
    }

    /// One-shot timeout callback: give up on the particulate reading.
    #[inline]
    pub fn on_particulate_timeout(&self) {
        self.particulate_timed_out.store(true, Ordering::Release);
        self.cycle_complete.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn take_start(&self) -> bool {
        self.start_requested.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn mark_complete(&self) {
        self.cycle_complete.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn take_complete(&self) -> bool {
        self.cycle_complete.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub(crate) fn take_timed_out(&self) -> bool {
        self.particulate_timed_out.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn clear(&self) {
        self.start_requested.store(false, Ordering::Release);
        self.cycle_complete.store(false, Ordering::Release);
        self.particulate_timed_out.store(false, Ordering::Release);
    }
}

impl Default for CycleSignals {
    fn default() -> Self {
        Self::new()
    }
}
