// src/recorder/cycle/mod.rs

mod signals;

pub use signals::CycleSignals;

use crate::common::{
    config::Settings,
    error::CycleError,
    hal_traits::MeasurementTimer,
    reading::CompositeReading,
    timing::{MIN_MEASUREMENT_INTERVAL, PARTICULATE_TIMEOUT},
};
use crate::sensor::{GasReadError, GasSensor, HumiditySensor, LinkError, ParticulateSensor};
use core::time::Duration;

/// Completion callback. Invoked once per successful cycle with the published reading.
pub type CycleHandler<'a> = &'a mut dyn FnMut(&CompositeReading);

/// Where the current measurement cycle stands.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CyclePhase {
    /// No cycle in progress; the next timer tick starts one.
    Idle,
    /// Synchronous reads in progress (only observable from inside `process`).
    Collecting,
    /// Particulate link enabled, timeout armed.
    WaitingOnParticulate,
    /// All reads resolved; publication happens in the same or next `process`.
    Complete,
}

/// Runs the periodic measurement cycle across all fitted sensors.
///
/// Owns one instance of each collaborator plus both timers. Driven entirely by
/// repeated calls to [`Orchestrator::process`]; timer callbacks only touch the
/// shared [`CycleSignals`].
pub struct Orchestrator<'a, H, G, P, TI, TT> {
    signals: &'a CycleSignals,
    humidity: H,
    gas: G,
    particulate: P,
    interval_timer: TI,
    timeout_timer: TT,
    settings: Settings,
    handler: Option<CycleHandler<'a>>,
    phase: CyclePhase,
    // In-progress cycle.
    pending: CompositeReading,
    // Last resolved cycle, successful or not.
    latest: CompositeReading,
}

impl<'a, H, G, P, TI, TT> Orchestrator<'a, H, G, P, TI, TT>
where
    H: HumiditySensor,
    G: GasSensor,
    P: ParticulateSensor,
    TI: MeasurementTimer,
    TT: MeasurementTimer,
{
    pub fn new(
        signals: &'a CycleSignals,
        humidity: H,
        gas: G,
        particulate: P,
        interval_timer: TI,
        timeout_timer: TT,
    ) -> Self {
        Orchestrator {
            signals,
            humidity,
            gas,
            particulate,
            interval_timer,
            timeout_timer,
            settings: Settings::default(),
            handler: None,
            phase: CyclePhase::Idle,
            pending: CompositeReading::default(),
            latest: CompositeReading::default(),
        }
    }

    /// Configures the timers and initializes every fitted sensor.
    ///
    /// Sensors are set up in the order humidity, gas, particulate; the first
    /// failure aborts. Sensors marked absent in `settings` are not touched.
    pub fn setup(
        &mut self,
        handler: CycleHandler<'a>,
        settings: Settings,
    ) -> Result<(), CycleError> {
        self.handler = Some(handler);

        if settings.interval < MIN_MEASUREMENT_INTERVAL {
            log::warn!(
                "interval {}ms below minimum, using {}ms",
                settings.interval.as_millis(),
                MIN_MEASUREMENT_INTERVAL.as_millis()
            );
        }
        self.settings = Settings { interval: settings.effective_interval(), ..settings };

        self.interval_timer.set_period(self.settings.interval);
        self.timeout_timer.set_period(PARTICULATE_TIMEOUT);

        self.signals.clear();
        self.phase = CyclePhase::Idle;
        self.pending = CompositeReading::default();
        self.latest = CompositeReading::default();

        if self.settings.has_humidity {
            self.humidity.setup().map_err(|e| {
                log::error!("humidity sensor setup failed: {:?}", e);
                CycleError::Humidity
            })?;
        }

        if self.settings.has_gas {
            self.gas.setup().map_err(|e| {
                log::error!("gas sensor setup failed: {:?}", e);
                CycleError::Gas
            })?;
            if let Err(e) = self.gas.restore_baseline() {
                log::warn!("gas baseline not restored: {:?}", e);
            }
        }

        if self.settings.has_particulate {
            self.particulate.setup().map_err(|e| {
                log::error!("particulate sensor setup failed: {:?}", e);
                CycleError::Particulate
            })?;
        }

        Ok(())
    }

    /// Starts the periodic timer and the gas sensor's continuous sampling.
    ///
    /// The first cycle runs on the first timer expiry, not immediately.
    pub fn begin(&mut self) -> Result<(), CycleError> {
        self.interval_timer.start();

        if self.settings.has_gas {
            self.gas.enable().map_err(|e| {
                log::error!("gas sensor enable failed: {:?}", e);
                CycleError::Gas
            })?;
        }

        Ok(())
    }

    /// Stops both timers and abandons any cycle in flight.
    pub fn end(&mut self) {
        self.interval_timer.stop();
        self.timeout_timer.stop();
        if self.phase == CyclePhase::WaitingOnParticulate {
            self.disable_particulate();
        }
        self.signals.clear();
        self.phase = CyclePhase::Idle;
    }

    /// Advances the cycle. Call repeatedly from the main loop.
    ///
    /// Returns an error only for a fatal failure of the current cycle; soft
    /// failures are logged and the affected reading is left absent.
    pub fn process(&mut self) -> Result<(), CycleError> {
        if self.phase == CyclePhase::WaitingOnParticulate {
            if let Some(reading) = self.particulate.take_reading() {
                self.timeout_timer.stop();
                self.disable_particulate();
                self.pending.particulate.set(reading);
                self.phase = CyclePhase::Complete;
                self.signals.mark_complete();
            }
        }

        if self.signals.take_start() {
            if self.phase == CyclePhase::Idle {
                self.collect()?;
            } else {
                log::warn!("measurement tick dropped, cycle still {:?}", self.phase);
            }
        }

        if self.phase == CyclePhase::WaitingOnParticulate {
            if let Err(e) = self.particulate.poll() {
                log::error!("particulate poll failed: {:?}", e);
            }
        }

        if self.signals.take_complete() {
            return self.complete();
        }

        Ok(())
    }

    fn collect(&mut self) -> Result<(), CycleError> {
        log::trace!("measurement start");
        self.phase = CyclePhase::Collecting;
        self.pending.reset();

        if self.settings.has_humidity {
            match self.humidity.read() {
                Ok(climate) => {
                    self.pending.climate.set(climate);
                    if self.settings.has_gas {
                        self.gas.set_env(climate.temperature, climate.humidity);
                    }
                }
                Err(e) => {
                    log::error!("humidity read failed: {:?}", e);
                    self.abort();
                    return Err(CycleError::Humidity);
                }
            }
        }

        if self.settings.has_gas {
            match self.gas.read() {
                Ok(gas) => self.pending.gas.set(gas),
                Err(GasReadError::NoDataYet) => log::warn!("gas sensor has no data yet"),
                Err(GasReadError::Device(e)) => log::error!("gas read failed: {:?}", e),
            }
        }

        if self.settings.has_particulate {
            match self.particulate.enable() {
                Ok(()) => {
                    self.timeout_timer.start();
                    self.phase = CyclePhase::WaitingOnParticulate;
                    return Ok(());
                }
                Err(LinkError::Busy(e)) => {
                    log::warn!("particulate skipped this cycle: {}", e);
                }
                Err(e) => {
                    log::error!("particulate enable failed: {:?}", e);
                }
            }
        }

        self.phase = CyclePhase::Complete;
        self.signals.mark_complete();
        Ok(())
    }

    fn complete(&mut self) -> Result<(), CycleError> {
        match self.phase {
            CyclePhase::Idle => {
                // Left over from a cycle that was already resolved or abandoned.
                self.signals.take_timed_out();
                return Ok(());
            }
            CyclePhase::WaitingOnParticulate => {
                self.timeout_timer.stop();
                self.disable_particulate();
            }
            CyclePhase::Collecting | CyclePhase::Complete => {}
        }

        // Set only while a particulate read was in flight this cycle, even if
        // the reading itself made it in before the flag was seen.
        if self.signals.take_timed_out() {
            log::error!("particulate sensor timed out");
            self.abort();
            return Err(CycleError::ParticulateTimeout);
        }

        log::trace!("measurement complete");
        self.latest = self.pending;
        self.phase = CyclePhase::Idle;
        if let Some(handler) = self.handler.as_mut() {
            handler(&self.latest);
        }
        Ok(())
    }

    /// Ends a failed cycle. Whatever this cycle did read replaces the last
    /// published data, so nothing from an earlier cycle is reported as present.
    fn abort(&mut self) {
        self.latest = self.pending;
        self.phase = CyclePhase::Idle;
    }

    fn disable_particulate(&mut self) {
        if let Err(e) = self.particulate.disable() {
            log::warn!("particulate disable failed: {:?}", e);
        }
    }

    /// Copy of the last resolved cycle's data.
    ///
    /// After a failed cycle only the reads that cycle completed are present.
    #[inline]
    pub fn get_data(&self) -> CompositeReading {
        self.latest
    }

    pub fn attach_handler(&mut self, handler: CycleHandler<'a>) {
        self.handler = Some(handler);
    }

    pub fn detach_handler(&mut self) {
        self.handler = None;
    }

    /// Changes the cycle period. Values below [`MIN_MEASUREMENT_INTERVAL`] are ignored.
    pub fn set_interval(&mut self, interval: Duration) {
        if interval < MIN_MEASUREMENT_INTERVAL {
            log::warn!("interval {}ms rejected", interval.as_millis());
            return;
        }
        log::trace!("update reading period {}ms", interval.as_millis());
        self.settings.interval = interval;
        self.interval_timer.set_period(interval);
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.settings.interval
    }

    /// Persists the gas sensor's calibration baseline, if one is fitted.
    pub fn save_baseline(&mut self) -> Result<(), CycleError> {
        if !self.settings.has_gas {
            return Ok(());
        }
        self.gas.save_baseline().map_err(|e| {
            log::error!("gas baseline save failed: {:?}", e);
            CycleError::Gas
        })
    }

    #[inline]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// The flags timer callbacks must be wired to.
    #[inline]
    pub fn signals(&self) -> &'a CycleSignals {
        self.signals
    }
}
