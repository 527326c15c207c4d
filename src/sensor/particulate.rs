// src/sensor/particulate.rs

use super::{LinkError, ParticulateSensor};
use crate::common::{
    arbiter::{TransportArbiter, TransportUser},
    frame::{decode_frame, FrameError, ParticulateCommand, FRAME_LEN, FRAME_MAGIC, HEADER_LEN},
    hal_traits::ByteTransport,
    reading::ParticulateReading,
    timing,
};
use embedded_hal::{delay::DelayNs, digital::OutputPin};
use portable_atomic::{AtomicBool, Ordering};

/// Edge flag raised by the UART receive interrupt.
///
/// The interrupt side only calls [`RxSignal::notify`]; all reading happens
/// later in [`ParticulateLink::poll`].
#[derive(Debug)]
pub struct RxSignal {
    pending: AtomicBool,
}

impl RxSignal {
    pub const fn new() -> Self {
        RxSignal { pending: AtomicBool::new(false) }
    }

    /// Interrupt-context entry point: marks that bytes have arrived.
    #[inline]
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
    }

    #[inline]
    fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    #[inline]
    fn clear(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

impl Default for RxSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the link is in assembling the next frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LinkState {
    /// Transport not held; sensor powered down.
    Disabled,
    /// Holding the transport, waiting for input.
    Ready,
    /// Input is pending; hunting for the magic header.
    FrameSignaled,
    /// Header matched; waiting for the remaining 30 bytes.
    HeaderConfirmed,
    /// A full 32-byte frame is buffered and awaits validation.
    FrameComplete,
}

/// Particulate sensor on the shared UART.
///
/// Owns the frame buffer and the warm-up counter. A reading is only accepted
/// after [`timing::PARTICULATE_WARMUP_FRAMES`] consecutive checksum-valid
/// frames; one bad frame resets the count but keeps the link running.
pub struct ParticulateLink<'a, T, EN, D> {
    transport: T,
    enable_pin: EN,
    delay: D,
    arbiter: &'a TransportArbiter,
    rx_signal: &'a RxSignal,
    state: LinkState,
    frame: [u8; FRAME_LEN],
    valid_frames: u8,
    reading: Option<ParticulateReading>,
    powered: bool,
}

impl<'a, T, EN, D> ParticulateLink<'a, T, EN, D>
where
    T: ByteTransport,
    EN: OutputPin,
    D: DelayNs,
{
    /// Line rate the transport must be configured for before it is handed over.
    pub const BAUD: u32 = timing::PARTICULATE_BAUD;

    pub fn new(
        transport: T,
        enable_pin: EN,
        delay: D,
        arbiter: &'a TransportArbiter,
        rx_signal: &'a RxSignal,
    ) -> Self {
        ParticulateLink {
            transport,
            enable_pin,
            delay,
            arbiter,
            rx_signal,
            state: LinkState::Disabled,
            frame: [0u8; FRAME_LEN],
            valid_frames: 0,
            reading: None,
            powered: false,
        }
    }

    #[inline]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Consecutive valid frames seen since the last reset.
    #[inline]
    pub fn valid_frames(&self) -> u8 {
        self.valid_frames
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Hands back the owned peripherals.
    pub fn free(self) -> (T, EN, D) {
        (self.transport, self.enable_pin, self.delay)
    }

    /// One-time configuration: switches the sensor to autonomous frame output
    /// and leaves it stopped. Borrows the transport for the duration.
    pub fn setup(&mut self) -> Result<(), LinkError<T::Error>> {
        self.arbiter.acquire(TransportUser::Particulate)?;

        let result = self.configure();

        self.transport.close();
        self.arbiter.release(TransportUser::Particulate)?;
        result
    }

    fn configure(&mut self) -> Result<(), LinkError<T::Error>> {
        self.transport.open().map_err(LinkError::Io)?;
        self.send_command(ParticulateCommand::StartAutoSend)?;
        self.delay.delay_ms(timing::PARTICULATE_SETTLE.as_millis() as u32);
        self.send_command(ParticulateCommand::StopMeasurement)
    }

    /// Acquires the transport, powers the sensor and starts measuring.
    pub fn enable(&mut self) -> Result<(), LinkError<T::Error>> {
        if self.state != LinkState::Disabled {
            return Ok(());
        }

        self.arbiter.acquire(TransportUser::Particulate)?;

        if let Err(e) = self.start() {
            self.transport.close();
            self.powered = false;
            if self.enable_pin.set_low().is_err() {
                log::warn!("particulate enable pin not released after failed enable");
            }
            self.arbiter.release(TransportUser::Particulate)?;
            return Err(e);
        }

        self.valid_frames = 0;
        self.reading = None;
        self.rx_signal.clear();
        self.state = LinkState::Ready;
        log::trace!("particulate link enabled");
        Ok(())
    }

    fn start(&mut self) -> Result<(), LinkError<T::Error>> {
        self.transport.open().map_err(LinkError::Io)?;
        self.enable_pin.set_high().map_err(|_| LinkError::Pin)?;
        self.powered = true;
        self.send_command(ParticulateCommand::StartMeasurement)
    }

    /// Stops the sensor, closes the transport and releases it. Valid from any state.
    pub fn disable(&mut self) -> Result<(), LinkError<T::Error>> {
        let was_enabled = self.state != LinkState::Disabled;

        self.state = LinkState::Disabled;
        self.valid_frames = 0;
        self.reading = None;
        self.rx_signal.clear();

        if !was_enabled {
            return Ok(());
        }

        let stopped = self.send_command(ParticulateCommand::StopMeasurement);
        self.transport.close();
        let pin = self.enable_pin.set_low().map_err(|_| LinkError::Pin);
        self.powered = false;
        self.arbiter.release(TransportUser::Particulate)?;

        log::trace!("particulate link disabled");
        stopped.and(pin)
    }

    /// True while the sensor's enable pin is driven active.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.powered
    }

    /// Takes the accepted reading, if the last poll produced one.
    #[inline]
    pub fn take_reading(&mut self) -> Option<ParticulateReading> {
        self.reading.take()
    }

    /// Advances the frame state machine as far as buffered input allows.
    ///
    /// Returns as soon as more input is needed or a reading has been accepted.
    pub fn poll(&mut self) -> Result<(), LinkError<T::Error>> {
        loop {
            match self.state {
                LinkState::Disabled => return Ok(()),

                LinkState::Ready => {
                    let signaled = self.rx_signal.take();
                    if signaled || self.transport.bytes_available() >= HEADER_LEN {
                        self.state = LinkState::FrameSignaled;
                    } else {
                        return Ok(());
                    }
                }

                LinkState::FrameSignaled => {
                    if self.transport.bytes_available() < HEADER_LEN {
                        return Ok(());
                    }
                    let Some(first) = self.read_byte()? else {
                        return Ok(());
                    };
                    if first != FRAME_MAGIC[0] {
                        continue;
                    }
                    let Some(second) = self.read_byte()? else {
                        return Ok(());
                    };
                    if second != FRAME_MAGIC[1] {
                        continue;
                    }
                    self.frame[..HEADER_LEN].copy_from_slice(&FRAME_MAGIC);
                    self.state = LinkState::HeaderConfirmed;
                }

                LinkState::HeaderConfirmed => {
                    if self.transport.bytes_available() < FRAME_LEN - HEADER_LEN {
                        return Ok(());
                    }
                    for i in HEADER_LEN..FRAME_LEN {
                        match self.read_byte()? {
                            Some(byte) => self.frame[i] = byte,
                            None => {
                                // Driver under-delivered what it advertised; start over.
                                log::warn!("particulate frame truncated at {} bytes", i);
                                self.state = LinkState::FrameSignaled;
                                return Ok(());
                            }
                        }
                    }
                    self.state = LinkState::FrameComplete;
                }

                LinkState::FrameComplete => {
                    self.state = LinkState::Ready;
                    if self.validate_frame() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Checks the buffered frame and updates the warm-up counter.
    /// Returns `true` when a reading was accepted.
    fn validate_frame(&mut self) -> bool {
        match decode_frame(&self.frame) {
            Ok(reading) => {
                self.valid_frames = self.valid_frames.saturating_add(1);
                if self.valid_frames >= timing::PARTICULATE_WARMUP_FRAMES {
                    self.valid_frames = 0;
                    self.reading = Some(reading);
                    log::trace!("pm25 {}ug/m3 pm10 {}ug/m3", reading.pm25, reading.pm10);
                    true
                } else {
                    false
                }
            }
            Err(FrameError::Checksum { expected, calculated }) => {
                log::warn!(
                    "particulate checksum mismatch: expected {:#06x}, calculated {:#06x}",
                    expected,
                    calculated
                );
                self.valid_frames = 0;
                false
            }
            Err(e) => {
                log::warn!("particulate frame rejected: {}", e);
                self.valid_frames = 0;
                false
            }
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>, LinkError<T::Error>> {
        match self.transport.read_byte() {
            Ok(byte) => Ok(Some(byte)),
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(e)) => Err(LinkError::Io(e)),
        }
    }

    fn send_command(&mut self, command: ParticulateCommand) -> Result<(), LinkError<T::Error>> {
        for byte in command.encode() {
            nb::block!(self.transport.write_byte(byte)).map_err(LinkError::Io)?;
        }
        nb::block!(self.transport.flush()).map_err(LinkError::Io)
    }
}

impl<'a, T, EN, D> ParticulateSensor for ParticulateLink<'a, T, EN, D>
where
    T: ByteTransport,
    EN: OutputPin,
    D: DelayNs,
{
    type Error = T::Error;

    fn setup(&mut self) -> Result<(), LinkError<Self::Error>> {
        ParticulateLink::setup(self)
    }

    fn enable(&mut self) -> Result<(), LinkError<Self::Error>> {
        ParticulateLink::enable(self)
    }

    fn disable(&mut self) -> Result<(), LinkError<Self::Error>> {
        ParticulateLink::disable(self)
    }

    fn is_enabled(&self) -> bool {
        ParticulateLink::is_enabled(self)
    }

    fn poll(&mut self) -> Result<(), LinkError<Self::Error>> {
        ParticulateLink::poll(self)
    }

    fn take_reading(&mut self) -> Option<ParticulateReading> {
        ParticulateLink::take_reading(self)
    }
}

// --- Unit Tests ---
#[cfg(test)]
pub(crate) mod mocks {
    use crate::common::hal_traits::ByteTransport;
    use core::convert::Infallible;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct MockCommError;

    #[derive(Debug, Default)]
    pub struct MockTransport {
        pub open: bool,
        pub open_count: u32,
        pub rx: VecDeque<u8>,
        pub tx: Vec<u8>,
        pub fail_open: bool,
        pub fail_read: bool,
    }

    impl MockTransport {
        pub fn stage(&mut self, bytes: &[u8]) {
            self.rx.extend(bytes.iter().copied());
        }
    }

    impl ByteTransport for MockTransport {
        type Error = MockCommError;

        fn open(&mut self) -> Result<(), Self::Error> {
            if self.fail_open {
                return Err(MockCommError);
            }
            self.open = true;
            self.open_count += 1;
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
            self.rx.clear();
        }

        fn bytes_available(&self) -> usize {
            self.rx.len()
        }

        fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
            if self.fail_read {
                return Err(nb::Error::Other(MockCommError));
            }
            self.rx.pop_front().ok_or(nb::Error::WouldBlock)
        }

        fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
            self.tx.push(byte);
            Ok(())
        }

        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct MockPin {
        pub high: bool,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl embedded_hal::digital::OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct MockDelay {
        pub total_ns: u64,
    }

    impl embedded_hal::delay::DelayNs for MockDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;
    use crate::common::{arbiter::TransportOwner, frame::build_frame};

    type TestLink<'a> = ParticulateLink<'a, MockTransport, MockPin, MockDelay>;

    fn link<'a>(arbiter: &'a TransportArbiter, signal: &'a RxSignal) -> TestLink<'a> {
        ParticulateLink::new(
            MockTransport::default(),
            MockPin::default(),
            MockDelay::default(),
            arbiter,
            signal,
        )
    }

    fn bad_frame() -> [u8; FRAME_LEN] {
        let mut frame = build_frame(99, 99);
        frame[31] = frame[31].wrapping_add(1);
        frame
    }

    #[test]
    fn test_link_line_rate() {
        assert_eq!(TestLink::BAUD, 9600);
    }

    #[test]
    fn test_enable_acquires_and_starts() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);

        assert_eq!(link.state(), LinkState::Disabled);
        assert!(!link.is_enabled());

        link.enable().unwrap();
        assert_eq!(link.state(), LinkState::Ready);
        assert!(link.is_enabled());
        assert!(link.transport.open);
        assert_eq!(arbiter.owner(), TransportOwner::Particulate);
        assert_eq!(link.transport.tx, ParticulateCommand::StartMeasurement.encode());
    }

    #[test]
    fn test_enable_busy_stays_disabled() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        arbiter.acquire(TransportUser::Peer).unwrap();
        let mut link = link(&arbiter, &signal);

        let result = link.enable();
        assert!(matches!(result, Err(LinkError::Busy(_))));
        assert_eq!(link.state(), LinkState::Disabled);
        assert!(!link.transport.open);
        assert!(!link.is_enabled());
        assert_eq!(arbiter.owner(), TransportOwner::Peer);
    }

    #[test]
    fn test_enable_open_failure_releases_transport() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.transport.fail_open = true;

        assert!(matches!(link.enable(), Err(LinkError::Io(MockCommError))));
        assert_eq!(link.state(), LinkState::Disabled);
        assert_eq!(arbiter.owner(), TransportOwner::Unowned);
    }

    /// Enable line whose driver rejects every write.
    struct StuckPin;

    impl embedded_hal::digital::ErrorType for StuckPin {
        type Error = embedded_hal::digital::ErrorKind;
    }

    impl embedded_hal::digital::OutputPin for StuckPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(embedded_hal::digital::ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(embedded_hal::digital::ErrorKind::Other)
        }
    }

    #[test]
    fn test_enable_pin_failure_still_releases_transport() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = ParticulateLink::new(
            MockTransport::default(),
            StuckPin,
            MockDelay::default(),
            &arbiter,
            &signal,
        );

        assert!(matches!(link.enable(), Err(LinkError::Pin)));
        assert_eq!(link.state(), LinkState::Disabled);
        assert!(!link.is_enabled());
        assert_eq!(arbiter.owner(), TransportOwner::Unowned);
        let (transport, _, _) = link.free();
        assert!(!transport.open);
        assert!(transport.tx.is_empty());
    }

    #[test]
    fn test_disable_releases_from_any_state() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);

        // Disabling a disabled link is harmless.
        assert!(link.disable().is_ok());

        link.enable().unwrap();
        let frame = build_frame(1, 2);
        link.transport.stage(&frame[..10]);
        link.poll().unwrap();
        assert_eq!(link.state(), LinkState::HeaderConfirmed);

        link.disable().unwrap();
        assert_eq!(link.state(), LinkState::Disabled);
        assert!(!link.is_enabled());
        assert!(!link.transport.open);
        assert_eq!(link.valid_frames(), 0);
        assert_eq!(arbiter.owner(), TransportOwner::Unowned);
        assert!(link.transport.tx.ends_with(&ParticulateCommand::StopMeasurement.encode()));
    }

    #[test]
    fn test_reading_after_three_valid_frames() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.enable().unwrap();

        let frame = build_frame(0x0102, 0x0304);
        for expected_count in 1..=2 {
            link.transport.stage(&frame);
            link.poll().unwrap();
            assert_eq!(link.valid_frames(), expected_count);
            assert_eq!(link.take_reading(), None);
        }

        link.transport.stage(&frame);
        link.poll().unwrap();
        assert_eq!(
            link.take_reading(),
            Some(ParticulateReading { pm25: 0x0102, pm10: 0x0304 })
        );
        assert_eq!(link.valid_frames(), 0);
        assert_eq!(link.state(), LinkState::Ready);
        // Accepting a reading does not disable the link.
        assert!(link.is_enabled());
        assert_eq!(arbiter.owner(), TransportOwner::Particulate);
    }

    #[test]
    fn test_checksum_failure_resets_counter() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.enable().unwrap();

        let good = build_frame(5, 6);
        link.transport.stage(&good);
        link.transport.stage(&good);
        link.poll().unwrap();
        assert_eq!(link.valid_frames(), 2);

        link.transport.stage(&bad_frame());
        link.poll().unwrap();
        assert_eq!(link.valid_frames(), 0);
        assert_eq!(link.state(), LinkState::Ready);
        assert_eq!(link.take_reading(), None);
        assert_eq!(arbiter.owner(), TransportOwner::Particulate);
    }

    #[test]
    fn test_two_valid_one_invalid_three_valid() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.enable().unwrap();

        let good = build_frame(12, 34);
        let frames = [good, good, bad_frame(), good, good, good];

        for (index, frame) in frames.iter().enumerate() {
            link.transport.stage(frame);
            link.poll().unwrap();
            let reading = link.take_reading();
            if index == 5 {
                assert_eq!(reading, Some(ParticulateReading { pm25: 12, pm10: 34 }));
            } else {
                assert_eq!(reading, None, "unexpected reading after frame {}", index + 1);
            }
        }
    }

    #[test]
    fn test_all_frames_buffered_in_one_poll() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.enable().unwrap();

        let good = build_frame(7, 8);
        for frame in [good, good, bad_frame(), good, good, good, good] {
            link.transport.stage(&frame);
        }
        link.poll().unwrap();
        assert_eq!(link.take_reading(), Some(ParticulateReading { pm25: 7, pm10: 8 }));
        // Stops at the accepted reading; the seventh frame is left for later.
        assert_eq!(link.transport.bytes_available(), FRAME_LEN);
    }

    #[test]
    fn test_resynchronizes_on_garbage() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.enable().unwrap();

        let good = build_frame(21, 22);
        // Leading noise, a lone first magic byte, then frames.
        link.transport.stage(&[0x00, 0x13, 0x42, 0x00, 0xFF]);
        for _ in 0..3 {
            link.transport.stage(&good);
        }
        link.poll().unwrap();
        assert_eq!(link.take_reading(), Some(ParticulateReading { pm25: 21, pm10: 22 }));
    }

    #[test]
    fn test_partial_frame_waits_across_polls() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.enable().unwrap();

        let good = build_frame(3, 4);
        link.transport.stage(&good);
        link.transport.stage(&good);
        link.poll().unwrap();

        link.transport.stage(&good[..1]);
        signal.notify();
        link.poll().unwrap();
        assert_eq!(link.state(), LinkState::FrameSignaled);

        link.transport.stage(&good[1..20]);
        link.poll().unwrap();
        assert_eq!(link.state(), LinkState::HeaderConfirmed);
        assert_eq!(link.take_reading(), None);

        link.transport.stage(&good[20..]);
        link.poll().unwrap();
        assert_eq!(link.take_reading(), Some(ParticulateReading { pm25: 3, pm10: 4 }));
    }

    #[test]
    fn test_poll_when_disabled_reads_nothing() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.transport.stage(&build_frame(1, 1));
        signal.notify();
        link.poll().unwrap();
        assert_eq!(link.state(), LinkState::Disabled);
        assert_eq!(link.transport.bytes_available(), FRAME_LEN);
    }

    #[test]
    fn test_transport_read_error_surfaces() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);
        link.enable().unwrap();
        link.transport.stage(&build_frame(1, 1));
        link.transport.fail_read = true;
        assert!(matches!(link.poll(), Err(LinkError::Io(MockCommError))));
    }

    #[test]
    fn test_setup_configures_and_releases() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        let mut link = link(&arbiter, &signal);

        link.setup().unwrap();
        let mut expected = [0u8; 8];
        expected[..4].copy_from_slice(&ParticulateCommand::StartAutoSend.encode());
        expected[4..].copy_from_slice(&ParticulateCommand::StopMeasurement.encode());
        assert_eq!(link.transport.tx, expected);
        assert!(!link.transport.open);
        assert_eq!(link.delay.total_ns, 50_000_000);
        assert_eq!(arbiter.owner(), TransportOwner::Unowned);
        assert_eq!(link.state(), LinkState::Disabled);
    }

    #[test]
    fn test_setup_busy() {
        let arbiter = TransportArbiter::new();
        let signal = RxSignal::new();
        arbiter.acquire(TransportUser::Peer).unwrap();
        let mut link = link(&arbiter, &signal);
        assert!(matches!(link.setup(), Err(LinkError::Busy(_))));
        assert!(link.transport.tx.is_empty());
    }
}
