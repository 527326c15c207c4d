// src/sensor/peer.rs

use super::LinkError;
use crate::common::{
    arbiter::{ArbiterError, TransportArbiter, TransportUser},
    hal_traits::ByteTransport,
};
use embedded_hal::digital::OutputPin;

/// Second user of the shared UART, e.g. a positioning receiver.
///
/// Follows the same non-blocking contract as the particulate link: `enable`
/// fails fast with [`LinkError::Busy`] while the transport is held, and nothing
/// is read unless this link owns it. The receiver's enable line is active-low.
/// Sentence decoding is left to the caller.
pub struct PeerLink<'a, T, EN> {
    transport: T,
    enable_pin: EN,
    arbiter: &'a TransportArbiter,
    enabled: bool,
}

impl<'a, T, EN> PeerLink<'a, T, EN>
where
    T: ByteTransport,
    EN: OutputPin,
{
    pub fn new(transport: T, enable_pin: EN, arbiter: &'a TransportArbiter) -> Self {
        PeerLink { transport, enable_pin, arbiter, enabled: false }
    }

    /// Powers the receiver down and makes sure the line is free. Call once at startup.
    pub fn init(&mut self) -> Result<(), LinkError<T::Error>> {
        self.enable_pin.set_high().map_err(|_| LinkError::Pin)?;
        self.enabled = false;
        Ok(())
    }

    pub fn enable(&mut self) -> Result<(), LinkError<T::Error>> {
        self.arbiter.acquire(TransportUser::Peer)?;

        let opened = self.transport.open().map_err(LinkError::Io).and_then(|()| {
            self.enable_pin.set_low().map_err(|_| LinkError::Pin)
        });
        if let Err(e) = opened {
            self.transport.close();
            self.arbiter.release(TransportUser::Peer)?;
            return Err(e);
        }

        self.enabled = true;
        log::trace!("peer link enabled");
        Ok(())
    }

    /// Shuts the receiver down. Refuses with `Busy` unless this link owns the transport.
    pub fn disable(&mut self) -> Result<(), LinkError<T::Error>> {
        if !self.arbiter.is_held_by(TransportUser::Peer) {
            return Err(LinkError::Busy(ArbiterError::Busy { owner: self.arbiter.owner() }));
        }

        self.enabled = false;
        self.transport.close();
        let pin = self.enable_pin.set_high().map_err(|_| LinkError::Pin);
        self.arbiter.release(TransportUser::Peer)?;
        pin
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Drains buffered bytes into `buf` without blocking. Returns how many were read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError<T::Error>> {
        if !self.enabled || !self.arbiter.is_held_by(TransportUser::Peer) {
            return Ok(0);
        }

        let mut count = 0;
        while count < buf.len() {
            match self.transport.read_byte() {
                Ok(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => return Err(LinkError::Io(e)),
            }
        }
        Ok(count)
    }
}
