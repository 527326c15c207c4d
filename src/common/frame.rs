// src/common/frame.rs

use super::reading::ParticulateReading;

/// Total length of a particulate sensor measurement frame.
pub const FRAME_LEN: usize = 32;
/// Length of the magic header at the start of a frame.
pub const HEADER_LEN: usize = 2;
/// The two magic bytes every frame starts with.
pub const FRAME_MAGIC: [u8; HEADER_LEN] = [0x42, 0x4D];

const PM25_OFFSET: usize = 6;
const PM10_OFFSET: usize = 8;
/// Offset of the big-endian checksum trailer. The checksum covers `[0, CHECKSUM_OFFSET)`.
pub const CHECKSUM_OFFSET: usize = FRAME_LEN - 2;

/// Errors from [`decode_frame`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameError {
    #[error("frame length: expected {expected}, got {got}")]
    Length { expected: usize, got: usize },

    #[error("bad frame header: {0:#04x} {1:#04x}")]
    Magic(u8, u8),

    /// `expected` is the trailer carried in the frame, `calculated` the local sum.
    #[error("checksum mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    Checksum { expected: u16, calculated: u16 },
}

/// Wrapping 16-bit sum of every byte in `data`.
#[inline]
pub fn calculate_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

#[inline]
fn be_u16(frame: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([frame[offset], frame[offset + 1]])
}

/// Validates a complete frame and extracts the particulate reading.
///
/// Checks, in order: total length, magic header, and the checksum trailer
/// (big-endian at bytes 30..32) against the sum of bytes 0..30. Only then are
/// PM2.5 (bytes 6..8) and PM10 (bytes 8..10) read, both big-endian.
pub fn decode_frame(frame: &[u8]) -> Result<ParticulateReading, FrameError> {
    if frame.len() != FRAME_LEN {
        return Err(FrameError::Length { expected: FRAME_LEN, got: frame.len() });
    }
    if frame[..HEADER_LEN] != FRAME_MAGIC {
        return Err(FrameError::Magic(frame[0], frame[1]));
    }

    let calculated = calculate_checksum(&frame[..CHECKSUM_OFFSET]);
    let expected = be_u16(frame, CHECKSUM_OFFSET);
    if calculated != expected {
        return Err(FrameError::Checksum { expected, calculated });
    }

    Ok(ParticulateReading {
        pm25: be_u16(frame, PM25_OFFSET),
        pm10: be_u16(frame, PM10_OFFSET),
    })
}

// --- Outgoing commands ---

const COMMAND_HEAD: u8 = 0x68;
const COMMAND_LEN: u8 = 0x01;

/// Single-byte commands understood by the particulate sensor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum ParticulateCommand {
    StartMeasurement = 0x01,
    StopMeasurement = 0x02,
    StopAutoSend = 0x20,
    StartAutoSend = 0x40,
}

impl ParticulateCommand {
    /// Encodes `[head, len, cmd, cs]` where `cs` brings the byte sum to zero mod 256.
    pub const fn encode(self) -> [u8; 4] {
        let cmd = self as u8;
        let sum = COMMAND_HEAD.wrapping_add(COMMAND_LEN).wrapping_add(cmd);
        [COMMAND_HEAD, COMMAND_LEN, cmd, 0u8.wrapping_sub(sum)]
    }
}

/// Builds a valid frame carrying the given readings. Test and simulation helper.
#[cfg(test)]
pub(crate) fn build_frame(pm25: u16, pm10: u16) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..HEADER_LEN].copy_from_slice(&FRAME_MAGIC);
    // Frame length field, as sent by the sensor.
    frame[2..4].copy_from_slice(&28u16.to_be_bytes());
    frame[PM25_OFFSET..PM25_OFFSET + 2].copy_from_slice(&pm25.to_be_bytes());
    frame[PM10_OFFSET..PM10_OFFSET + 2].copy_from_slice(&pm10.to_be_bytes());
    let checksum = calculate_checksum(&frame[..CHECKSUM_OFFSET]);
    frame[CHECKSUM_OFFSET..].copy_from_slice(&checksum.to_be_bytes());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid_frame() {
        let frame = build_frame(35, 52);
        let reading = decode_frame(&frame).unwrap();
        assert_eq!(reading, ParticulateReading { pm25: 35, pm10: 52 });
    }

    #[test]
    fn test_decode_uses_big_endian_fields() {
        let frame = build_frame(0x1234, 0xABCD);
        assert_eq!(frame[6], 0x12);
        assert_eq!(frame[7], 0x34);
        let reading = decode_frame(&frame).unwrap();
        assert_eq!(reading.pm25, 0x1234);
        assert_eq!(reading.pm10, 0xABCD);
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let mut frame = build_frame(10, 20);
        frame[12] ^= 0x01;
        assert!(matches!(
            decode_frame(&frame),
            Err(FrameError::Checksum { .. })
        ));
    }

    #[test]
    fn test_decode_wrong_length() {
        let frame = build_frame(10, 20);
        assert_eq!(
            decode_frame(&frame[..31]),
            Err(FrameError::Length { expected: 32, got: 31 })
        );
    }

    #[test]
    fn test_decode_bad_magic() {
        let mut frame = build_frame(10, 20);
        frame[1] = 0x00;
        assert_eq!(decode_frame(&frame), Err(FrameError::Magic(0x42, 0x00)));
    }

    #[test]
    fn test_checksum_wraps() {
        let data = [0xFFu8; 300];
        assert_eq!(calculate_checksum(&data), (0xFFu32 * 300 % 0x1_0000) as u16);
    }

    #[test]
    fn test_command_encoding() {
        assert_eq!(ParticulateCommand::StartMeasurement.encode(), [0x68, 0x01, 0x01, 0x96]);
        assert_eq!(ParticulateCommand::StopMeasurement.encode(), [0x68, 0x01, 0x02, 0x95]);
        assert_eq!(ParticulateCommand::StartAutoSend.encode(), [0x68, 0x01, 0x40, 0x57]);
        assert_eq!(ParticulateCommand::StopAutoSend.encode(), [0x68, 0x01, 0x20, 0x77]);
    }

    #[test]
    fn test_command_bytes_sum_to_zero() {
        for cmd in [
            ParticulateCommand::StartMeasurement,
            ParticulateCommand::StopMeasurement,
            ParticulateCommand::StartAutoSend,
            ParticulateCommand::StopAutoSend,
        ] {
            let sum = cmd.encode().iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            assert_eq!(sum, 0);
        }
    }
}
