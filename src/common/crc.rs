// src/common/crc.rs

use arrayvec::ArrayVec;
use crc::{Algorithm, Crc};

/// CRC-8 used on every 16-bit word exchanged with the gas sensor.
/// Polynomial: 0x31 (x^8 + x^5 + x^4 + 1)
/// Initial Value: 0xFF
/// Input/Output Reflected: false
/// Final XOR: 0x00
/// Check Value: 0xF7 (for "123456789"), and 0x92 for the word 0xBEEF.
pub const GAS_WORD_CRC: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x31,
    init: 0xFF,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0xF7,
    residue: 0x00,
};

const CRC_COMPUTER: Crc<u8> = Crc::<u8>::new(&GAS_WORD_CRC);

/// Bytes per encoded word: two data bytes (big-endian) and one CRC byte.
pub const WORD_LEN: usize = 3;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum CrcError {
    #[error("CRC mismatch: expected {expected:#04x}, calculated {calculated:#04x}")]
    Mismatch { expected: u8, calculated: u8 },

    #[error("word buffer length {0} is not a multiple of 3")]
    Length(usize),

    #[error("too many words: capacity {capacity}")]
    Capacity { capacity: usize },
}

#[inline]
pub fn calculate_crc8(data: &[u8]) -> u8 {
    CRC_COMPUTER.checksum(data)
}

/// Encodes a word as `[MSB, LSB, CRC]`.
pub fn encode_word(word: u16) -> [u8; WORD_LEN] {
    let [msb, lsb] = word.to_be_bytes();
    [msb, lsb, calculate_crc8(&[msb, lsb])]
}

/// Decodes one `[MSB, LSB, CRC]` triple, checking the CRC.
pub fn decode_word(chunk: &[u8]) -> Result<u16, CrcError> {
    if chunk.len() != WORD_LEN {
        return Err(CrcError::Length(chunk.len()));
    }
    let calculated = calculate_crc8(&chunk[..2]);
    if calculated != chunk[2] {
        return Err(CrcError::Mismatch { expected: chunk[2], calculated });
    }
    Ok(u16::from_be_bytes([chunk[0], chunk[1]]))
}

/// Decodes a run of CRC-protected words. Fails on the first bad word.
pub fn decode_words<const N: usize>(bytes: &[u8]) -> Result<ArrayVec<u16, N>, CrcError> {
    if bytes.len() % WORD_LEN != 0 {
        return Err(CrcError::Length(bytes.len()));
    }
    let mut words = ArrayVec::new();
    for chunk in bytes.chunks_exact(WORD_LEN) {
        words
            .try_push(decode_word(chunk)?)
            .map_err(|_| CrcError::Capacity { capacity: N })?;
    }
    Ok(words)
}

/// Gas sensor calibration baseline, as read back from and written to the chip.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Baseline {
    pub co2: u16,
    pub tvoc: u16,
}

impl Baseline {
    pub const RECORD_LEN: usize = 2 * WORD_LEN;

    pub fn to_bytes(&self) -> [u8; Self::RECORD_LEN] {
        let mut record = [0u8; Self::RECORD_LEN];
        record[..WORD_LEN].copy_from_slice(&encode_word(self.co2));
        record[WORD_LEN..].copy_from_slice(&encode_word(self.tvoc));
        record
    }

    /// Parses a stored record. An erased record (all `0xFF`) means no baseline
    /// has been saved yet and yields `Ok(None)`.
    pub fn from_bytes(record: &[u8; Self::RECORD_LEN]) -> Result<Option<Self>, CrcError> {
        if record.iter().all(|&b| b == 0xFF) {
            return Ok(None);
        }
        let words = decode_words::<2>(record)?;
        Ok(Some(Baseline { co2: words[0], tvoc: words[1] }))
    }
}
