//! CRC-16/XMODEM frame checksum.
//!
//! Polynomial 0x1021, initial value 0, no reflection, no final xor. Because
//! the algorithm has no final xor, a running value can be fed back in as the
//! initial value to continue over more bytes.

use crc::{Crc, CRC_16_XMODEM};

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC of `bytes`, continuing from `initial` (0 for a fresh computation).
pub fn crc16(bytes: &[u8], initial: u16) -> u16 {
    let mut digest = XMODEM.digest_with_initial(initial);
    digest.update(bytes);
    digest.finalize()
}

/// CRC of `bytes` from the standard initial value.
pub fn checksum(bytes: &[u8]) -> u16 {
    XMODEM.checksum(bytes)
}

/// Incremental CRC accumulator.
///
/// Lets the frame decoder checksum the header and payload as they arrive
/// instead of re-reading the whole frame at the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(initial: u16) -> Self {
        Self { value: initial }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.value = crc16(bytes, self.value);
    }

    pub fn value(&self) -> u16 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(checksum(b"123456789"), 0x31C3);
        assert_eq!(crc16(b"123456789", 0), 0x31C3);
    }

    #[test]
    fn empty_input_keeps_initial() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(crc16(&[], 0xBEEF), 0xBEEF);
    }

    #[test]
    fn chaining_matches_one_shot() {
        let data = b"\x02\x01\x42\x00\x04\xde\xad\xbe\xef";
        for split in 0..=data.len() {
            let (head, tail) = data.split_at(split);
            assert_eq!(crc16(tail, crc16(head, 0)), checksum(data));
        }
    }

    #[test]
    fn accumulator() {
        let mut crc = Crc16::new();
        crc.update(b"1234");
        crc.update(b"56789");
        assert_eq!(crc.value(), 0x31C3);

        let mut resumed = Crc16::with_initial(crc16(b"1234", 0));
        resumed.update(b"56789");
        assert_eq!(resumed, crc);
    }
}
