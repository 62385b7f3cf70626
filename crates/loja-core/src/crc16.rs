//! # CRC16 Engine
//!
//! CRC-16/CCITT-FALSE, the checksum mandated for EMV QR payloads.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  width   16        poly    0x1021            │
//! │  init    0xFFFF    refin   false             │
//! │  refout  false     xorout  0x0000            │
//! │  check("123456789") = 0x29B1                 │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Not to be confused with CRC-16/XMODEM (init 0x0000, check 0x31C3) or
//! CRC-16/KERMIT (reflected, check 0x2189).

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// Incremental CRC-16/CCITT-FALSE state.
///
/// ```rust
/// use loja_core::crc16::Crc16;
///
/// let mut crc = Crc16::new();
/// crc.update(b"1234");
/// crc.update(b"56789");
/// assert_eq!(crc.finish(), 0x29B1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crc16 {
    value: u16,
}

impl Crc16 {
    pub const fn new() -> Self {
        Crc16 { value: INITIAL }
    }

    /// Feeds bytes MSB-first into the register.
    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.value ^= u16::from(byte) << 8;
            for _ in 0..8 {
                if self.value & 0x8000 != 0 {
                    self.value = (self.value << 1) ^ POLYNOMIAL;
                } else {
                    self.value <<= 1;
                }
            }
        }
    }

    pub const fn finish(&self) -> u16 {
        self.value
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Crc16::new()
    }
}

/// One-shot checksum of `data`.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update(data);
    crc.finish()
}

/// Checksum rendered as 4 upper-case hex digits, as appended to a BR Code.
///
/// ```rust
/// use loja_core::crc16::crc16_hex;
///
/// assert_eq!(crc16_hex(b"123456789"), "29B1");
/// ```
pub fn crc16_hex(data: &[u8]) -> String {
    format!("{:04X}", crc16_ccitt(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_value() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_empty_input_is_initial_register() {
        assert_eq!(crc16_ccitt(b""), 0xFFFF);
        assert_eq!(crc16_hex(b""), "FFFF");
    }

    #[test]
    fn test_single_byte_vector() {
        assert_eq!(crc16_ccitt(b"A"), 0xB915);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let data = b"00020126330014BR.GOV.BCB.PIX0111119999999996304";
        let mut crc = Crc16::default();
        for chunk in data.chunks(7) {
            crc.update(chunk);
        }
        assert_eq!(crc.finish(), crc16_ccitt(data));
    }

    #[test]
    fn test_hex_is_zero_padded_upper_case() {
        let hex = crc16_hex(b"LOJAWEB");
        assert_eq!(hex.len(), 4);
        assert!(hex.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }
}
