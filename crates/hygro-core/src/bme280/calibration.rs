//! Factory trimming parameters (datasheet 4.2.2, table 16).
//!
//! The sensor stores its calibration words in two non-contiguous NVM regions.
//! Block 1 (`calib00..calib25`, 0x88..0xA1) holds the temperature and pressure
//! words plus `dig_H1`; block 2 (`calib26..calib32`, 0xE1..0xE7) holds the rest
//! of the humidity words, two of which are packed as 12-bit values sharing a
//! byte.

use super::registers::{CALIB_BLOCK1_LEN, CALIB_BLOCK1_START, CALIB_BLOCK2_LEN};

// Block 1 byte offsets
const DIG_T1_LSB: usize = 0;
const DIG_T1_MSB: usize = 1;
const DIG_T2_LSB: usize = 2;
const DIG_T2_MSB: usize = 3;
const DIG_T3_LSB: usize = 4;
const DIG_T3_MSB: usize = 5;
/// `dig_H1` lives at register 0xA1, the last byte of block 1 (offset 25).
///
/// Offset 24 is register 0xA0, which the datasheet marks reserved. Some
/// drivers read `dig_H1` from there; do not move it back.
/// `dig_h1_is_read_from_register_a1` pins this down.
const DIG_H1: usize = (0xA1 - CALIB_BLOCK1_START) as usize;

// Block 2 byte offsets
const DIG_H2_LSB: usize = 0;
const DIG_H2_MSB: usize = 1;
const DIG_H3: usize = 2;
const DIG_H4_MSB: usize = 3;
/// Shared byte: `dig_H4[3:0]` in the low nibble, `dig_H5[3:0]` in the high nibble.
const DIG_H4_H5_SHARED: usize = 4;
const DIG_H5_MSB: usize = 5;
const DIG_H6: usize = 6;

const LOW_NIBBLE: u8 = 0x0F;
const HIGH_NIBBLE: u8 = 0xF0;

/// Compensation words read once per power-up and never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl Calibration {
    /// Decode both raw calibration blocks.
    pub fn from_blocks(block1: &[u8; CALIB_BLOCK1_LEN], block2: &[u8; CALIB_BLOCK2_LEN]) -> Self {
        let dig_t1 = combine_bytes(block1[DIG_T1_MSB], block1[DIG_T1_LSB]);
        let dig_t2 = combine_bytes(block1[DIG_T2_MSB], block1[DIG_T2_LSB]) as i16;
        let dig_t3 = combine_bytes(block1[DIG_T3_MSB], block1[DIG_T3_LSB]) as i16;
        let dig_h1 = block1[DIG_H1];

        let dig_h2 = combine_bytes(block2[DIG_H2_MSB], block2[DIG_H2_LSB]) as i16;
        let dig_h3 = block2[DIG_H3];

        // 12-bit signed words: the full byte carries bits 11..4 (sign included),
        // the shared byte supplies bits 3..0.
        let dig_h4 = (i16::from(block2[DIG_H4_MSB] as i8) << 4)
            | i16::from(extract_bits(block2[DIG_H4_H5_SHARED], LOW_NIBBLE, 0));
        let dig_h5 = (i16::from(block2[DIG_H5_MSB] as i8) << 4)
            | i16::from(extract_bits(block2[DIG_H4_H5_SHARED], HIGH_NIBBLE, 4));

        let dig_h6 = block2[DIG_H6] as i8;

        Self {
            dig_t1,
            dig_t2,
            dig_t3,
            dig_h1,
            dig_h2,
            dig_h3,
            dig_h4,
            dig_h5,
            dig_h6,
        }
    }
}

/// Combine two register bytes into a 16-bit word.
pub fn combine_bytes(msb: u8, lsb: u8) -> u16 {
    (u16::from(msb) << 8) | u16::from(lsb)
}

/// Mask a byte and shift the selected bits down to bit 0.
///
/// # Panics
///
/// Panics if `shift` is not a valid bit index of a byte.
pub fn extract_bits(value: u8, mask: u8, shift: u8) -> u8 {
    assert!(shift < 8, "bit shift {shift} out of range for a byte");
    (value & mask) >> shift
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use crate::bme280::sim::{REFERENCE_BLOCK1 as BLOCK1, REFERENCE_BLOCK2 as BLOCK2};

    pub(crate) fn reference() -> Calibration {
        Calibration::from_blocks(&BLOCK1, &BLOCK2)
    }

    #[test]
    fn decodes_reference_blocks() {
        assert_eq!(
            reference(),
            Calibration {
                dig_t1: 27504,
                dig_t2: 26435,
                dig_t3: -1000,
                dig_h1: 75,
                dig_h2: 362,
                dig_h3: 0,
                dig_h4: 313,
                dig_h5: 50,
                dig_h6: 30,
            }
        );
    }

    #[test]
    fn dig_h1_is_read_from_register_a1() {
        let mut block1 = BLOCK1;
        block1[24] = 0xEE;
        assert_eq!(Calibration::from_blocks(&block1, &BLOCK2).dig_h1, 75);

        block1[25] = 0x10;
        assert_eq!(Calibration::from_blocks(&block1, &BLOCK2).dig_h1, 0x10);
    }

    #[test]
    fn packed_humidity_words_are_sign_extended() {
        // E4 = 0xF3 (-13), E5 = 0x29, E6 = 0xFE (-2)
        let block2 = [0x6A, 0x01, 0x00, 0xF3, 0x29, 0xFE, 0xE2];
        let calibration = Calibration::from_blocks(&BLOCK1, &block2);

        assert_eq!(calibration.dig_h4, -13 * 16 | 0x9);
        assert_eq!(calibration.dig_h4, -199);
        assert_eq!(calibration.dig_h5, -2 * 16 | 0x2);
        assert_eq!(calibration.dig_h5, -30);
        assert_eq!(calibration.dig_h6, -30);
    }

    #[test]
    fn combine_bytes_puts_msb_first() {
        assert_eq!(combine_bytes(0x6B, 0x70), 27504);
        assert_eq!(combine_bytes(0xFC, 0x18) as i16, -1000);
    }

    #[test]
    fn extract_bits_masks_then_shifts() {
        assert_eq!(extract_bits(0x29, LOW_NIBBLE, 0), 0x9);
        assert_eq!(extract_bits(0x29, HIGH_NIBBLE, 4), 0x2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn extract_bits_rejects_wide_shift() {
        extract_bits(0xFF, 0xFF, 8);
    }
}
