//! Fixed-point compensation (datasheet 4.2.3, 32-bit integer variant).
//!
//! Both formulas reproduce the vendor reference code operation for operation.
//! Shift and multiplication order determine rounding, so none of the
//! expressions below may be simplified or reordered. Intermediate arithmetic
//! wraps on overflow exactly like the reference code on a 32-bit
//! two's-complement target.

use super::calibration::Calibration;
use super::registers::DATA_LEN;

/// Upper bound of the humidity accumulator before the final `>> 12`
/// (100 %RH in Q22.10 scaled by 4096).
pub const HUMIDITY_CEILING: i32 = 419_430_400;

const TEMP_MSB: usize = 3;
const TEMP_LSB: usize = 4;
const TEMP_XLSB: usize = 5;
const HUM_MSB: usize = 6;
const HUM_LSB: usize = 7;

/// A raw ADC code did not fit its channel's bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawOutOfRange(pub u32);

/// 20-bit temperature ADC code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawTemperature(u32);

impl RawTemperature {
    pub const MAX: u32 = (1 << 20) - 1;

    pub const fn code(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for RawTemperature {
    type Error = RawOutOfRange;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        if code > Self::MAX {
            return Err(RawOutOfRange(code));
        }
        Ok(Self(code))
    }
}

/// 16-bit humidity ADC code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawHumidity(u16);

impl RawHumidity {
    pub const fn code(self) -> u16 {
        self.0
    }
}

impl From<u16> for RawHumidity {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl TryFrom<u32> for RawHumidity {
    type Error = RawOutOfRange;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        u16::try_from(code)
            .map(Self)
            .map_err(|_| RawOutOfRange(code))
    }
}

/// Uncompensated codes from one burst read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub temperature: RawTemperature,
    pub humidity: RawHumidity,
}

impl RawSample {
    /// Decode the `press_msb..hum_lsb` burst.
    ///
    /// ```text
    /// byte 0 | byte 1 | byte 2 | byte 3 | byte 4 | byte 5 | byte 6 | byte 7
    /// P_MSB    P_LSB    P_XLSB   T_MSB    T_LSB    T_XLSB   H_MSB    H_LSB
    /// ```
    ///
    /// Only the top nibble of `T_XLSB` carries data.
    pub fn from_burst(burst: &[u8; DATA_LEN]) -> Self {
        let temperature = (u32::from(burst[TEMP_MSB]) << 12)
            | (u32::from(burst[TEMP_LSB]) << 4)
            | (u32::from(burst[TEMP_XLSB]) >> 4);
        let humidity = (u16::from(burst[HUM_MSB]) << 8) | u16::from(burst[HUM_LSB]);

        Self {
            // at most 8 + 8 + 4 = 20 significant bits
            temperature: RawTemperature(temperature),
            humidity: RawHumidity(humidity),
        }
    }
}

/// Fine-resolution temperature (`t_fine`) carried from temperature
/// compensation into humidity compensation of the same sample.
///
/// Only [`compensate_temperature`] creates one and [`compensate_humidity`]
/// consumes it, so a humidity result can never be computed from a missing or
/// previous sample's temperature.
#[derive(Debug, PartialEq, Eq)]
pub struct FineTemperature(i32);

impl FineTemperature {
    pub const fn value(&self) -> i32 {
        self.0
    }
}

/// Temperature in hundredths of a degree Celsius (5123 = 51.23 °C), plus the
/// fine temperature needed for humidity compensation.
pub fn compensate_temperature(raw: RawTemperature, calibration: &Calibration) -> (i32, FineTemperature) {
    let adc_t = raw.code() as i32;
    let dig_t1 = i32::from(calibration.dig_t1);
    let dig_t2 = i32::from(calibration.dig_t2);
    let dig_t3 = i32::from(calibration.dig_t3);

    let var1 = ((adc_t >> 3).wrapping_sub(dig_t1 << 1)).wrapping_mul(dig_t2) >> 11;

    let delta = (adc_t >> 4).wrapping_sub(dig_t1);
    let var2 = ((delta.wrapping_mul(delta) >> 12).wrapping_mul(dig_t3)) >> 14;

    let t_fine = var1.wrapping_add(var2);
    let centi_celsius = t_fine.wrapping_mul(5).wrapping_add(128) >> 8;

    (centi_celsius, FineTemperature(t_fine))
}

/// Relative humidity accumulator clamped to `[0, HUMIDITY_CEILING]`.
///
/// Shift the result right by 12 for %RH in Q22.10 (47445 = 46.333 %RH).
pub fn compensate_humidity(raw: RawHumidity, fine: FineTemperature, calibration: &Calibration) -> u32 {
    let adc_h = i32::from(raw.code());
    let dig_h1 = i32::from(calibration.dig_h1);
    let dig_h2 = i32::from(calibration.dig_h2);
    let dig_h3 = i32::from(calibration.dig_h3);
    let dig_h4 = i32::from(calibration.dig_h4);
    let dig_h5 = i32::from(calibration.dig_h5);
    let dig_h6 = i32::from(calibration.dig_h6);

    let mut v_x1 = fine.0.wrapping_sub(76_800);

    let offset = (adc_h << 14)
        .wrapping_sub(dig_h4 << 20)
        .wrapping_sub(dig_h5.wrapping_mul(v_x1))
        .wrapping_add(16_384)
        >> 15;
    let h6_term = v_x1.wrapping_mul(dig_h6) >> 10;
    let h3_term = (v_x1.wrapping_mul(dig_h3) >> 11).wrapping_add(32_768);
    let scale = ((h6_term.wrapping_mul(h3_term) >> 10).wrapping_add(2_097_152))
        .wrapping_mul(dig_h2)
        .wrapping_add(8_192)
        >> 14;
    v_x1 = offset.wrapping_mul(scale);

    let squared = ((v_x1 >> 15).wrapping_mul(v_x1 >> 15)) >> 7;
    v_x1 = v_x1.wrapping_sub(squared.wrapping_mul(dig_h1) >> 4);

    v_x1.clamp(0, HUMIDITY_CEILING) as u32
}
