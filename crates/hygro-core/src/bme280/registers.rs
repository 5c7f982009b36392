//! BME280 register map and control register bit-fields.
//!
//! This is the single source of truth for every address, command byte and
//! bit layout the driver puts on the wire. Values come from the BME280
//! datasheet memory map (table 18) and are not tunable.

use serde::{Deserialize, Serialize};

/// Chip identification register (`id`, 5.4.1).
pub const CHIP_ID: u8 = 0xD0;
/// Value the `id` register reads back on a BME280.
pub const EXPECTED_CHIP_ID: u8 = 0x60;

/// Soft reset register (`reset`, 5.4.2).
pub const RESET: u8 = 0xE0;
/// Writing this word to `reset` runs the full power-on-reset procedure.
/// Any other value is ignored by the device.
pub const RESET_COMMAND: u8 = 0xB6;

/// Humidity acquisition options (`ctrl_hum`, 5.4.3).
/// Only takes effect after a subsequent write to `ctrl_meas`.
pub const CTRL_HUM: u8 = 0xF2;
/// Device status (`status`, 5.4.4).
pub const STATUS: u8 = 0xF3;
/// Temperature/pressure acquisition options and power mode (`ctrl_meas`, 5.4.5).
pub const CTRL_MEAS: u8 = 0xF4;
/// Rate, filter and interface options (`config`, 5.4.6).
/// Writes may be ignored while the device is in normal mode.
pub const CONFIG: u8 = 0xF5;

/// First register of the measurement burst (`press_msb`).
pub const DATA_START: u8 = 0xF7;
/// `press_msb` .. `hum_lsb` (0xF7..=0xFE).
pub const DATA_LEN: usize = 8;

/// Start of the temperature/pressure trimming block (`calib00`).
pub const CALIB_BLOCK1_START: u8 = 0x88;
/// `calib00` .. `calib25` (0x88..=0xA1).
pub const CALIB_BLOCK1_LEN: usize = 26;
/// Start of the humidity trimming block (`calib26`).
pub const CALIB_BLOCK2_START: u8 = 0xE1;
/// `calib26` .. `calib32` (0xE1..=0xE7).
pub const CALIB_BLOCK2_LEN: usize = 7;

/// SPI control byte: bit 7 set selects a read (6.3.1).
pub const SPI_READ: u8 = 0x80;
/// SPI control byte: bit 7 cleared selects a write (6.3.2).
pub const SPI_WRITE_MASK: u8 = 0x7F;

/// Oversampling setting shared by the humidity, temperature and pressure
/// channels (`osrs_h`, `osrs_t`, `osrs_p`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Oversampling {
    /// Measurement skipped, output set to 0x8000 / 0x80000.
    Skip,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl From<Oversampling> for u8 {
    fn from(osrs: Oversampling) -> Self {
        match osrs {
            Oversampling::Skip => 0b000,
            Oversampling::X1 => 0b001,
            Oversampling::X2 => 0b010,
            Oversampling::X4 => 0b011,
            Oversampling::X8 => 0b100,
            Oversampling::X16 => 0b101,
        }
    }
}

impl From<u8> for Oversampling {
    fn from(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Oversampling::Skip,
            0b001 => Oversampling::X1,
            0b010 => Oversampling::X2,
            0b011 => Oversampling::X4,
            0b100 => Oversampling::X8,
            // 101, 110 and 111 all select x16
            _ => Oversampling::X16,
        }
    }
}

/// Sensor power mode (`mode[1:0]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Sleep,
    Forced,
    Normal,
}

impl From<Mode> for u8 {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Sleep => 0b00,
            Mode::Forced => 0b01,
            Mode::Normal => 0b11,
        }
    }
}

impl From<u8> for Mode {
    fn from(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Mode::Sleep,
            0b11 => Mode::Normal,
            // 01 and 10 both select forced mode
            _ => Mode::Forced,
        }
    }
}

/// Inactive duration between normal-mode measurements (`t_sb[2:0]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Standby {
    Ms0_5,
    Ms62_5,
    Ms125,
    Ms250,
    Ms500,
    Ms1000,
    Ms10,
    Ms20,
}

impl From<Standby> for u8 {
    fn from(t_sb: Standby) -> Self {
        match t_sb {
            Standby::Ms0_5 => 0b000,
            Standby::Ms62_5 => 0b001,
            Standby::Ms125 => 0b010,
            Standby::Ms250 => 0b011,
            Standby::Ms500 => 0b100,
            Standby::Ms1000 => 0b101,
            Standby::Ms10 => 0b110,
            Standby::Ms20 => 0b111,
        }
    }
}

impl From<u8> for Standby {
    fn from(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Standby::Ms0_5,
            0b001 => Standby::Ms62_5,
            0b010 => Standby::Ms125,
            0b011 => Standby::Ms250,
            0b100 => Standby::Ms500,
            0b101 => Standby::Ms1000,
            0b110 => Standby::Ms10,
            _ => Standby::Ms20,
        }
    }
}

/// IIR filter time constant (`filter[2:0]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Off,
    X2,
    X4,
    X8,
    X16,
}

impl From<Filter> for u8 {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Off => 0b000,
            Filter::X2 => 0b001,
            Filter::X4 => 0b010,
            Filter::X8 => 0b011,
            Filter::X16 => 0b100,
        }
    }
}

impl From<u8> for Filter {
    fn from(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Filter::Off,
            0b001 => Filter::X2,
            0b010 => Filter::X4,
            0b011 => Filter::X8,
            _ => Filter::X16,
        }
    }
}

/// Acquisition settings written to `ctrl_hum`, `ctrl_meas` and `config`
/// during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub humidity_oversampling: Oversampling,
    pub temperature_oversampling: Oversampling,
    pub pressure_oversampling: Oversampling,
    pub mode: Mode,
    pub standby: Standby,
    pub filter: Filter,
    /// Enables the 3-wire SPI interface (`spi3w_en`).
    pub spi3w: bool,
}

impl Default for Settings {
    /// x16 oversampling on humidity and temperature, pressure skipped,
    /// normal mode with the shortest standby and an IIR coefficient of 8.
    fn default() -> Self {
        Self {
            humidity_oversampling: Oversampling::X16,
            temperature_oversampling: Oversampling::X16,
            pressure_oversampling: Oversampling::Skip,
            mode: Mode::Normal,
            standby: Standby::Ms0_5,
            filter: Filter::X8,
            spi3w: false,
        }
    }
}

impl Settings {
    /// `ctrl_hum` byte.
    ///
    /// ```text
    /// bit 7..3 | bit 2..0
    /// reserved | osrs_h
    /// ```
    pub fn ctrl_hum(&self) -> u8 {
        u8::from(self.humidity_oversampling)
    }

    /// `ctrl_meas` byte.
    ///
    /// ```text
    /// bit 7..5 | bit 4..2 | bit 1..0
    /// osrs_t   | osrs_p   | mode
    /// ```
    pub fn ctrl_meas(&self) -> u8 {
        (u8::from(self.temperature_oversampling) << 5)
            | (u8::from(self.pressure_oversampling) << 2)
            | u8::from(self.mode)
    }

    /// `config` byte.
    ///
    /// ```text
    /// bit 7..5 | bit 4..2 | bit 1    | bit 0
    /// t_sb     | filter   | reserved | spi3w_en
    /// ```
    pub fn config(&self) -> u8 {
        (u8::from(self.standby) << 5) | (u8::from(self.filter) << 2) | u8::from(self.spi3w)
    }

    /// Decode the three control bytes back into settings.
    pub fn from_registers(ctrl_hum: u8, ctrl_meas: u8, config: u8) -> Self {
        Self {
            humidity_oversampling: ctrl_hum.into(),
            temperature_oversampling: (ctrl_meas >> 5).into(),
            pressure_oversampling: (ctrl_meas >> 2).into(),
            mode: ctrl_meas.into(),
            standby: (config >> 5).into(),
            filter: (config >> 2).into(),
            spi3w: config & 0b1 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_encode_expected_bytes() {
        let settings = Settings::default();
        // osrs_h = 101 (x16)
        assert_eq!(settings.ctrl_hum(), 0x05);
        // osrs_t = 101 (x16), osrs_p = 000 (skip), mode = 11 (normal)
        assert_eq!(settings.ctrl_meas(), 0b1010_0011);
        // t_sb = 000 (0.5 ms), filter = 011 (8), spi3w_en = 0
        assert_eq!(settings.config(), 0b0000_1100);
    }

    #[test]
    fn legacy_config_byte_selects_filter_sixteen() {
        // 0x18 puts 110 in filter[2:0], which the device treats as x16
        let settings = Settings::from_registers(0x05, 0xA3, 0x18);
        assert_eq!(settings.filter, Filter::X16);
        assert_eq!(settings.standby, Standby::Ms0_5);
        assert_eq!(settings.mode, Mode::Normal);
    }

    #[test]
    fn settings_decode_their_own_bytes() {
        let settings = Settings {
            humidity_oversampling: Oversampling::X1,
            temperature_oversampling: Oversampling::X2,
            pressure_oversampling: Oversampling::X4,
            mode: Mode::Forced,
            standby: Standby::Ms20,
            filter: Filter::X2,
            spi3w: true,
        };
        let decoded =
            Settings::from_registers(settings.ctrl_hum(), settings.ctrl_meas(), settings.config());
        assert_eq!(decoded, settings);
    }

    #[test]
    fn read_and_write_control_bytes_differ_only_in_bit_seven() {
        assert_eq!(CTRL_MEAS | SPI_READ, 0xF4);
        assert_eq!(CTRL_MEAS & SPI_WRITE_MASK, 0x74);
        assert_eq!(RESET & SPI_WRITE_MASK, 0x60);
    }
}
