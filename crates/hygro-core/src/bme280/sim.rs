//! Register-file model of a BME280 behind an SPI device.
//!
//! Used by the unit tests and by the desktop simulator (`sim` feature). The
//! model decodes the SPI control byte the same way the sensor does, so it
//! exercises the driver's framing as well as its logic.

use embedded_hal::spi::{ErrorKind, ErrorType};
use embedded_hal_async::spi::{Operation, SpiDevice};
use heapless::Vec;

use super::compensation::{RawHumidity, RawTemperature};
use super::registers::{
    CALIB_BLOCK1_LEN, CALIB_BLOCK1_START, CALIB_BLOCK2_LEN, CALIB_BLOCK2_START, CHIP_ID, CONFIG,
    CTRL_HUM, CTRL_MEAS, DATA_LEN, DATA_START, EXPECTED_CHIP_ID, RESET, RESET_COMMAND, SPI_READ,
};

/// Trimming block 1 of the datasheet reference device (T1 = 27504,
/// T2 = 26435, T3 = -1000, P1..P9 from the pressure example), with
/// `dig_H1` = 75 at 0xA1 and the reserved 0xA0 byte left at zero.
pub const REFERENCE_BLOCK1: [u8; CALIB_BLOCK1_LEN] = [
    0x70, 0x6B, // dig_T1
    0x43, 0x67, // dig_T2
    0x18, 0xFC, // dig_T3
    0x7D, 0x8E, // dig_P1
    0x43, 0xD6, // dig_P2
    0xD0, 0x0B, // dig_P3
    0x27, 0x0B, // dig_P4
    0x8C, 0x00, // dig_P5
    0xF9, 0xFF, // dig_P6
    0x8C, 0x3C, // dig_P7
    0xF8, 0xC6, // dig_P8
    0x70, 0x17, // dig_P9
    0x00, // reserved (0xA0)
    0x4B, // dig_H1
];

/// Humidity block: H2 = 362, H3 = 0, H4 = 313, H5 = 50, H6 = 30.
pub const REFERENCE_BLOCK2: [u8; CALIB_BLOCK2_LEN] = [0x6A, 0x01, 0x00, 0x13, 0x29, 0x03, 0x1E];

/// Pressure skipped (0x80000), temperature 519888, humidity 27215.
const POWER_ON_BURST: [u8; DATA_LEN] = [0x80, 0x00, 0x00, 0x7E, 0xED, 0x00, 0x6A, 0x4F];

const WRITE_LOG_LEN: usize = 32;
const REGISTER_COUNT: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Access {
    Read(u8),
    Write(u8),
}

/// Simulated sensor. Registers hold power-on values until written.
#[derive(Debug, Clone)]
pub struct SimulatedBme280 {
    registers: [u8; REGISTER_COUNT],
    writes: Vec<(u8, u8), WRITE_LOG_LEN>,
    resets: usize,
    transactions: usize,
    failing_register: Option<u8>,
    bus_fault: bool,
}

impl Default for SimulatedBme280 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBme280 {
    /// A healthy sensor with the reference calibration, reading 25.08 °C and
    /// about 39.5 %RH.
    pub fn new() -> Self {
        Self::with_calibration(&REFERENCE_BLOCK1, &REFERENCE_BLOCK2)
    }

    pub fn with_calibration(block1: &[u8; CALIB_BLOCK1_LEN], block2: &[u8; CALIB_BLOCK2_LEN]) -> Self {
        let mut registers = [0u8; REGISTER_COUNT];
        registers[CHIP_ID as usize] = EXPECTED_CHIP_ID;

        let start = CALIB_BLOCK1_START as usize;
        registers[start..start + CALIB_BLOCK1_LEN].copy_from_slice(block1);
        let start = CALIB_BLOCK2_START as usize;
        registers[start..start + CALIB_BLOCK2_LEN].copy_from_slice(block2);

        let start = DATA_START as usize;
        registers[start..start + DATA_LEN].copy_from_slice(&POWER_ON_BURST);

        Self {
            registers,
            writes: Vec::new(),
            resets: 0,
            transactions: 0,
            failing_register: None,
            bus_fault: false,
        }
    }

    pub fn set_chip_id(&mut self, id: u8) {
        self.registers[CHIP_ID as usize] = id;
    }

    /// Load the data registers with the next sample's ADC codes.
    pub fn set_raw(&mut self, temperature: RawTemperature, humidity: RawHumidity) {
        let t = temperature.code();
        let h = humidity.code();
        let base = DATA_START as usize + 3;
        self.registers[base] = (t >> 12) as u8;
        self.registers[base + 1] = (t >> 4) as u8;
        self.registers[base + 2] = ((t & 0x0F) << 4) as u8;
        self.registers[base + 3] = (h >> 8) as u8;
        self.registers[base + 4] = h as u8;
    }

    /// Fail every transaction addressing `register`.
    pub fn fail_register(&mut self, register: Option<u8>) {
        self.failing_register = register;
    }

    /// Fail every transaction.
    pub fn set_bus_fault(&mut self, fault: bool) {
        self.bus_fault = fault;
    }

    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    /// Accepted writes, oldest first, as `(register, value)`.
    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn transactions(&self) -> usize {
        self.transactions
    }

    fn store(&mut self, register: u8, value: u8) {
        match register {
            RESET if value == RESET_COMMAND => {
                self.resets += 1;
                for control in [CTRL_HUM, CTRL_MEAS, CONFIG] {
                    self.registers[control as usize] = 0;
                }
            }
            CTRL_HUM | CTRL_MEAS | CONFIG => self.registers[register as usize] = value,
            // read-only or reserved
            _ => return,
        }
        let _ = self.writes.push((register, value));
    }

    fn begin(&mut self, control: u8) -> Result<Access, ErrorKind> {
        // the address keeps bit 7 on the device side
        let register = control | SPI_READ;
        if self.bus_fault || self.failing_register == Some(register) {
            return Err(ErrorKind::Other);
        }
        Ok(if control & SPI_READ != 0 {
            Access::Read(register)
        } else {
            Access::Write(register)
        })
    }
}

impl ErrorType for SimulatedBme280 {
    type Error = ErrorKind;
}

impl SpiDevice for SimulatedBme280 {
    async fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.transactions += 1;
        let mut access = None;

        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    let mut bytes = bytes.iter().copied();
                    if access.is_none() {
                        match bytes.next() {
                            Some(control) => access = Some(self.begin(control)?),
                            None => continue,
                        }
                    }
                    for byte in bytes {
                        if let Some(Access::Write(register)) = access {
                            self.store(register, byte);
                            access = Some(Access::Write(register.wrapping_add(1)));
                        }
                    }
                }
                Operation::Read(buffer) => match access {
                    Some(Access::Read(register)) => {
                        let mut register = register;
                        for byte in buffer.iter_mut() {
                            *byte = self.registers[register as usize];
                            register = register.wrapping_add(1);
                        }
                        access = Some(Access::Read(register));
                    }
                    // MISO idles high
                    _ => buffer.fill(0xFF),
                },
                Operation::DelayNs(_) => {}
                Operation::Transfer(..) | Operation::TransferInPlace(..) => return Err(ErrorKind::Other),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn burst_read_auto_increments() {
        let mut sim = SimulatedBme280::new();
        let mut buf = [0u8; 8];
        block_on(sim.transaction(&mut [Operation::Write(&[DATA_START]), Operation::Read(&mut buf)])).unwrap();

        assert_eq!(buf, [0x80, 0x00, 0x00, 0x7E, 0xED, 0x00, 0x6A, 0x4F]);
    }

    #[test]
    fn write_clears_bit_seven_on_the_wire() {
        let mut sim = SimulatedBme280::new();
        block_on(sim.transaction(&mut [Operation::Write(&[CTRL_MEAS & 0x7F]), Operation::Write(&[0xA3])])).unwrap();

        assert_eq!(sim.register(CTRL_MEAS), 0xA3);
        assert_eq!(sim.writes(), &[(CTRL_MEAS, 0xA3)]);
    }

    #[test]
    fn reset_command_clears_control_registers() {
        let mut sim = SimulatedBme280::new();
        block_on(sim.transaction(&mut [Operation::Write(&[CTRL_HUM & 0x7F]), Operation::Write(&[0x05])])).unwrap();
        block_on(sim.transaction(&mut [Operation::Write(&[RESET & 0x7F]), Operation::Write(&[0x00])])).unwrap();
        assert_eq!(sim.register(CTRL_HUM), 0x05);
        assert_eq!(sim.resets(), 0);

        block_on(sim.transaction(&mut [Operation::Write(&[RESET & 0x7F]), Operation::Write(&[RESET_COMMAND])])).unwrap();
        assert_eq!(sim.register(CTRL_HUM), 0x00);
        assert_eq!(sim.resets(), 1);
    }

    #[test]
    fn calibration_registers_are_read_only() {
        let mut sim = SimulatedBme280::new();
        block_on(sim.transaction(&mut [Operation::Write(&[CALIB_BLOCK1_START & 0x7F]), Operation::Write(&[0xAA])]))
            .unwrap();

        assert_eq!(sim.register(CALIB_BLOCK1_START), REFERENCE_BLOCK1[0]);
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn faults_fail_the_transaction() {
        let mut sim = SimulatedBme280::new();
        let mut id = [0u8; 1];

        sim.fail_register(Some(CHIP_ID));
        let result = block_on(sim.transaction(&mut [Operation::Write(&[CHIP_ID]), Operation::Read(&mut id)]));
        assert_eq!(result, Err(ErrorKind::Other));

        sim.fail_register(None);
        sim.set_bus_fault(true);
        let result = block_on(sim.transaction(&mut [Operation::Write(&[DATA_START]), Operation::Read(&mut id)]));
        assert_eq!(result, Err(ErrorKind::Other));
        assert_eq!(sim.transactions(), 2);
    }
}
