#![no_std]
//! Driver for the TE TSYS01 digital temperature sensor.
//!
//! The part carries five calibration words in PROM; temperature comes from a
//! single 24-bit ADC conversion pushed through a fourth-order calibration
//! polynomial. The raw ADC value is divided by 256 before evaluation, as in
//! the manufacturer's reference code.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

/// Factory default I²C address (CSB low).
pub const DEFAULT_ADDRESS: u8 = 0x77;

const CMD_RESET: u8 = 0x1E;
const CMD_ADC_READ: u8 = 0x00;
const CMD_ADC_TEMP_CONV: u8 = 0x48;
const CMD_PROM_READ: u8 = 0xA0;

const RESET_SETTLE_MS: u32 = 10;
const CONVERSION_MS: u32 = 10;

#[derive(derive_more::From, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Bus transaction failed.
    Bus(E),
    /// The calibration PROM read back blank.
    InvalidProm,
}

/// TSYS01 on an `embedded-hal-async` bus.
pub struct Tsys01<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    calib: [u16; 8],
    initialized: bool,
}

impl<I2C: I2c, D: DelayNs> Tsys01<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self { i2c, delay, address, calib: [0; 8], initialized: false }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn calibration(&self) -> &[u16; 8] {
        &self.calib
    }

    /// Reset the sensor and load its calibration PROM.
    pub async fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        self.command(CMD_RESET).await?;
        self.delay.delay_ms(RESET_SETTLE_MS).await;
        self.read_prom().await?;
        if self.calib[1..6].iter().all(|&c| c == 0) {
            return Err(Error::InvalidProm);
        }
        self.initialized = true;
        Ok(())
    }

    /// Measure the temperature in °C.
    ///
    /// Initializes lazily; an init failure surfaces as the read failure.
    pub async fn read(&mut self) -> Result<f64, Error<I2C::Error>> {
        if !self.initialized {
            self.init().await?;
        }
        self.command(CMD_ADC_TEMP_CONV).await?;
        self.delay.delay_ms(CONVERSION_MS).await;
        let adc = self.read_adc().await?;
        Ok(temperature_from_adc(&self.calib, adc))
    }

    async fn command(&mut self, cmd: u8) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(self.address, &[cmd]).await.map_err(Error::Bus)
    }

    async fn read_adc(&mut self) -> Result<u32, Error<I2C::Error>> {
        let mut buf = [0u8; 3];
        self.i2c
            .write_read(self.address, &[CMD_ADC_READ], &mut buf)
            .await
            .map_err(Error::Bus)?;
        Ok(u32::from_be_bytes([0, buf[0], buf[1], buf[2]]))
    }

    async fn read_prom(&mut self) -> Result<(), Error<I2C::Error>> {
        for i in 0..8u8 {
            let mut buf = [0u8; 2];
            self.i2c
                .write_read(self.address, &[CMD_PROM_READ + i * 2], &mut buf)
                .await
                .map_err(Error::Bus)?;
            self.calib[i as usize] = u16::from_be_bytes(buf);
        }
        Ok(())
    }
}

/// Calibration polynomial over the pre-divided ADC value.
///
/// `T = -2·C1·1e-21·D⁴ + 4·C2·1e-16·D³ - 2·C3·1e-11·D² + C4·1e-6·D
///      - 1.5·C5·1e-2`, with `D = adc / 256` (integer division).
pub fn temperature_from_adc(calib: &[u16; 8], adc: u32) -> f64 {
    let d = (adc / 256) as f64;
    let c1 = calib[1] as f64;
    let c2 = calib[2] as f64;
    let c3 = calib[3] as f64;
    let c4 = calib[4] as f64;
    let c5 = calib[5] as f64;

    (-2.0) * c1 * 1e-21 * (d * d * d * d)
        + 4.0 * c2 * 1e-16 * (d * d * d)
        + (-2.0) * c3 * 1e-11 * (d * d)
        + 1.0 * c4 * 1e-6 * d
        + (-1.5) * c5 * 1e-2
}
