#![no_std]
//! Driver for the TE MS5837-30BA pressure/temperature sensor.
//!
//! The sensor exposes an 8-word factory calibration PROM and two 24-bit ADC
//! channels (D1 pressure, D2 temperature). Compensation follows the
//! datasheet's 64-bit fixed-point arithmetic, including the second-order
//! correction below 20 °C. All bus access goes through the caller-supplied
//! `embedded-hal-async` I²C implementation.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

/// Factory default I²C address.
pub const DEFAULT_ADDRESS: u8 = 0x76;

const CMD_RESET: u8 = 0x1E;
const CMD_ADC_READ: u8 = 0x00;
const CMD_D1_OSR_8192: u8 = 0x4A;
const CMD_D2_OSR_8192: u8 = 0x5A;
const CMD_PROM_READ: u8 = 0xA0;

const RESET_SETTLE_MS: u32 = 10;
/// Conversion time at OSR 8192.
const CONVERSION_MS: u32 = 20;

/// Atmospheric pressure at the surface, bar.
const SURFACE_PRESSURE_BAR: f64 = 1.013;
/// Seawater density, kg/m³.
const SEAWATER_DENSITY: f64 = 1029.0;
const STANDARD_GRAVITY: f64 = 9.80665;

/// One compensated sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub temperature_c: f64,
    pub pressure_bar: f64,
    pub depth_m: f64,
}

#[derive(derive_more::From, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Bus transaction failed.
    Bus(E),
    /// The calibration PROM read back blank.
    InvalidProm,
}

/// MS5837-30BA on an `embedded-hal-async` bus.
pub struct Ms5837<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    calib: [u16; 8],
    initialized: bool,
}

impl<I2C: I2c, D: DelayNs> Ms5837<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self { i2c, delay, address, calib: [0; 8], initialized: false }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Calibration words as last read from the PROM.
    pub fn calibration(&self) -> &[u16; 8] {
        &self.calib
    }

    /// Reset the sensor and load its calibration PROM.
    pub async fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        self.command(CMD_RESET).await?;
        self.delay.delay_ms(RESET_SETTLE_MS).await;
        self.read_prom().await?;
        if self.calib[1..7].iter().all(|&c| c == 0) {
            return Err(Error::InvalidProm);
        }
        self.initialized = true;
        Ok(())
    }

    /// Run one full measurement cycle.
    ///
    /// Initializes the sensor first if [`init`](Self::init) has not succeeded
    /// yet; an init failure surfaces as the read failure. Issues the D1 and
    /// D2 conversions back to back, each with its fixed conversion delay.
    pub async fn read(&mut self) -> Result<Reading, Error<I2C::Error>> {
        if !self.initialized {
            self.init().await?;
        }
        let d1 = self.convert(CMD_D1_OSR_8192).await?;
        let d2 = self.convert(CMD_D2_OSR_8192).await?;
        Ok(compensate(&self.calib, d1, d2))
    }

    async fn convert(&mut self, cmd: u8) -> Result<u32, Error<I2C::Error>> {
        self.command(cmd).await?;
        self.delay.delay_ms(CONVERSION_MS).await;
        self.read_adc().await
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

/// Datasheet compensation, 64-bit fixed point.
///
/// The shift/truncation behavior of every step is part of the output
/// contract; keep the arithmetic exactly as written.
pub fn compensate(calib: &[u16; 8], d1: u32, d2: u32) -> Reading {
    let d_t: i32 = d2 as i32 - ((calib[5] as i32) << 8);
    let mut temp: i32 =
        2000 + ((d_t as i64 * calib[6] as i64) >> 23) as i32;
    let mut off: i64 =
        ((calib[2] as i64) << 16) + ((calib[4] as i64 * d_t as i64) >> 7);
    let mut sens: i64 =
        ((calib[1] as i64) << 15) + ((calib[3] as i64 * d_t as i64) >> 8);

    // Second-order correction below 20 °C.
    if temp < 2000 {
        let t2 = ((d_t as i64 * d_t as i64) >> 31) as i32;
        let dt = (temp - 2000) as i64;
        let off2 = (5 * dt * dt) >> 1;
        let sens2 = (5 * dt * dt) >> 2;
        temp -= t2;
        off -= off2;
        sens -= sens2;
    }

    // Pressure in Pa: P = (D1 * (SENS >> 21) - OFF) >> 13.
    let p: i64 = ((d1 as i64 * (sens >> 21)) - off) >> 13;
    let pressure_bar = p as f64 / 1e5;
    let temperature_c = temp as f64 / 100.0;

    Reading {
        temperature_c,
        pressure_bar,
        depth_m: depth_from_pressure(pressure_bar),
    }
}

/// Seawater depth from absolute pressure, clamped at the surface.
pub fn depth_from_pressure(pressure_bar: f64) -> f64 {
    let dp_pa = (pressure_bar - SURFACE_PRESSURE_BAR) * 1e5;
    if dp_pa > 0.0 {
        dp_pa / (SEAWATER_DENSITY * STANDARD_GRAVITY)
    } else {
        0.0
    }
}
