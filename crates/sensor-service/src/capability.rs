use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use rand_core::RngCore;

use crate::measurement::Measurement;
use crate::sim::{SimPressureTempSensor, SimTempSensor};

/// The pluggable sensor interface.
///
/// Any physical sensor becomes pollable by implementing this set of
/// operations. `read` must bring the device up transparently if `init` has
/// not succeeded yet, surfacing the init failure as a read failure.
pub trait Sensor {
    type Error: core::fmt::Debug;

    async fn init(&mut self) -> Result<(), Self::Error>;
    async fn read(&mut self) -> Result<Measurement, Self::Error>;
    /// Put the device into its lowest-power state. May be a no-op.
    async fn sleep(&mut self) -> Result<(), Self::Error>;
    fn name(&self) -> &'static str;
}

/// Read failure of a concrete capability.
#[derive(derive_more::From, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapabilityError<E> {
    PressureTemp(ms5837::Error<E>),
    TempOnly(tsys01::Error<E>),
}

/// Pressure + temperature over the shared bus (MS5837-30BA).
pub struct PressureTempSensor<I2C, D> {
    dev: ms5837::Ms5837<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> PressureTempSensor<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { dev: ms5837::Ms5837::new(i2c, delay) }
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self { dev: ms5837::Ms5837::with_address(i2c, delay, address) }
    }
}

impl<I2C: I2c, D: DelayNs> Sensor for PressureTempSensor<I2C, D> {
    type Error = CapabilityError<I2C::Error>;

    async fn init(&mut self) -> Result<(), Self::Error> {
        self.dev.init().await.map_err(CapabilityError::PressureTemp)
    }

    async fn read(&mut self) -> Result<Measurement, Self::Error> {
        let timestamp_us = Instant::now().as_micros();
        let r = self
            .dev
            .read()
            .await
            .map_err(CapabilityError::PressureTemp)?;
        Ok(Measurement {
            temperature_c: r.temperature_c,
            pressure_bar: r.pressure_bar,
            depth_m: r.depth_m,
            timestamp_us,
        })
    }

    async fn sleep(&mut self) -> Result<(), Self::Error> {
        // No low-power command on this part.
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MS5837"
    }
}

/// Temperature only, over the shared bus (TSYS01).
pub struct TempOnlySensor<I2C, D> {
    dev: tsys01::Tsys01<I2C, D>,
}

impl<I2C: I2c, D: DelayNs> TempOnlySensor<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { dev: tsys01::Tsys01::new(i2c, delay) }
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self { dev: tsys01::Tsys01::with_address(i2c, delay, address) }
    }
}

impl<I2C: I2c, D: DelayNs> Sensor for TempOnlySensor<I2C, D> {
    type Error = CapabilityError<I2C::Error>;

    async fn init(&mut self) -> Result<(), Self::Error> {
        self.dev.init().await.map_err(CapabilityError::TempOnly)
    }

    async fn read(&mut self) -> Result<Measurement, Self::Error> {
        let timestamp_us = Instant::now().as_micros();
        let t = self.dev.read().await.map_err(CapabilityError::TempOnly)?;
        let mut m = Measurement::zeroed(timestamp_us);
        m.temperature_c = t;
        Ok(m)
    }

    async fn sleep(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TSYS01"
    }
}

/// The capability set of the device, selected at construction time.
///
/// Simulated variants are full peers of the real ones: same interface, no
/// bus underneath. One value per physical (or simulated) sensor; multiple
/// sensors of the same kind coexist as independent values.
pub enum Capability<I2C, D, R> {
    PressureTemp(PressureTempSensor<I2C, D>),
    TempOnly(TempOnlySensor<I2C, D>),
    SimPressureTemp(SimPressureTempSensor<R>),
    SimTemp(SimTempSensor<R>),
}

impl<I2C: I2c, D: DelayNs, R: RngCore> Sensor for Capability<I2C, D, R> {
    type Error = CapabilityError<I2C::Error>;

    async fn init(&mut self) -> Result<(), Self::Error> {
        match self {
            Capability::PressureTemp(s) => s.init().await,
            Capability::TempOnly(s) => s.init().await,
            Capability::SimPressureTemp(s) => {
                s.init().await.map_err(|e| match e {})
            }
            Capability::SimTemp(s) => s.init().await.map_err(|e| match e {}),
        }
    }

    async fn read(&mut self) -> Result<Measurement, Self::Error> {
        match self {
            Capability::PressureTemp(s) => s.read().await,
            Capability::TempOnly(s) => s.read().await,
            Capability::SimPressureTemp(s) => {
                s.read().await.map_err(|e| match e {})
            }
            Capability::SimTemp(s) => s.read().await.map_err(|e| match e {}),
        }
    }

    async fn sleep(&mut self) -> Result<(), Self::Error> {
        match self {
            Capability::PressureTemp(s) => s.sleep().await,
            Capability::TempOnly(s) => s.sleep().await,
            Capability::SimPressureTemp(s) => {
                s.sleep().await.map_err(|e| match e {})
            }
            Capability::SimTemp(s) => s.sleep().await.map_err(|e| match e {}),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Capability::PressureTemp(s) => s.name(),
            Capability::TempOnly(s) => s.name(),
            Capability::SimPressureTemp(s) => s.name(),
            Capability::SimTemp(s) => s.name(),
        }
    }
}
