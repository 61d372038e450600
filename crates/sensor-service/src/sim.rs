//! Simulated capabilities for bench bring-up and host testing.
//!
//! These bypass the bus entirely and draw readings uniformly from configured
//! bounds. Depth is derived from the simulated pressure with the same
//! seawater conversion the real driver uses, so downstream consumers see
//! consistent numbers either way.

use core::convert::Infallible;

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};
use rand_core::RngCore;

use crate::capability::Sensor;
use crate::measurement::Measurement;

/// Uninhabited bus type for capability sets that are simulation-only.
pub enum NoBus {}

impl ErrorType for NoBus {
    type Error = Infallible;
}

impl I2c for NoBus {
    async fn transaction(
        &mut self,
        _address: u8,
        _operations: &mut [Operation<'_>],
    ) -> Result<(), Infallible> {
        match *self {}
    }
}

/// Delay stand-in to go with [`NoBus`]; never awaited by the simulations.
pub struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

fn uniform<R: RngCore>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    let f = rng.next_u32() as f64 / u32::MAX as f64;
    lo + f * (hi - lo)
}

fn ordered(bounds: (f64, f64)) -> (f64, f64) {
    if bounds.1 < bounds.0 {
        (bounds.1, bounds.0)
    } else {
        bounds
    }
}

/// Simulated pressure/temperature sensor.
pub struct SimPressureTempSensor<R> {
    rng: R,
    temperature_c: (f64, f64),
    pressure_bar: (f64, f64),
}

impl<R: RngCore> SimPressureTempSensor<R> {
    pub fn new(
        rng: R,
        temperature_c: (f64, f64),
        pressure_bar: (f64, f64),
    ) -> Self {
        Self {
            rng,
            temperature_c: ordered(temperature_c),
            pressure_bar: ordered(pressure_bar),
        }
    }
}

impl<R: RngCore> Sensor for SimPressureTempSensor<R> {
    type Error = Infallible;

    async fn init(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn read(&mut self) -> Result<Measurement, Infallible> {
        let (tlo, thi) = self.temperature_c;
        let (plo, phi) = self.pressure_bar;
        let pressure_bar = uniform(&mut self.rng, plo, phi);
        Ok(Measurement {
            temperature_c: uniform(&mut self.rng, tlo, thi),
            pressure_bar,
            depth_m: ms5837::depth_from_pressure(pressure_bar),
            timestamp_us: Instant::now().as_micros(),
        })
    }

    async fn sleep(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MS5837"
    }
}

/// Simulated temperature-only sensor.
pub struct SimTempSensor<R> {
    rng: R,
    temperature_c: (f64, f64),
}

impl<R: RngCore> SimTempSensor<R> {
    pub fn new(rng: R, temperature_c: (f64, f64)) -> Self {
        Self { rng, temperature_c: ordered(temperature_c) }
    }
}

impl<R: RngCore> Sensor for SimTempSensor<R> {
    type Error = Infallible;

    async fn init(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn read(&mut self) -> Result<Measurement, Infallible> {
        let (lo, hi) = self.temperature_c;
        let mut m = Measurement::zeroed(Instant::now().as_micros());
        m.temperature_c = uniform(&mut self.rng, lo, hi);
        Ok(m)
    }

    async fn sleep(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TSYS01"
    }
}
