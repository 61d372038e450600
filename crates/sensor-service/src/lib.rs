#![no_std]
#![allow(async_fn_in_trait)]
//! Periodic sensor acquisition over a shared bus.
//!
//! A [`Sensor`] is anything with `init`/`read`/`sleep`/`name`; the concrete
//! [`Capability`] enum covers the two physical sensors of the dive puck and
//! their simulated stand-ins. The [`SensorService`] owns a bounded table of
//! polling slots and drives them cooperatively by due time from a single
//! acquisition loop, publishing successful reads into a bounded queue that
//! never blocks the loop: under backpressure the freshest sample loses, the
//! polling cadence does not.

// This must go FIRST so that all the other modules see its macros.
mod fmt;

mod capability;
mod measurement;
mod service;
mod sim;

pub use capability::{
    Capability, CapabilityError, PressureTempSensor, Sensor, TempOnlySensor,
};
pub use measurement::{Measurement, SampleMessage, NAME_LEN};
pub use service::{SensorService, ServiceError};
pub use sim::{NoBus, NoDelay, SimPressureTempSensor, SimTempSensor};
