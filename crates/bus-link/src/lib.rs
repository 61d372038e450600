#![no_std]
//! Shared serial-bus transaction layer.
//!
//! Wraps an `embedded-hal-async` I²C master in a mutex and hands out
//! per-device handles. Every transaction issued through a handle takes the
//! lock for the duration of a single bus attempt, bounded by a timeout, and
//! retries transparently with exponential backoff. The lock is released
//! before each backoff sleep, so a retrying caller never starves the other
//! users of the bus.

mod error;
mod link;

pub use error::BusError;
pub use link::{BusHandle, BusLink};
