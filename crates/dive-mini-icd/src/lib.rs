#![no_std]
//! Shared data types of the dive-mini firmware: what gets recorded to flash
//! and what crosses the upload boundary.

use core::fmt::Write;

use heapless::String;
use postcard_schema::Schema;
use serde::{Deserialize, Serialize};

pub const DIVE_ID_LEN: usize = 32;
pub const DATE_LEN: usize = 20;
pub const LOCATION_LEN: usize = 64;
pub const DIVER_LEN: usize = 32;

/// Upper bound of one postcard-encoded [`DiveRecord`]; storage buffers are
/// sized to this.
pub const MAX_RECORD_BYTES: usize = 192;

/// Identity of one recorded dive.
#[derive(Debug, PartialEq, Serialize, Deserialize, Schema, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiveMetadata {
    pub id: String<DIVE_ID_LEN>,
    /// ISO8601 "YYYY-MM-DDTHH:MM:SS", best effort (no RTC on the puck).
    pub date: String<DATE_LEN>,
    pub location: String<LOCATION_LEN>,
    pub diver: String<DIVER_LEN>,
}

impl DiveMetadata {
    /// Metadata for the `seq`-th dive since the log was created.
    pub fn with_sequence(seq: u32) -> Self {
        let mut id = String::new();
        // Cannot overflow DIVE_ID_LEN: "dive-" + at most 10 digits.
        let _ = write!(id, "dive-{seq:05}");
        Self { id, ..Self::default() }
    }
}

/// One stored sample of an open dive.
#[derive(Debug, PartialEq, Serialize, Deserialize, Schema, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiveSample {
    pub timestamp_us: u64,
    pub temperature_c: f32,
    pub pressure_bar: f32,
    pub depth_m: f32,
}

/// Closing summary of a dive.
#[derive(Debug, PartialEq, Serialize, Deserialize, Schema, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiveSummary {
    pub sample_count: u32,
    pub max_depth_m: f32,
    pub duration_us: u64,
}

/// Entry of the flash dive log, in append order:
/// `Start`, then samples, then `End`.
#[derive(Debug, PartialEq, Serialize, Deserialize, Schema, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiveRecord {
    Start(DiveMetadata),
    Sample(DiveSample),
    End(DiveSummary),
}

/// Per-sensor polling configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Schema, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    pub address: u8,
    pub period_ms: u32,
}

/// Device configuration, fixed at build time for now.
#[derive(Debug, PartialEq, Serialize, Deserialize, Schema, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    pub pressure_temp: SensorConfig,
    pub temp_only: SensorConfig,
    /// Depth at which a dive session opens, m.
    pub dive_start_depth_m: f32,
    /// Time above the threshold before a session closes, ms.
    pub dive_end_hold_ms: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            pressure_temp: SensorConfig { address: 0x76, period_ms: 500 },
            temp_only: SensorConfig { address: 0x77, period_ms: 1000 },
            dive_start_depth_m: 0.5,
            dive_end_hold_ms: 30_000,
        }
    }
}
