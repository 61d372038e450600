use heapless::String;

/// Maximum length of a slot's short name, bytes.
pub const NAME_LEN: usize = 16;

/// One normalized environmental sample.
///
/// Sensors that measure only a subset leave the other fields at zero.
/// Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    pub temperature_c: f64,
    pub pressure_bar: f64,
    pub depth_m: f64,
    /// Monotonic timestamp, µs since boot.
    pub timestamp_us: u64,
}

impl Measurement {
    pub const fn zeroed(timestamp_us: u64) -> Self {
        Self {
            temperature_c: 0.0,
            pressure_bar: 0.0,
            depth_m: 0.0,
            timestamp_us,
        }
    }
}

/// Queue entry published by the acquisition loop for each successful read.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleMessage {
    /// Short name the slot was registered under.
    pub name: String<NAME_LEN>,
    pub measurement: Measurement,
}
