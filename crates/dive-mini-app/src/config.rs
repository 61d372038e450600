//! Build-time configuration.
//!
//! Site-specific values come from the environment at compile time
//! (`DIVE_WIFI_SSID`, `DIVE_WIFI_PASS`, `DIVE_UPLOAD_URL`); everything else
//! is a constant with the same defaults the hardware was qualified with.

use core::ops::Range;

pub const WIFI_SSID: &str = match option_env!("DIVE_WIFI_SSID") {
    Some(v) => v,
    None => "dive-base",
};

pub const WIFI_PASS: &str = match option_env!("DIVE_WIFI_PASS") {
    Some(v) => v,
    None => "dive-base-pass",
};

pub const UPLOAD_URL: &str = match option_env!("DIVE_UPLOAD_URL") {
    Some(v) => v,
    None => "http://192.168.4.2:8080/api/dives",
};

/// Hard ceiling on awake time before the device goes back to deep sleep.
pub const MAX_RUN_SECONDS: u64 = 300;

/// Wi-Fi association + DHCP budget.
pub const WIFI_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Whole-request budget for one upload POST.
pub const HTTP_TIMEOUT_MS: u64 = 8_000;

/// Water sense: reading below `baseline * WATER_THRESHOLD_PCT / 100` means
/// the electrodes are bridged.
pub const WATER_THRESHOLD_PCT: u32 = 70;
pub const WATER_CALIBRATION_SAMPLES: u32 = 20;

/// Flash region reserved for the dive log, past the application partitions.
pub const DIVE_LOG_FLASH: Range<u32> = 0x0031_0000..0x0039_0000;

/// Simulated sensor bounds (enabled with the `sim` feature).
pub const SIM_TEMP_RANGE_C: (f64, f64) = (4.0, 28.0);
pub const SIM_PRESSURE_RANGE_BAR: (f64, f64) = (0.95, 4.0);
