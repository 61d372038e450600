use esp_hal::peripherals::{
    ADC1, GPIO15, GPIO16, GPIO17, GPIO4, GPIO5, GPIO6, GPIO8, GPIO9, I2C0,
    LEDC, LPWR, TIMG0, WIFI,
};

/// The shared sensor bus: one I²C master, two sensors behind it.
pub struct SensorBusResources {
    pub i2c: I2C0<'static>,
    pub sda: GPIO8<'static>,
    pub scl: GPIO9<'static>,
}

/// Water-contact sensing: an exposed electrode pair on the ADC. The
/// comparator-buffered wake line lives in [`PowerResources`], where the
/// sleep configuration needs it.
pub struct WaterResources {
    pub adc: ADC1<'static>,
    pub electrode: GPIO4<'static>,
}

/// RGB status LED, one LEDC channel per color.
pub struct LedResources {
    pub ledc: LEDC<'static>,
    pub red: GPIO15<'static>,
    pub green: GPIO16<'static>,
    pub blue: GPIO17<'static>,
}

/// Wi-Fi radio.
pub struct NetResources {
    pub wifi: WIFI<'static>,
}

/// Power management: dock-power sense, the water wake line and the RTC
/// block for deep sleep.
pub struct PowerResources {
    pub vbus: GPIO6<'static>,
    pub water_wake: GPIO5<'static>,
    pub lpwr: LPWR<'static>,
}

/// Timer used to drive the embassy time driver.
pub struct ClockResources {
    pub timg0: TIMG0<'static>,
}
