use esp_hal::peripherals::Peripherals;

use crate::{
    ClockResources, LedResources, NetResources, PowerResources,
    SensorBusResources, WaterResources,
};

/// The dive-mini board, split into per-subsystem resources.
pub struct DiveMini {
    pub sensor_bus: SensorBusResources,
    pub water: WaterResources,
    pub led: LedResources,
    pub net: NetResources,
    pub power: PowerResources,
    pub clock: ClockResources,
}

impl DiveMini {
    /// Carve the peripheral set into subsystem resources.
    pub fn new(p: Peripherals) -> Self {
        Self {
            sensor_bus: SensorBusResources {
                i2c: p.I2C0,
                sda: p.GPIO8,
                scl: p.GPIO9,
            },
            water: WaterResources { adc: p.ADC1, electrode: p.GPIO4 },
            led: LedResources {
                ledc: p.LEDC,
                red: p.GPIO15,
                green: p.GPIO16,
                blue: p.GPIO17,
            },
            net: NetResources { wifi: p.WIFI },
            power: PowerResources {
                vbus: p.GPIO6,
                water_wake: p.GPIO5,
                lpwr: p.LPWR,
            },
            clock: ClockResources { timg0: p.TIMG0 },
        }
    }
}
