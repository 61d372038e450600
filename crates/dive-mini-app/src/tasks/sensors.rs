//! Wiring of the acquisition subsystem: shared bus, capabilities, service.

use crate::prelude::*;

use bus_link::{BusHandle, BusLink};
use dive_mini_bsp::SensorBusResources;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::Async;
use sensor_service::{Capability, SensorService};
use static_cell::StaticCell;

#[cfg(not(feature = "sim"))]
use sensor_service::{PressureTempSensor, TempOnlySensor};
#[cfg(feature = "sim")]
use sensor_service::{SimPressureTempSensor, SimTempSensor};

pub const MAX_SENSORS: usize = 4;
pub const SAMPLE_QUEUE: usize = 16;

pub type SensorBus = I2c<'static, Async>;
pub type SensorBusLink = BusLink<CriticalSectionRawMutex, SensorBus>;
pub type AppCapability = Capability<
    BusHandle<'static, CriticalSectionRawMutex, SensorBus>,
    embassy_time::Delay,
    HwRng,
>;
pub type AppSensorService = SensorService<
    CriticalSectionRawMutex,
    AppCapability,
    MAX_SENSORS,
    SAMPLE_QUEUE,
>;

static BUS_LINK: StaticCell<SensorBusLink> = StaticCell::new();
pub static SENSOR_SERVICE: AppSensorService = SensorService::new();

/// Hardware RNG behind the `rand_core` seam the simulations expect.
pub struct HwRng(esp_hal::rng::Rng);

impl rand_core::RngCore for HwRng {
    fn next_u32(&mut self) -> u32 {
        self.0.random()
    }

    fn next_u64(&mut self) -> u64 {
        (self.0.random() as u64) << 32 | self.0.random() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let word = self.0.random().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
    }

    fn try_fill_bytes(
        &mut self,
        dest: &mut [u8],
    ) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Bring up the shared bus and register the capability set.
///
/// Which capabilities go in is decided here and only here: the physical
/// MS5837 + TSYS01 pair, or their simulated doubles with the `sim` feature.
pub fn init_sensors(
    bus: SensorBusResources,
    device_config: &DeviceConfig,
) -> &'static AppSensorService {
    let i2c = I2c::new(
        bus.i2c,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .expect("i2c configuration is static and valid")
    .with_sda(bus.sda)
    .with_scl(bus.scl)
    .into_async();

    let link = BUS_LINK.init(BusLink::new(i2c));

    #[cfg(not(feature = "sim"))]
    let (pressure_temp, temp_only): (AppCapability, AppCapability) = (
        Capability::PressureTemp(PressureTempSensor::with_address(
            link.handle(),
            embassy_time::Delay,
            device_config.pressure_temp.address,
        )),
        Capability::TempOnly(TempOnlySensor::with_address(
            link.handle(),
            embassy_time::Delay,
            device_config.temp_only.address,
        )),
    );

    #[cfg(feature = "sim")]
    let (pressure_temp, temp_only): (AppCapability, AppCapability) = (
        Capability::SimPressureTemp(SimPressureTempSensor::new(
            HwRng(esp_hal::rng::Rng::new()),
            config::SIM_TEMP_RANGE_C,
            config::SIM_PRESSURE_RANGE_BAR,
        )),
        Capability::SimTemp(SimTempSensor::new(
            HwRng(esp_hal::rng::Rng::new()),
            config::SIM_TEMP_RANGE_C,
        )),
    );

    unwrap!(SENSOR_SERVICE.add(
        pressure_temp,
        device_config.pressure_temp.period_ms as u64,
        "MS5837",
    ));
    unwrap!(SENSOR_SERVICE.add(
        temp_only,
        device_config.temp_only.period_ms as u64,
        "TSYS",
    ));

    &SENSOR_SERVICE
}

/// Dedicated task for the acquisition loop.
#[embassy_executor::task]
pub async fn sensor_service_task(service: &'static AppSensorService) {
    if let Err(e) = service.run().await {
        warn!("sensor service refused to start: {}", Debug2Format(&e));
    }
}
