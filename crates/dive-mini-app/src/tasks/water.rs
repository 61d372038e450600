//! Water-contact sensing on the exposed electrode pair.
//!
//! The electrodes sit on an ADC input; immersion pulls the reading down.
//! Calibration happens dry, at task start: the baseline is an average over
//! a short burst, the detect threshold a fixed percentage of it.

use crate::config::{WATER_CALIBRATION_SAMPLES, WATER_THRESHOLD_PCT};
use crate::prelude::*;

use dive_mini_bsp::WaterResources;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, GPIO4};
use esp_hal::Blocking;

type WaterAdc = Adc<'static, ADC1<'static>, Blocking>;
type WaterPin = AdcPin<GPIO4<'static>, ADC1<'static>>;

pub struct WaterSense {
    adc: WaterAdc,
    pin: WaterPin,
    baseline: u32,
    threshold: u32,
}

impl WaterSense {
    pub fn new(water: WaterResources) -> Self {
        let mut config = AdcConfig::new();
        let pin = config.enable_pin(water.electrode, Attenuation::_11dB);
        let adc = Adc::new(water.adc, config);
        Self { adc, pin, baseline: 0, threshold: 0 }
    }

    async fn read_raw(&mut self) -> u32 {
        loop {
            match self.adc.read_oneshot(&mut self.pin) {
                Ok(raw) => return raw as u32,
                Err(nb::Error::WouldBlock) => {
                    Timer::after_micros(50).await;
                }
                Err(nb::Error::Other(_)) => return 0,
            }
        }
    }

    /// Average a dry burst into the baseline and derive the threshold.
    pub async fn calibrate(&mut self) {
        let mut sum: u64 = 0;
        for _ in 0..WATER_CALIBRATION_SAMPLES {
            sum += self.read_raw().await as u64;
            Timer::after_millis(10).await;
        }
        self.baseline = (sum / WATER_CALIBRATION_SAMPLES as u64) as u32;
        self.threshold = self.baseline * WATER_THRESHOLD_PCT / 100;
        info!(
            "water sense: baseline={} threshold={}",
            self.baseline, self.threshold
        );
    }

    pub async fn is_present(&mut self) -> bool {
        self.read_raw().await < self.threshold
    }

    pub fn baseline(&self) -> u32 {
        self.baseline
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

/// Periodic wet/dry report while the device is awake.
#[embassy_executor::task]
pub async fn water_task(water: WaterResources, sender: EventSender) {
    let mut sense = WaterSense::new(water);
    sense.calibrate().await;

    let mut last = None;
    loop {
        let raw = sense.read_raw().await;
        let wet = raw < sense.threshold();
        info!("water raw={} wet={}", raw, wet);
        if last != Some(wet) {
            last = Some(wet);
            sender.send(WaterEvent::Present(wet).into()).await;
        }
        Timer::after_millis(1000).await;
    }
}
