//! RGB status LED on three LEDC PWM channels.
//!
//! Common-anode part: duty is inverted at the last moment, the rest of the
//! code thinks in ordinary 0..=100 brightness.

use crate::prelude::*;

use dive_mini_bsp::LedResources;
use embassy_sync::channel::Channel;
use esp_hal::gpio::interconnect::PeripheralOutput;
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::time::Rate;

const COMMON_ANODE: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedState {
    Off,
    Surface,
    Diving,
    Connecting,
    Success,
    Error,
}

impl LedState {
    /// (r, g, b), percent.
    fn rgb(self) -> (u8, u8, u8) {
        match self {
            LedState::Off => (0, 0, 0),
            LedState::Surface => (0, 20, 5),
            LedState::Diving => (0, 0, 60),
            LedState::Connecting => (40, 25, 0),
            LedState::Success => (0, 60, 0),
            LedState::Error => (60, 0, 0),
        }
    }
}

/// Fire-and-forget state updates from anywhere in the app.
pub static LED_CHAN: Channel<CriticalSectionRawMutex, LedState, 4> =
    Channel::new();

fn set_duty(ch: &channel::Channel<'_, LowSpeed>, percent: u8) {
    let duty = if COMMON_ANODE { 100 - percent } else { percent };
    if let Err(e) = ch.set_duty(duty) {
        warn!("led duty: {}", Debug2Format(&e));
    }
}

#[embassy_executor::task]
pub async fn led_task(led: LedResources) {
    let mut ledc = Ledc::new(led.ledc);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

    let mut pwm_timer = ledc.timer::<LowSpeed>(timer::Number::Timer0);
    unwrap!(pwm_timer.configure(timer::config::Config {
        duty: timer::config::Duty::Duty8Bit,
        clock_source: timer::LSClockSource::APBClk,
        frequency: Rate::from_khz(5),
    }));

    let red = configure_channel(&ledc, &pwm_timer, channel::Number::Channel0, led.red);
    let green =
        configure_channel(&ledc, &pwm_timer, channel::Number::Channel1, led.green);
    let blue =
        configure_channel(&ledc, &pwm_timer, channel::Number::Channel2, led.blue);

    loop {
        let state = LED_CHAN.receive().await;
        let (r, g, b) = state.rgb();
        set_duty(&red, r);
        set_duty(&green, g);
        set_duty(&blue, b);
    }
}

fn configure_channel<'a>(
    ledc: &'a Ledc<'a>,
    pwm_timer: &'a timer::Timer<'a, LowSpeed>,
    number: channel::Number,
    pin: impl PeripheralOutput<'a>,
) -> channel::Channel<'a, LowSpeed> {
    let mut ch = ledc.channel(number, pin);
    unwrap!(ch.configure(channel::config::Config {
        timer: pwm_timer,
        duty_pct: if COMMON_ANODE { 100 } else { 0 },
        pin_config: channel::config::PinConfig::PushPull,
    }));
    ch
}
