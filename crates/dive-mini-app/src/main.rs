#![no_std]
#![no_main]

use dive_mini_app::prelude::*;
use dive_mini_bsp::PowerResources;
use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Pull, RtcPinWithResistors};
use esp_hal::rtc_cntl::sleep::{Ext1WakeupSource, WakeupLevel};
use esp_hal::rtc_cntl::{wakeup_cause, Rtc, SleepSource};
use esp_hal::timer::timg::TimerGroup;
use esp_println as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Water contact woke us: go record a dive.
    Dive,
    /// Dock power woke us: connect and upload.
    Upload,
    /// Cold boot or spurious wake: straight back to sleep.
    Idle,
}

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 96 * 1024);

    let mut board = DiveMini::new(peripherals);
    let timg0 = TimerGroup::new(board.clock.timg0);
    esp_hal_embassy::init(timg0.timer0);

    info!("dive-mini {} up", FW_VERSION);

    let cause = wakeup_cause();
    info!("wake cause: {}", Debug2Format(&cause));

    // Both wake lines route through EXT1; the VBUS level tells them apart,
    // same as checking the sense pin right after wake.
    let mode = match cause {
        SleepSource::Ext1 => {
            let vbus = Input::new(
                board.power.vbus.reborrow(),
                InputConfig::default().with_pull(Pull::Down),
            );
            if vbus.is_high() {
                Mode::Upload
            } else {
                Mode::Dive
            }
        }
        _ => Mode::Idle,
    };

    let (sender, receiver) = init_event_channel();
    spawner.must_spawn(orchestrate(receiver));
    spawner.must_spawn(led_task(board.led));

    let device_config = DeviceConfig::default();
    match mode {
        Mode::Dive => {
            let service = init_sensors(board.sensor_bus, &device_config);
            spawner.must_spawn(sensor_service_task(service));
            spawner.must_spawn(water_task(board.water, sender));
            spawner.must_spawn(dive_task(service, device_config, sender));
        }
        Mode::Upload => {
            spawner.must_spawn(upload_task(board.net, sender));
        }
        Mode::Idle => {
            info!("nothing to do");
        }
    }

    if mode != Mode::Idle {
        if with_timeout(
            Duration::from_secs(config::MAX_RUN_SECONDS),
            WORK_DONE.wait(),
        )
        .await
        .is_err()
        {
            warn!("run budget exhausted ({}s)", config::MAX_RUN_SECONDS);
        }
    }

    // Quiesce acquisition before the lights go out; waits for the loop to
    // acknowledge, so the bus is idle when we cut power.
    SENSOR_SERVICE.stop().await;

    enter_deep_sleep(board.power);
}

fn enter_deep_sleep(power: PowerResources) -> ! {
    let mut rtc = Rtc::new(power.lpwr);
    let mut water_wake = power.water_wake;
    let mut vbus = power.vbus;

    let mut wakeup_pins: [(&mut dyn RtcPinWithResistors, WakeupLevel); 2] = [
        (&mut water_wake, WakeupLevel::High),
        (&mut vbus, WakeupLevel::High),
    ];
    let ext1 = Ext1WakeupSource::new(&mut wakeup_pins);

    info!("entering deep sleep");
    rtc.sleep_deep(&[&ext1]);
}
