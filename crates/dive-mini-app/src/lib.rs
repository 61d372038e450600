#![no_std]
#![allow(async_fn_in_trait)]
extern crate alloc;

pub mod config;
pub mod events;
pub mod storage;
pub mod tasks;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_sync::signal::Signal;
use static_cell::StaticCell;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

// Event plumbing
const EVENT_CAPACITY: usize = 10;
pub type EventMutexType = CriticalSectionRawMutex;
pub type EventChannel = Channel<EventMutexType, events::Event, EVENT_CAPACITY>;
pub type EventSender =
    Sender<'static, EventMutexType, events::Event, EVENT_CAPACITY>;
pub type EventReceiver =
    Receiver<'static, EventMutexType, events::Event, EVENT_CAPACITY>;
static EVENT_CHANNEL: StaticCell<EventChannel> = StaticCell::new();

pub fn init_event_channel() -> (EventSender, EventReceiver) {
    let channel = EVENT_CHANNEL.init(Channel::new());
    (channel.sender(), channel.receiver())
}

/// Raised by the orchestrator when the wake-reason task has run its course;
/// main observes it and takes the device back to deep sleep.
pub static WORK_DONE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

pub mod prelude {
    pub use super::{
        config, init_event_channel, EventReceiver, EventSender, WORK_DONE,
        FW_VERSION,
    };
    pub use crate::events::*;
    pub use crate::storage::*;
    pub use crate::tasks::*;

    pub use defmt::{error, info, unwrap, warn, Debug2Format};
    pub use embassy_executor::Spawner;
    pub use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    pub use embassy_time::{with_timeout, Duration, Instant, Timer};

    pub use dive_mini_bsp::{
        DiveMini, LedResources, NetResources, PowerResources,
        SensorBusResources, WaterResources,
    };
    pub use dive_mini_icd::{self as icd, DeviceConfig};
}
