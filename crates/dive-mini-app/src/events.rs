use crate::prelude::*;
use crate::tasks::led::{LedState, LED_CHAN};
use dive_mini_icd::DiveSummary;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiveEvent {
    Started,
    Ended(DiveSummary),
    /// The wake turned out to be spurious: no dive opened in time.
    NothingHappened,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UploadEvent {
    Connecting,
    Uploaded { dives: u32 },
    Failed,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaterEvent {
    Present(bool),
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Dive(DiveEvent),
    Upload(UploadEvent),
    Water(WaterEvent),
}

impl From<DiveEvent> for Event {
    fn from(e: DiveEvent) -> Self {
        Event::Dive(e)
    }
}

impl From<UploadEvent> for Event {
    fn from(e: UploadEvent) -> Self {
        Event::Upload(e)
    }
}

impl From<WaterEvent> for Event {
    fn from(e: WaterEvent) -> Self {
        Event::Water(e)
    }
}

/// Top-level event pump: keeps the LED honest and tells main when the
/// wake-reason work is finished.
#[embassy_executor::task]
pub async fn orchestrate(receiver: EventReceiver) {
    loop {
        match receiver.receive().await {
            Event::Dive(e) => match e {
                DiveEvent::Started => {
                    let _ = LED_CHAN.try_send(LedState::Diving);
                }
                DiveEvent::Ended(summary) => {
                    info!(
                        "dive ended: {} samples, max depth {} m",
                        summary.sample_count, summary.max_depth_m
                    );
                    let _ = LED_CHAN.try_send(LedState::Surface);
                    WORK_DONE.signal(());
                }
                DiveEvent::NothingHappened => {
                    let _ = LED_CHAN.try_send(LedState::Off);
                    WORK_DONE.signal(());
                }
            },
            Event::Upload(e) => match e {
                UploadEvent::Connecting => {
                    let _ = LED_CHAN.try_send(LedState::Connecting);
                }
                UploadEvent::Uploaded { dives } => {
                    info!("uploaded {} dives", dives);
                    let _ = LED_CHAN.try_send(LedState::Success);
                    WORK_DONE.signal(());
                }
                UploadEvent::Failed => {
                    let _ = LED_CHAN.try_send(LedState::Error);
                    WORK_DONE.signal(());
                }
            },
            Event::Water(WaterEvent::Present(wet)) => {
                info!("water contact: {}", wet);
            }
        }
    }
}
