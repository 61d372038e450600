//! Dive session recording: consumes the sample queue, opens a session when
//! the puck goes under, streams samples to the flash log, closes the session
//! once it has been back at the surface long enough.

use crate::prelude::*;
use crate::storage::open_dive_log;
use crate::tasks::sensors::AppSensorService;

use dive_mini_icd::{DiveMetadata, DiveRecord, DiveSample, DiveSummary};
use sensor_service::SampleMessage;

/// Give up and go back to sleep if nothing dives for this long.
const IDLE_GIVE_UP_MS: u64 = 60_000;

struct Session {
    started_at_us: u64,
    sample_count: u32,
    max_depth_m: f32,
    /// Set while the depth is back above the close threshold.
    surfaced_since: Option<Instant>,
    /// Latest depth from the pressure sensor; temperature-only samples
    /// recorded while submerged reuse it.
    last_depth_m: f32,
}

#[embassy_executor::task]
pub async fn dive_task(
    service: &'static AppSensorService,
    device_config: DeviceConfig,
    sender: EventSender,
) {
    let mut log = open_dive_log();
    let receiver = service.receiver();
    let woke_at = Instant::now();
    let mut session: Option<Session> = None;

    loop {
        let msg = receiver.receive().await;

        match &mut session {
            None => {
                if has_depth(&msg)
                    && msg.measurement.depth_m
                        > device_config.dive_start_depth_m as f64
                {
                    let meta = DiveMetadata::with_sequence(
                        (msg.measurement.timestamp_us / 1_000_000) as u32,
                    );
                    info!("dive start: {}", meta.id.as_str());
                    if let Err(e) =
                        log.append(&DiveRecord::Start(meta)).await
                    {
                        warn!("dive log start: {}", Debug2Format(&e));
                    }
                    let mut s = Session {
                        started_at_us: msg.measurement.timestamp_us,
                        sample_count: 0,
                        max_depth_m: 0.0,
                        surfaced_since: None,
                        last_depth_m: 0.0,
                    };
                    record_sample(&mut log, &mut s, &msg).await;
                    session = Some(s);
                    sender.send(DiveEvent::Started.into()).await;
                } else if woke_at.elapsed()
                    > Duration::from_millis(IDLE_GIVE_UP_MS)
                {
                    info!("no dive detected, giving up");
                    sender.send(DiveEvent::NothingHappened.into()).await;
                    return;
                }
            }
            Some(s) => {
                record_sample(&mut log, s, &msg).await;

                if has_depth(&msg) {
                    let submerged = msg.measurement.depth_m
                        > device_config.dive_start_depth_m as f64;
                    if submerged {
                        s.surfaced_since = None;
                    } else if s.surfaced_since.is_none() {
                        s.surfaced_since = Some(Instant::now());
                    }
                }

                let closed = s.surfaced_since.is_some_and(|t| {
                    t.elapsed()
                        > Duration::from_millis(
                            device_config.dive_end_hold_ms as u64,
                        )
                });
                if closed {
                    let summary = DiveSummary {
                        sample_count: s.sample_count,
                        max_depth_m: s.max_depth_m,
                        duration_us: msg
                            .measurement
                            .timestamp_us
                            .saturating_sub(s.started_at_us),
                    };
                    if let Err(e) =
                        log.append(&DiveRecord::End(summary)).await
                    {
                        warn!("dive log end: {}", Debug2Format(&e));
                    }
                    session = None;
                    sender.send(DiveEvent::Ended(summary).into()).await;
                    return;
                }
            }
        }
    }
}

/// Pressure-bearing samples carry a meaningful depth; temperature-only
/// slots report exactly zero pressure.
fn has_depth(msg: &SampleMessage) -> bool {
    msg.measurement.pressure_bar != 0.0
}

async fn record_sample(
    log: &mut crate::storage::AppDiveLog,
    session: &mut Session,
    msg: &SampleMessage,
) {
    let depth = if has_depth(msg) {
        session.last_depth_m = msg.measurement.depth_m as f32;
        msg.measurement.depth_m as f32
    } else {
        session.last_depth_m
    };

    let sample = DiveSample {
        timestamp_us: msg.measurement.timestamp_us,
        temperature_c: msg.measurement.temperature_c as f32,
        pressure_bar: msg.measurement.pressure_bar as f32,
        depth_m: depth,
    };
    if let Err(e) = log.append(&DiveRecord::Sample(sample)).await {
        warn!("dive log sample: {}", Debug2Format(&e));
    }

    session.sample_count += 1;
    if depth > session.max_depth_m {
        session.max_depth_m = depth;
    }
}
