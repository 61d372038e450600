use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use heapless::{String, Vec};
use portable_atomic::{AtomicU8, Ordering};

use crate::capability::Sensor;
use crate::fmt::Debug2Format;
use crate::measurement::{SampleMessage, NAME_LEN};

/// Error streak saturates here; it only feeds the backoff below.
const ERR_STREAK_CAP: u8 = 200;
/// Backoff for a failing slot is `ERR_BACKOFF_STEP_MS * min(streak, MAX_STEPS)`.
const ERR_BACKOFF_STEP_MS: u64 = 50;
const ERR_BACKOFF_MAX_STEPS: u8 = 10;
/// Wake-up fallback when nothing is due sooner.
const IDLE_FALLBACK: Duration = Duration::from_millis(1000);

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPING: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServiceError {
    /// The acquisition loop is already running.
    AlreadyRunning,
    /// All polling slots are taken.
    SlotsFull,
    /// A polling period of zero makes no sense.
    ZeroPeriod,
}

struct Slot<S> {
    sensor: S,
    period: Duration,
    next_due: Instant,
    err_streak: u8,
    name: String<NAME_LEN>,
}

/// Periodic acquisition service over a fixed set of polling slots.
///
/// Register capabilities with [`add`](Self::add), then drive [`run`](Self::run)
/// from a dedicated task. Successful reads are published into a bounded
/// queue obtained via [`receiver`](Self::receiver); when the queue is full
/// the newest sample is dropped without ever blocking the loop.
pub struct SensorService<M: RawMutex, S, const SLOTS: usize, const QUEUE: usize>
{
    slots: Mutex<M, Vec<Slot<S>, SLOTS>>,
    samples: Channel<M, SampleMessage, QUEUE>,
    state: AtomicU8,
    stop: Signal<M, ()>,
    done: Signal<M, ()>,
}

impl<M: RawMutex, S: Sensor, const SLOTS: usize, const QUEUE: usize> Default
    for SensorService<M, S, SLOTS, QUEUE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex, S: Sensor, const SLOTS: usize, const QUEUE: usize>
    SensorService<M, S, SLOTS, QUEUE>
{
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            samples: Channel::new(),
            state: AtomicU8::new(STATE_IDLE),
            stop: Signal::new(),
            done: Signal::new(),
        }
    }

    /// Register a capability to be polled every `period_ms` milliseconds.
    ///
    /// Names longer than [`NAME_LEN`] bytes are truncated. Registration is
    /// only possible while the loop is not running.
    pub fn add(
        &self,
        sensor: S,
        period_ms: u64,
        name: &str,
    ) -> Result<(), ServiceError> {
        if period_ms == 0 {
            return Err(ServiceError::ZeroPeriod);
        }
        let mut slots =
            self.slots.try_lock().map_err(|_| ServiceError::AlreadyRunning)?;

        let mut short = String::new();
        for ch in name.chars() {
            if short.push(ch).is_err() {
                break;
            }
        }

        slots
            .push(Slot {
                sensor,
                period: Duration::from_millis(period_ms),
                next_due: Instant::now(),
                err_streak: 0,
                name: short,
            })
            .map_err(|_| ServiceError::SlotsFull)?;
        Ok(())
    }

    /// The acquisition loop. Spawn this from a dedicated task.
    ///
    /// Returns `AlreadyRunning` immediately if a loop is active (double-start
    /// guard); otherwise runs until [`stop`](Self::stop) is requested, then
    /// puts every capability to sleep best-effort and acknowledges shutdown.
    pub async fn run(&self) -> Result<(), ServiceError> {
        if self
            .state
            .compare_exchange(
                STATE_IDLE,
                STATE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(ServiceError::AlreadyRunning);
        }
        self.stop.reset();

        // The loop owns the slot table for its whole lifetime; `add` is
        // rejected while we hold this lock.
        let mut slots = self.slots.lock().await;

        // Startup pass: bring every sensor up and poll it immediately.
        // Init failures are not fatal, the sensor retries lazily on read.
        for slot in slots.iter_mut() {
            if let Err(e) = slot.sensor.init().await {
                warn_log!(
                    "[{}] init failed: {}",
                    slot.name.as_str(),
                    Debug2Format(&e)
                );
            }
            slot.next_due = Instant::now();
        }

        loop {
            let now = Instant::now();
            let mut next = now + IDLE_FALLBACK;

            for slot in slots.iter_mut() {
                if slot.next_due <= now {
                    match slot.sensor.read().await {
                        Ok(measurement) => {
                            slot.err_streak = 0;
                            let msg = SampleMessage {
                                name: slot.name.clone(),
                                measurement,
                            };
                            // Queue full drops the newest sample; the loop
                            // never waits on the consumer.
                            let _ = self.samples.try_send(msg);
                            slot.next_due = now + slot.period;
                        }
                        Err(e) => {
                            if slot.err_streak < ERR_STREAK_CAP {
                                slot.err_streak += 1;
                            }
                            warn_log!(
                                "[{}] read err({}): {}",
                                slot.name.as_str(),
                                slot.err_streak,
                                Debug2Format(&e)
                            );
                            let steps =
                                slot.err_streak.min(ERR_BACKOFF_MAX_STEPS);
                            slot.next_due = now
                                + Duration::from_millis(
                                    ERR_BACKOFF_STEP_MS * steps as u64,
                                );
                        }
                    }
                }
                if slot.next_due < next {
                    next = slot.next_due;
                }
            }

            let wake = next.max(Instant::now() + Duration::from_ticks(1));
            match select(Timer::at(wake), self.stop.wait()).await {
                Either::First(()) => {
                    if self.state.load(Ordering::Acquire) != STATE_RUNNING {
                        break;
                    }
                }
                Either::Second(()) => break,
            }
        }

        for slot in slots.iter_mut() {
            let _ = slot.sensor.sleep().await;
        }
        drop(slots);

        self.state.store(STATE_IDLE, Ordering::Release);
        self.done.signal(());
        Ok(())
    }

    /// Request shutdown and wait until the loop has acknowledged it.
    ///
    /// No-op if the loop is not running. After this returns, the slot table
    /// may be extended again and `run` may be restarted.
    pub async fn stop(&self) {
        if self
            .state
            .compare_exchange(
                STATE_RUNNING,
                STATE_STOPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }
        self.done.reset();
        self.stop.signal(());
        self.done.wait().await;
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_RUNNING
    }

    /// Consumer endpoint of the sample queue.
    pub fn receiver(&self) -> Receiver<'_, M, SampleMessage, QUEUE> {
        self.samples.receiver()
    }
}
