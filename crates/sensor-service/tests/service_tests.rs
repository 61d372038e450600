use core::future::Future;
use core::pin::{pin, Pin};
use core::task::Poll;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Duration, MockDriver};
use futures_test::task::noop_context;
use sensor_service::{
    Measurement, Sensor, SensorService, ServiceError,
};

// ---------------------------------------------------------------------------
// Mock sensor
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct MockError;

/// Shared counters and failure knobs for a [`MockSensor`].
#[derive(Clone, Default)]
struct Script {
    inits: Arc<AtomicU32>,
    reads: Arc<AtomicU32>,
    sleeps: Arc<AtomicU32>,
    /// Fail this many reads before succeeding again.
    fail_reads: Arc<AtomicU32>,
    fail_init: bool,
}

impl Script {
    fn failing_forever() -> Self {
        let s = Script::default();
        s.fail_reads.store(u32::MAX, Ordering::SeqCst);
        s
    }

    fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

struct MockSensor(Script);

impl Sensor for MockSensor {
    type Error = MockError;

    async fn init(&mut self) -> Result<(), MockError> {
        self.0.inits.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_init {
            return Err(MockError);
        }
        Ok(())
    }

    async fn read(&mut self) -> Result<Measurement, MockError> {
        self.0.reads.fetch_add(1, Ordering::SeqCst);
        if self
            .0
            .fail_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
        {
            return Err(MockError);
        }
        Ok(Measurement {
            temperature_c: 21.5,
            pressure_bar: 1.1,
            depth_m: 0.0,
            timestamp_us: embassy_time::Instant::now().as_micros(),
        })
    }

    async fn sleep(&mut self) -> Result<(), MockError> {
        self.0.sleeps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Virtual-time harness
// ---------------------------------------------------------------------------

/// The mock time driver is process-global; serialize the tests that drive it.
fn time_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<StdMutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| StdMutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// Poll `fut` once, then advance mock time by 1 ms, `ms` times over.
///
/// The scheduler loop is woken by polling, so one poll per simulated
/// millisecond gives it a chance to service everything that came due.
fn pump<F: Future>(fut: &mut Pin<&mut F>, ms: u64) {
    let mut cx = noop_context();
    for _ in 0..ms {
        let _ = fut.as_mut().poll(&mut cx);
        MockDriver::get().advance(Duration::from_millis(1));
    }
    let _ = fut.as_mut().poll(&mut cx);
}

fn poll_once<F: Future>(fut: &mut Pin<&mut F>) -> Poll<F::Output> {
    fut.as_mut().poll(&mut noop_context())
}

type Service<const SLOTS: usize, const QUEUE: usize> =
    SensorService<NoopRawMutex, MockSensor, SLOTS, QUEUE>;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[test]
fn zero_period_is_rejected() {
    let svc: Service<2, 4> = SensorService::new();
    assert_eq!(
        svc.add(MockSensor(Script::default()), 0, "A"),
        Err(ServiceError::ZeroPeriod)
    );
}

#[test]
fn capacity_is_bounded() {
    let svc: Service<2, 4> = SensorService::new();
    svc.add(MockSensor(Script::default()), 100, "A").unwrap();
    svc.add(MockSensor(Script::default()), 100, "B").unwrap();
    assert_eq!(
        svc.add(MockSensor(Script::default()), 100, "C"),
        Err(ServiceError::SlotsFull)
    );
}

#[test]
fn long_names_are_truncated() {
    let _t = time_lock();
    let svc: Service<2, 4> = SensorService::new();
    svc.add(
        MockSensor(Script::default()),
        100,
        "a-name-that-does-not-fit",
    )
    .unwrap();

    let mut run = pin!(svc.run());
    pump(&mut run, 1);

    let msg = svc.receiver().try_receive().unwrap();
    assert_eq!(msg.name.as_str(), "a-name-that-does");
}

// ---------------------------------------------------------------------------
// Loop behavior
// ---------------------------------------------------------------------------

#[test]
fn second_run_is_rejected_without_spawning() {
    let _t = time_lock();
    let script = Script::default();
    let svc: Service<2, 4> = SensorService::new();
    svc.add(MockSensor(script.clone()), 100, "A").unwrap();

    let mut first = pin!(svc.run());
    assert!(poll_once(&mut first).is_pending());
    assert!(svc.is_running());

    let mut second = pin!(svc.run());
    match poll_once(&mut second) {
        Poll::Ready(Err(ServiceError::AlreadyRunning)) => {}
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }

    // The rejected call must not have perturbed the live loop.
    pump(&mut first, 100);
    assert_eq!(script.reads(), 2); // t=0 and t=100
}

#[test]
fn add_is_rejected_while_running() {
    let _t = time_lock();
    let svc: Service<2, 4> = SensorService::new();
    svc.add(MockSensor(Script::default()), 100, "A").unwrap();

    let mut run = pin!(svc.run());
    assert!(poll_once(&mut run).is_pending());

    assert_eq!(
        svc.add(MockSensor(Script::default()), 100, "B"),
        Err(ServiceError::AlreadyRunning)
    );
}

#[test]
fn init_failure_is_not_fatal() {
    let _t = time_lock();
    let script = Script { fail_init: true, ..Script::default() };
    let svc: Service<2, 4> = SensorService::new();
    svc.add(MockSensor(script.clone()), 100, "A").unwrap();

    let mut run = pin!(svc.run());
    pump(&mut run, 10);

    // Startup init failed but the slot is still polled.
    assert_eq!(script.inits.load(Ordering::SeqCst), 1);
    assert!(script.reads() >= 1);
}

#[test]
fn failing_slot_backs_off_while_healthy_slot_keeps_period() {
    let _t = time_lock();
    let failing = Script::failing_forever();
    let healthy = Script::default();

    let svc: Service<4, 16> = SensorService::new();
    svc.add(MockSensor(failing.clone()), 500, "bad").unwrap();
    svc.add(MockSensor(healthy.clone()), 200, "good").unwrap();

    let mut run = pin!(svc.run());

    // Failure schedule: reads at t = 0, 50, 150, 300, 500 (streaks 1..=5,
    // backoff 50*min(streak,10) ms), never the 500 ms nominal period.
    pump(&mut run, 49);
    assert_eq!(failing.reads(), 1);
    pump(&mut run, 1); // t=50
    assert_eq!(failing.reads(), 2);
    pump(&mut run, 99); // t=149
    assert_eq!(failing.reads(), 2);
    pump(&mut run, 1); // t=150
    assert_eq!(failing.reads(), 3);
    pump(&mut run, 150); // t=300
    assert_eq!(failing.reads(), 4);
    pump(&mut run, 200); // t=500
    assert_eq!(failing.reads(), 5);

    // The healthy slot is untouched by its neighbor's backoff: t=0..=500
    // at 200 ms nominal period.
    assert_eq!(healthy.reads(), 3); // t = 0, 200, 400
}

#[test]
fn backoff_is_capped_at_ten_steps() {
    let _t = time_lock();
    let failing = Script::failing_forever();
    let svc: Service<2, 4> = SensorService::new();
    svc.add(MockSensor(failing.clone()), 60_000, "bad").unwrap();

    let mut run = pin!(svc.run());

    // Cumulative due times: 0, 50, 150, 300, 500, 750, 1050, 1400, 1800,
    // 2250, then every 500 ms once the streak passes ten.
    pump(&mut run, 2250);
    assert_eq!(failing.reads(), 10);
    pump(&mut run, 500); // t=2750
    assert_eq!(failing.reads(), 11);
    pump(&mut run, 499); // t=3249
    assert_eq!(failing.reads(), 11);
    pump(&mut run, 1); // t=3250
    assert_eq!(failing.reads(), 12);
}

#[test]
fn queue_overflow_drops_newest_without_stalling() {
    let _t = time_lock();
    let a = Script::default();
    let b = Script::default();

    // Queue of one: in the very first iteration A's sample fits, B's is
    // dropped, and the loop still services B.
    let svc: Service<2, 1> = SensorService::new();
    svc.add(MockSensor(a.clone()), 100, "A").unwrap();
    svc.add(MockSensor(b.clone()), 100, "B").unwrap();

    let mut run = pin!(svc.run());
    pump(&mut run, 1);

    assert_eq!(a.reads(), 1);
    assert_eq!(b.reads(), 1);

    let rx = svc.receiver();
    assert_eq!(rx.try_receive().unwrap().name.as_str(), "A");
    assert!(rx.try_receive().is_err());
}

#[test]
fn recovery_resets_the_error_streak() {
    let _t = time_lock();
    let script = Script::default();
    script.fail_reads.store(2, Ordering::SeqCst);

    let svc: Service<2, 8> = SensorService::new();
    svc.add(MockSensor(script.clone()), 400, "A").unwrap();

    let mut run = pin!(svc.run());

    // t=0 fail (streak 1), t=50 fail (streak 2), t=150 success -> nominal
    // period resumes from there.
    pump(&mut run, 150);
    assert_eq!(script.reads(), 3);
    pump(&mut run, 399); // t=549
    assert_eq!(script.reads(), 3);
    pump(&mut run, 1); // t=550
    assert_eq!(script.reads(), 4);
}

#[test]
fn stop_waits_for_acknowledgement_and_sleeps_sensors() {
    let _t = time_lock();
    let a = Script::default();
    let b = Script::default();
    let svc: Service<2, 8> = SensorService::new();
    svc.add(MockSensor(a.clone()), 100, "A").unwrap();
    svc.add(MockSensor(b.clone()), 100, "B").unwrap();

    let mut run = pin!(svc.run());
    pump(&mut run, 10);
    assert!(svc.is_running());

    let mut stop = pin!(svc.stop());
    assert!(poll_once(&mut stop).is_pending());

    // The loop observes the request, sleeps every capability, then
    // acknowledges; only after that does stop() return.
    match poll_once(&mut run) {
        Poll::Ready(Ok(())) => {}
        other => panic!("expected loop exit, got {other:?}"),
    }
    assert!(poll_once(&mut stop).is_ready());

    assert_eq!(a.sleeps(), 1);
    assert_eq!(b.sleeps(), 1);
    assert!(!svc.is_running());

    // The service is reusable after a clean shutdown.
    svc.add(MockSensor(Script::default()), 100, "C").unwrap();
}

#[test]
fn stop_without_running_loop_is_a_noop() {
    let _t = time_lock();
    let svc: Service<2, 4> = SensorService::new();
    let mut stop = pin!(svc.stop());
    assert!(poll_once(&mut stop).is_ready());
}

#[test]
fn slots_are_serviced_in_registration_order() {
    let _t = time_lock();
    let a = Script::default();
    let b = Script::default();

    let svc: Service<2, 16> = SensorService::new();
    svc.add(MockSensor(a.clone()), 500, "A").unwrap();
    svc.add(MockSensor(b.clone()), 1000, "B").unwrap();

    let base = embassy_time::Instant::now().as_micros();
    let mut run = pin!(svc.run());
    pump(&mut run, 1000);

    // Startup pass at t=0 services both slots, then A fires at 500 and
    // 1000, B at 1000. A's second due time ties with B's first at exactly
    // 1000; registration order resolves the tie in A's favor.
    let expected =
        [("A", 0), ("B", 0), ("A", 500_000), ("A", 1_000_000), ("B", 1_000_000)];

    let rx = svc.receiver();
    for (name, offset_us) in expected {
        let msg = rx.try_receive().expect("missing sample");
        assert_eq!(msg.name.as_str(), name);
        assert_eq!(msg.measurement.timestamp_us, base + offset_us);
    }
    assert!(rx.try_receive().is_err());
}
