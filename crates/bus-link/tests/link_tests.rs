use core::future::Future;
use core::pin::pin;
use core::pin::Pin;
use core::task::Poll;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use bus_link::{BusError, BusLink};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::{Duration, MockDriver};
use embedded_hal_async::i2c::{
    ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation,
};
use futures_test::task::noop_context;

// ---------------------------------------------------------------------------
// Mock bus
// ---------------------------------------------------------------------------

/// Shared knobs and counters for a [`MockBus`].
#[derive(Clone, Default)]
struct Script {
    /// Number of `transaction` calls observed.
    calls: Arc<AtomicU32>,
    /// Fail this many transactions before succeeding.
    fail_remaining: Arc<AtomicU32>,
    /// Transactions to this address always NACK.
    nack_address: Option<u8>,
    /// Never complete a transaction (exercises the timeout path).
    hang: bool,
}

impl Script {
    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

struct MockBus(Script);

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), ErrorKind> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        if self.0.hang {
            core::future::pending::<()>().await;
        }
        if self.0.nack_address == Some(address) {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        if self
            .0
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
        {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
        }
        for op in operations.iter_mut() {
            if let Operation::Read(buf) = op {
                buf.fill(0xAB);
            }
        }
        Ok(())
    }
}

type TestLink = BusLink<NoopRawMutex, MockBus>;

fn make_link(script: &Script) -> TestLink {
    BusLink::new(MockBus(script.clone()))
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

/// Poll `fut` to completion, advancing mock time 1 ms per pending poll.
fn run<F: Future>(mut fut: Pin<&mut F>, budget_ms: u64) -> F::Output {
    let mut cx = noop_context();
    for _ in 0..=budget_ms {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return out;
        }
        MockDriver::get().advance(Duration::from_millis(1));
    }
    panic!("future did not complete within {budget_ms}ms of mock time");
}

fn poll_once<F: Future>(fut: &mut Pin<&mut F>) -> Poll<F::Output> {
    fut.as_mut().poll(&mut noop_context())
}

fn advance(ms: u64) {
    MockDriver::get().advance(Duration::from_millis(ms));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn first_attempt_success_is_single_transaction() {
    let _t = time_lock();
    let script = Script::default();
    let link = make_link(&script);

    let mut handle = link.handle();
    let mut read = [0u8; 3];
    let res = {
        let fut = pin!(handle.transfer(0x76, &[0x00], &mut read));
        run(fut, 100)
    };

    assert!(res.is_ok());
    assert_eq!(read, [0xAB; 3]);
    assert_eq!(script.calls(), 1);
}

#[test]
fn transient_failure_is_absorbed_by_retry() {
    let _t = time_lock();
    let script = Script::default();
    script.fail_remaining.store(1, Ordering::SeqCst);
    let link = make_link(&script);

    let mut handle = link.handle();
    let mut read = [0u8; 2];
    let fut = pin!(handle.transfer(0x76, &[0xA0], &mut read));
    let res = run(fut, 100);

    assert!(res.is_ok());
    assert_eq!(script.calls(), 2);
}

#[test]
fn retries_stop_after_three_attempts() {
    let _t = time_lock();
    let script = Script { nack_address: Some(0x76), ..Script::default() };
    let link = make_link(&script);

    let mut handle = link.handle();
    let mut read = [0u8; 2];
    let fut = pin!(handle.transfer(0x76, &[0xA0], &mut read));
    let res = run(fut, 100);

    assert_eq!(
        res,
        Err(BusError::Bus(ErrorKind::NoAcknowledge(
            NoAcknowledgeSource::Address
        )))
    );
    assert_eq!(script.calls(), 3);
}

#[test]
fn backoff_doubles_between_attempts() {
    let _t = time_lock();
    let script = Script { nack_address: Some(0x76), ..Script::default() };
    let link = make_link(&script);

    let mut handle = link.handle();
    let mut fut = pin!(handle.write(0x76, &[0x1E]));

    // Attempt 0 fails immediately, then the 5ms backoff starts.
    assert!(poll_once(&mut fut).is_pending());
    assert_eq!(script.calls(), 1);

    advance(4);
    assert!(poll_once(&mut fut).is_pending());
    assert_eq!(script.calls(), 1);

    // 5ms elapsed: attempt 1 runs and fails, 10ms backoff starts.
    advance(1);
    assert!(poll_once(&mut fut).is_pending());
    assert_eq!(script.calls(), 2);

    advance(9);
    assert!(poll_once(&mut fut).is_pending());
    assert_eq!(script.calls(), 2);

    // 10ms elapsed: attempt 2 runs, fails, and the last status surfaces.
    advance(1);
    match poll_once(&mut fut) {
        Poll::Ready(Err(BusError::Bus(_))) => {}
        other => panic!("expected final bus error, got {other:?}"),
    }
    assert_eq!(script.calls(), 3);
}

#[test]
fn lock_is_free_during_backoff() {
    let _t = time_lock();
    // 0x76 always NACKs, 0x77 answers.
    let script = Script { nack_address: Some(0x76), ..Script::default() };
    let link = make_link(&script);

    let mut failing = link.handle();
    let mut fut_a = pin!(failing.write(0x76, &[0x1E]));

    // Drive A into its first backoff sleep.
    assert!(poll_once(&mut fut_a).is_pending());
    assert_eq!(script.calls(), 1);

    // While A is backing off, a transfer to the healthy device must go
    // straight through: the bus lock is not held across the sleep.
    let mut healthy = link.handle();
    let mut read = [0u8; 2];
    {
        let mut fut_b = pin!(healthy.transfer(0x77, &[0xA0], &mut read));
        match poll_once(&mut fut_b) {
            Poll::Ready(Ok(())) => {}
            other => panic!("expected immediate success, got {other:?}"),
        }
    }
    assert_eq!(read, [0xAB; 2]);
}

#[test]
fn hung_bus_times_out() {
    let _t = time_lock();
    let script = Script { hang: true, ..Script::default() };
    let link = make_link(&script);

    let mut handle = link.handle();
    let mut read = [0u8; 2];
    let fut = pin!(handle.transfer(0x76, &[0x00], &mut read));
    // 3 attempts x 20ms timeout + 5ms + 10ms backoff.
    let res = run(fut, 200);

    assert_eq!(res, Err(BusError::Timeout));
    assert_eq!(script.calls(), 3);
}

#[test]
fn empty_transfer_touches_nothing() {
    let _t = time_lock();
    let script = Script::default();
    let link = make_link(&script);

    let mut handle = link.handle();
    let fut = pin!(handle.transfer(0x76, &[], &mut []));
    assert!(run(fut, 10).is_ok());
    assert_eq!(script.calls(), 0);
}

#[test]
fn release_recovers_the_bus() {
    let _t = time_lock();
    let script = Script::default();
    let link = make_link(&script);
    let bus = link.release();
    assert_eq!(bus.0.calls(), 0);
}
