use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration, Timer};
use embedded_hal_async::i2c::{ErrorType, I2c, Operation};

use crate::error::BusError;

/// Total attempts per transaction, including the first one.
const MAX_ATTEMPTS: u32 = 3;
/// Backoff after failed attempt `k` (0-indexed) is `BACKOFF_BASE_MS << k`.
const BACKOFF_BASE_MS: u64 = 5;
/// Default per-attempt transaction timeout.
const DEFAULT_TIMEOUT_MS: u64 = 20;

/// A shared bus plus its mutual-exclusion lock.
///
/// Owns the underlying I²C master for the awake lifetime of the device.
/// All sensors on the bus go through handles created with [`BusLink::handle`];
/// the lock guarantees at most one in-flight transaction at any instant.
pub struct BusLink<M: RawMutex, BUS> {
    bus: Mutex<M, BUS>,
    op_timeout: Duration,
}

impl<M: RawMutex, BUS> BusLink<M, BUS> {
    /// Wrap a configured bus peripheral with the default transaction timeout.
    pub const fn new(bus: BUS) -> Self {
        Self::with_timeout(bus, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Wrap a configured bus peripheral with an explicit per-attempt timeout.
    pub const fn with_timeout(bus: BUS, op_timeout: Duration) -> Self {
        Self { bus: Mutex::new(bus), op_timeout }
    }

    /// Create a device handle for issuing transactions on this bus.
    pub fn handle(&self) -> BusHandle<'_, M, BUS> {
        BusHandle { link: self }
    }

    /// Tear the link down and recover the bus peripheral.
    pub fn release(self) -> BUS {
        self.bus.into_inner()
    }
}

/// Per-device view of a [`BusLink`].
///
/// Implements [`I2c`], so any `embedded-hal-async` driver can sit on top of
/// the shared bus and transparently inherit locking, timeout and retry.
pub struct BusHandle<'a, M: RawMutex, BUS> {
    link: &'a BusLink<M, BUS>,
}

impl<'a, M: RawMutex, BUS: I2c> BusHandle<'a, M, BUS> {
    /// Issue a combined write-then-read transaction to `address`.
    ///
    /// An empty `read` makes this a plain write, an empty `write` a plain
    /// read. The transaction is attempted up to [`MAX_ATTEMPTS`] times; the
    /// bus lock is held only while an attempt is in flight, never across the
    /// inter-attempt backoff sleep. The last status is returned once retries
    /// are exhausted.
    pub async fn transfer(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), BusError<BUS::Error>> {
        match (write.is_empty(), read.is_empty()) {
            (false, false) => {
                let mut ops =
                    [Operation::Write(write), Operation::Read(read)];
                self.transaction(address, &mut ops).await
            }
            (false, true) => {
                let mut ops = [Operation::Write(write)];
                self.transaction(address, &mut ops).await
            }
            (true, false) => {
                let mut ops = [Operation::Read(read)];
                self.transaction(address, &mut ops).await
            }
            (true, true) => Ok(()),
        }
    }

    /// Write-only convenience over [`transfer`](Self::transfer).
    pub async fn write(
        &mut self,
        address: u8,
        bytes: &[u8],
    ) -> Result<(), BusError<BUS::Error>> {
        self.transfer(address, bytes, &mut []).await
    }
}

impl<M: RawMutex, BUS: I2c> ErrorType for BusHandle<'_, M, BUS> {
    type Error = BusError<BUS::Error>;
}

impl<M: RawMutex, BUS: I2c> I2c for BusHandle<'_, M, BUS> {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut attempt = 0;
        loop {
            let result = {
                let mut bus = self.link.bus.lock().await;
                match with_timeout(
                    self.link.op_timeout,
                    bus.transaction(address, operations),
                )
                .await
                {
                    Ok(res) => res.map_err(BusError::Bus),
                    Err(_) => Err(BusError::Timeout),
                }
                // Lock is dropped here, before any backoff sleep.
            };

            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_ATTEMPTS {
                        return Err(e);
                    }
                    Timer::after(Duration::from_millis(
                        BACKOFF_BASE_MS << (attempt - 1),
                    ))
                    .await;
                }
            }
        }
    }
}
