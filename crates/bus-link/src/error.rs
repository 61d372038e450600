use embedded_hal_async::i2c;

/// Errors reported by a bus transaction after retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<E> {
    /// The underlying bus rejected the transaction (NACK, arbitration loss, ...).
    Bus(E),
    /// The transaction did not complete within the configured timeout.
    Timeout,
}

impl<E: i2c::Error> i2c::Error for BusError<E> {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            BusError::Bus(e) => e.kind(),
            BusError::Timeout => i2c::ErrorKind::Other,
        }
    }
}
