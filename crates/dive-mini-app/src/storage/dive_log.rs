use core::ops::Range;

use dive_mini_icd::{DiveRecord, MAX_RECORD_BYTES};
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::queue::{QueueConfig, QueueStorage};

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiveLogError<E: core::fmt::Debug> {
    Storage(sequential_storage::Error<E>),
    Encoding(postcard::Error),
}

impl<E: core::fmt::Debug> From<sequential_storage::Error<E>>
    for DiveLogError<E>
{
    fn from(e: sequential_storage::Error<E>) -> Self {
        DiveLogError::Storage(e)
    }
}

impl<E: core::fmt::Debug> From<postcard::Error> for DiveLogError<E> {
    fn from(e: postcard::Error) -> Self {
        DiveLogError::Encoding(e)
    }
}

/// Append-order dive log in a reserved flash region.
///
/// Records go in as the acquisition produces them (`Start`, samples, `End`)
/// and come out oldest-first for upload. When the region fills up, the
/// oldest records are overwritten: recent dives win.
pub struct DiveLog<Flash: NorFlash> {
    queue: QueueStorage<Flash, NoCache>,
    buffer: [u8; MAX_RECORD_BYTES],
}

impl<Flash: NorFlash> DiveLog<Flash> {
    pub fn new(flash: Flash, region: Range<u32>) -> Self {
        let config = QueueConfig::new(region);
        Self {
            queue: QueueStorage::new(flash, config, NoCache::new()),
            buffer: [0; MAX_RECORD_BYTES],
        }
    }

    /// Append one record, overwriting the oldest when full.
    pub async fn append(
        &mut self,
        record: &DiveRecord,
    ) -> Result<(), DiveLogError<Flash::Error>> {
        let bytes = postcard::to_slice(record, &mut self.buffer)?;
        self.queue.push(bytes, true).await?;
        Ok(())
    }

    /// Remove and return the oldest record, if any.
    pub async fn pop(
        &mut self,
    ) -> Result<Option<DiveRecord>, DiveLogError<Flash::Error>> {
        match self.queue.pop(&mut self.buffer).await? {
            Some(bytes) => Ok(Some(postcard::from_bytes(bytes)?)),
            None => Ok(None),
        }
    }

    /// Look at the oldest record without consuming it.
    pub async fn peek(
        &mut self,
    ) -> Result<Option<DiveRecord>, DiveLogError<Flash::Error>> {
        match self.queue.peek(&mut self.buffer).await? {
            Some(bytes) => Ok(Some(postcard::from_bytes(bytes)?)),
            None => Ok(None),
        }
    }
}
