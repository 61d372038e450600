mod dive_log;

pub use dive_log::{DiveLog, DiveLogError};

use embassy_embedded_hal::adapter::BlockingAsync;
use esp_storage::FlashStorage;

use crate::config::DIVE_LOG_FLASH;

/// The dive log as wired on this board: internal flash behind the async
/// adapter, over the reserved log region.
pub type AppDiveLog = DiveLog<BlockingAsync<FlashStorage>>;

pub fn open_dive_log() -> AppDiveLog {
    DiveLog::new(BlockingAsync::new(FlashStorage::new()), DIVE_LOG_FLASH)
}
