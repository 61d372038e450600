pub mod dive;
pub mod led;
pub mod sensors;
pub mod upload;
pub mod water;

// Re-exports
pub use dive::*;
pub use led::*;
pub use sensors::*;
pub use upload::*;
pub use water::*;
