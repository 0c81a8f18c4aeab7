//! # audio-reactive-core
//!
//! Platform-agnostic real-time audio capture and analysis engine.
//!
//! Captures live input through a backend-provided driver and exposes two
//! low-latency derived views: per-channel multiband amplitude levels and a
//! frequency-domain spectrum. Built for audio-reactive applications
//! (visualizers, level meters, spectrum displays) that poll once per frame.
//!
//! Platform backends implement the [`InputDriver`] trait and plug into the
//! generic [`DeviceRegistry`].
//!
//! ## Architecture
//!
//! ```text
//! audio-reactive-core (this crate)
//! ├── traits/       ← InputDriver, StreamControl, StreamEvent
//! ├── models/       ← CaptureError, CaptureConfig, DeviceInfo, StreamState
//! ├── processing/   ← RingBuffer, MultibandFilter, LevelMeter, FftBuffer, LogScaler
//! └── stream/       ← DeviceHandle (lazy stream state machine), DeviceRegistry
//! ```
//!
//! Two threads meet in this crate: the driver's real-time callback thread
//! writes PCM into a per-device ring buffer, and the consumer thread drains
//! it on every `update(dt)` tick. The shared critical section is a single
//! short `parking_lot::Mutex` held only for the byte copy.

pub mod models;
pub mod processing;
pub mod stream;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::CaptureConfig;
pub use models::device::DeviceInfo;
pub use models::error::CaptureError;
pub use models::state::StreamState;
pub use processing::fft_buffer::FftBuffer;
pub use processing::level_meter::{dbfs, LevelMeter};
pub use processing::log_scaler::LogScaler;
pub use processing::multiband_filter::MultibandFilter;
pub use processing::ring_buffer::RingBuffer;
pub use stream::device_handle::DeviceHandle;
pub use stream::registry::DeviceRegistry;
pub use traits::input_driver::{
    InputDriver, OpenedStream, StreamControl, StreamEvent, StreamEventCallback,
};
