use thiserror::Error;

/// Errors that can occur while constructing analysis objects or managing
/// capture streams.
///
/// Real-time callback failures (overflow, driver-reported stream errors)
/// are deliberately absent: they are counted and logged, never propagated
/// across the callback boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("ring buffer capacity must be non-zero")]
    InvalidBufferCapacity,

    #[error("FFT width must be a power of two >= 4, got {0}")]
    InvalidFftWidth(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("device has no usable channel layout")]
    NoChannelLayout,

    #[error("failed to open stream: {0}")]
    StreamOpenFailed(String),

    #[error("backend error: {0}")]
    Backend(String),
}
