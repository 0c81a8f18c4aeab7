use std::sync::Arc;
use std::time::Duration;

use crate::models::device::DeviceInfo;
use crate::models::error::CaptureError;

/// One period's worth of input delivered by the driver.
///
/// Events arrive on a driver-owned real-time thread. Handlers must not
/// allocate, block indefinitely, or panic across this boundary.
#[derive(Debug, Clone, Copy)]
pub enum StreamEvent<'a> {
    /// A contiguous span of float32 little-endian PCM bytes.
    Data(&'a [u8]),
    /// A period with no data pointer; the given byte count should be
    /// zero-filled to keep block alignment.
    Silence(usize),
    /// Driver-reported overflow or stream error. Counted, never propagated.
    Error,
}

/// Callback invoked from the driver's real-time thread for every period.
pub type StreamEventCallback = Arc<dyn Fn(StreamEvent) + Send + Sync + 'static>;

/// Control surface for an open stream.
///
/// Dropping the box must stop delivery; `stop` must be safe to call while a
/// callback is mid-flight on the driver thread.
pub trait StreamControl: Send {
    fn stop(&mut self);
}

/// An open stream together with the format the driver actually negotiated.
pub struct OpenedStream {
    pub control: Box<dyn StreamControl>,
    pub sample_rate: u32,
    pub channel_count: usize,
    /// Negotiated latency; at least the requested target.
    pub latency: Duration,
}

/// Interface to a platform audio driver.
///
/// Implemented by backend crates (for example on top of cpal). The core
/// only talks to the driver through this seam, so tests can substitute a
/// scripted fake.
pub trait InputDriver {
    /// Enumerate input devices, default device first.
    fn devices(&self) -> Result<Vec<DeviceInfo>, CaptureError>;

    fn default_device_id(&self) -> Option<String>;

    /// Whether the system device list changed since the last call
    /// (hot-plug). Drivers without a notification mechanism return false.
    fn devices_changed(&mut self) -> bool {
        false
    }

    /// Open a capture stream on `device` at the best achievable latency, at
    /// least `target_latency`. Delivers events through `callback` on a
    /// driver-owned thread until the returned control is stopped/dropped.
    fn open_stream(
        &self,
        device: &DeviceInfo,
        target_latency: Duration,
        callback: StreamEventCallback,
    ) -> Result<OpenedStream, CaptureError>;
}
