//! cpal-backed implementation of the core's `InputDriver` seam.
//!
//! cpal streams are not `Send`, so each open stream lives on a dedicated
//! thread that builds it, reports the negotiated format back, and parks
//! until told to stop. The audio callback itself runs on cpal's own
//! real-time thread and only forwards byte spans to the core.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use audio_reactive_core::models::device::DeviceInfo;
use audio_reactive_core::models::error::CaptureError;
use audio_reactive_core::traits::input_driver::{
    InputDriver, OpenedStream, StreamControl, StreamEvent, StreamEventCallback,
};

/// Audio input driver on top of the system's default cpal host.
///
/// Device identity is the cpal device name; cpal exposes no more stable id.
pub struct CpalDriver {
    host: cpal::Host,
}

impl CpalDriver {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDriver for CpalDriver {
    fn devices(&self) -> Result<Vec<DeviceInfo>, CaptureError> {
        let default_name = self
            .host
            .default_input_device()
            .and_then(|d| d.name().ok());

        let mut devices = Vec::new();
        let iter = self
            .host
            .input_devices()
            .map_err(|e| CaptureError::Backend(format!("device enumeration failed: {e}")))?;

        for device in iter {
            let name = match device.name() {
                Ok(name) => name,
                Err(_) => continue,
            };

            // A device without a default input config cannot back a
            // capture stream; report it as unusable rather than hiding it.
            let (channel_count, sample_rate, is_usable) = match device.default_input_config() {
                Ok(config) => (
                    config.channels() as usize,
                    config.sample_rate().0,
                    config.channels() > 0,
                ),
                Err(_) => (0, 0, false),
            };

            devices.push(DeviceInfo {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
                channel_count,
                sample_rate,
                is_usable,
            });
        }

        // Default device first, everything else in enumeration order.
        if let Some(pos) = devices.iter().position(|d| d.is_default) {
            devices[..=pos].rotate_right(1);
        }
        Ok(devices)
    }

    fn default_device_id(&self) -> Option<String> {
        self.host.default_input_device().and_then(|d| d.name().ok())
    }

    fn open_stream(
        &self,
        device: &DeviceInfo,
        target_latency: Duration,
        callback: StreamEventCallback,
    ) -> Result<OpenedStream, CaptureError> {
        let device_id = device.id.clone();
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(format!("cpal-input:{device_id}"))
            .spawn(move || stream_thread(device_id, callback, ready_tx, stop_rx))
            .map_err(|e| CaptureError::Backend(format!("failed to spawn stream thread: {e}")))?;

        // The thread reports the negotiated format once the stream plays.
        let format = match ready_rx.recv() {
            Ok(Ok(format)) => format,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(err);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(CaptureError::StreamOpenFailed(
                    "stream thread exited before reporting".into(),
                ));
            }
        };

        Ok(OpenedStream {
            control: Box::new(CpalStreamControl {
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            }),
            sample_rate: format.sample_rate,
            channel_count: format.channel_count,
            // cpal gives no portable latency readback; the requested target
            // is the best available estimate.
            latency: target_latency,
        })
    }
}

struct NegotiatedFormat {
    sample_rate: u32,
    channel_count: usize,
}

struct CpalStreamControl {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl StreamControl for CpalStreamControl {
    fn stop(&mut self) {
        // Dropping the sender unparks the stream thread.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CpalStreamControl {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the cpal stream for its whole lifetime; exits when the stop sender
/// is dropped.
fn stream_thread(
    device_id: String,
    callback: StreamEventCallback,
    ready_tx: mpsc::Sender<Result<NegotiatedFormat, CaptureError>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let stream = match build_stream(&device_id, callback) {
        Ok((stream, format)) => {
            let _ = ready_tx.send(Ok(format));
            stream
        }
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    // Park until the control side hangs up.
    let _ = stop_rx.recv();
    drop(stream);
}

fn build_stream(
    device_id: &str,
    callback: StreamEventCallback,
) -> Result<(cpal::Stream, NegotiatedFormat), CaptureError> {
    let host = cpal::default_host();
    let device = host
        .input_devices()
        .map_err(|e| CaptureError::Backend(format!("device enumeration failed: {e}")))?
        .find(|d| d.name().map(|n| n == device_id).unwrap_or(false))
        .ok_or(CaptureError::DeviceNotAvailable)?;

    let config = find_f32_config(&device)?;
    let format = NegotiatedFormat {
        sample_rate: config.sample_rate().0,
        channel_count: config.channels() as usize,
    };

    let data_callback = {
        let callback = callback.clone();
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            callback(StreamEvent::Data(bytemuck::cast_slice(data)));
        }
    };
    let error_callback = move |err: cpal::StreamError| {
        log::warn!("cpal stream error: {err}");
        callback(StreamEvent::Error);
    };

    let stream = device
        .build_input_stream(&config.into(), data_callback, error_callback, None)
        .map_err(|e| CaptureError::StreamOpenFailed(e.to_string()))?;
    stream
        .play()
        .map_err(|e| CaptureError::StreamOpenFailed(e.to_string()))?;

    Ok((stream, format))
}

/// Pick a float32 input config, preferring the device default.
fn find_f32_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig, CaptureError> {
    let default = device
        .default_input_config()
        .map_err(|e| CaptureError::StreamOpenFailed(format!("no input config: {e}")))?;
    if default.sample_format() == SampleFormat::F32 {
        return Ok(default);
    }

    device
        .supported_input_configs()
        .map_err(|e| CaptureError::StreamOpenFailed(e.to_string()))?
        .find(|c| c.sample_format() == SampleFormat::F32)
        .map(|c| c.with_max_sample_rate())
        .ok_or_else(|| {
            CaptureError::StreamOpenFailed("device offers no float32 format".into())
        })
}
