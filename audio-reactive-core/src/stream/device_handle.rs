use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::config::CaptureConfig;
use crate::models::device::DeviceInfo;
use crate::models::error::CaptureError;
use crate::models::state::StreamState;
use crate::processing::fft_buffer::FftBuffer;
use crate::processing::level_meter::LevelMeter;
use crate::processing::log_scaler::LogScaler;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::input_driver::{InputDriver, StreamControl, StreamEvent, StreamEventCallback};

const BYTES_PER_SAMPLE: usize = std::mem::size_of::<f32>();

/// State shared between the driver callback thread and the consumer thread.
///
/// The lock is held only long enough to move bytes; the callback side never
/// allocates while holding it.
struct SharedCapture {
    ring: RingBuffer,
    callback_errors: u64,
}

/// Everything that only exists while a stream is open. Dropped as a unit on
/// close and lazily rebuilt by the next open.
struct ActiveStream {
    control: Box<dyn StreamControl>,
    shared: Arc<Mutex<SharedCapture>>,
    sample_rate: u32,
    channel_count: usize,
    /// Staging buffer for the last tick's PCM; reads from the ring land
    /// here. Viewed as bytes for the copy, as f32 for the DSP layer.
    window: Vec<f32>,
    /// Valid f32 count in `window` for the current tick (0 on underflow).
    window_len: usize,
    level_meter: LevelMeter,
    fft: Option<FftBuffer>,
    log_scaler: LogScaler,
    /// De-interleaved channel-0 scratch for the FFT push.
    fft_scratch: Vec<f32>,
}

/// Per-device capture handle: a lazily-opened input stream plus the
/// analysis chain fed from it.
///
/// The handle idles until something accesses its data (`prepare`), opens a
/// stream on demand, and closes it again once `update` has run
/// `idle_timeout_ticks` times without an intervening `prepare`.
pub struct DeviceHandle {
    device: DeviceInfo,
    config: CaptureConfig,
    stream: Option<ActiveStream>,
    idle_ticks: u32,
    underflow_ticks: u64,
}

impl DeviceHandle {
    pub fn new(device: DeviceInfo, config: CaptureConfig) -> Self {
        Self {
            device,
            config,
            stream: None,
            idle_ticks: 0,
            underflow_ticks: 0,
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn state(&self) -> StreamState {
        if self.stream.is_some() {
            StreamState::Streaming
        } else {
            StreamState::Idle
        }
    }

    /// Sample rate of the open stream, or the device's advertised rate.
    pub fn sample_rate(&self) -> u32 {
        self.stream
            .as_ref()
            .map(|s| s.sample_rate)
            .unwrap_or(self.device.sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.stream
            .as_ref()
            .map(|s| s.channel_count)
            .unwrap_or(self.device.channel_count)
    }

    /// Ticks that found less data queued than the tick window needed.
    pub fn underflow_ticks(&self) -> u64 {
        self.underflow_ticks
    }

    /// Driver-reported stream errors since the stream opened.
    pub fn callback_errors(&self) -> u64 {
        self.stream
            .as_ref()
            .map(|s| s.shared.lock().callback_errors)
            .unwrap_or(0)
    }

    /// Adjust the spectrum's displayed dynamic range without touching the
    /// FFT tables. Supports caller-side auto gain.
    pub fn set_dynamic_range(&mut self, floor_db: f32, head_db: f32) {
        debug_assert!(floor_db < head_db);
        self.config.floor_db = floor_db;
        self.config.head_db = head_db;
    }

    /// Mark the handle as in use and make sure a stream is open.
    ///
    /// Returns true when the stream was already running, meaning this
    /// tick's data is valid. When the stream had to be opened (or failed
    /// to), the caller must treat this tick's data as unavailable.
    pub fn prepare(&mut self, driver: &dyn InputDriver) -> bool {
        self.idle_ticks = 0;

        if self.stream.is_some() {
            return true;
        }

        if let Err(err) = self.open(driver) {
            log::error!("failed to open stream on '{}': {err}", self.device.name);
        }
        false
    }

    /// Open the input stream and build the analysis chain.
    ///
    /// On any failure every partial resource is released and the handle
    /// stays idle; the next `prepare` retries naturally.
    pub fn open(&mut self, driver: &dyn InputDriver) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Ok(());
        }
        if !self.device.is_usable {
            return Err(CaptureError::NoChannelLayout);
        }

        // Provisional ring sized from the advertised format; replaced below
        // if the negotiated format needs more room.
        let provisional = buffer_bytes(
            self.device.sample_rate,
            self.device.channel_count,
            self.config.target_latency * 4,
        );
        let shared = Arc::new(Mutex::new(SharedCapture {
            ring: RingBuffer::new(provisional.max(BYTES_PER_SAMPLE))?,
            callback_errors: 0,
        }));

        let callback_shared = Arc::clone(&shared);
        let callback: StreamEventCallback = Arc::new(move |event| match event {
            StreamEvent::Data(bytes) => callback_shared.lock().ring.write(bytes),
            StreamEvent::Silence(length) => callback_shared.lock().ring.write_empty(length),
            StreamEvent::Error => {
                callback_shared.lock().callback_errors += 1;
                log::warn!("input stream overflow/error");
            }
        });

        let opened = driver.open_stream(&self.device, self.config.target_latency, callback)?;

        // Cover 4x the negotiated latency: the consumer may pause for a few
        // ticks and the callback may fire several times per tick.
        let latency = opened.latency.max(self.config.target_latency);
        let capacity = buffer_bytes(opened.sample_rate, opened.channel_count, latency * 4)
            .max(BYTES_PER_SAMPLE);
        if capacity != shared.lock().ring.capacity() {
            let ring = RingBuffer::new(capacity)?;
            shared.lock().ring = ring;
        }

        let fft = match self.config.spectrum_resolution {
            Some(resolution) => Some(FftBuffer::new(resolution * 2)?),
            None => None,
        };

        log::debug!(
            "stream open on '{}': {} Hz, {} ch, {:?} latency",
            self.device.name,
            opened.sample_rate,
            opened.channel_count,
            latency
        );

        self.stream = Some(ActiveStream {
            control: opened.control,
            shared,
            sample_rate: opened.sample_rate,
            channel_count: opened.channel_count,
            window: vec![0.0; capacity / BYTES_PER_SAMPLE],
            window_len: 0,
            level_meter: LevelMeter::new(opened.channel_count, opened.sample_rate),
            fft,
            log_scaler: LogScaler::new(),
            fft_scratch: Vec::new(),
        });
        Ok(())
    }

    /// Stop the stream and drop the capture resources. The next `open`
    /// reallocates them.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.control.stop();
            log::debug!("stream closed on '{}'", self.device.name);
        }
    }

    /// Advance the handle by one tick. Called at a steady cadence by the
    /// registry.
    pub fn update(&mut self, dt: Duration) {
        let Some(stream) = &mut self.stream else {
            return;
        };

        // Close the stream once nothing has prepared it for a while.
        self.idle_ticks += 1;
        if self.idle_ticks > self.config.idle_timeout_ticks {
            self.close();
            return;
        }

        // This tick's expected window, clamped to the staging buffer.
        let window_bytes = buffer_bytes(stream.sample_rate, stream.channel_count, dt)
            .min(stream.window.len() * BYTES_PER_SAMPLE);

        let mut underflow = false;
        {
            let mut shared = stream.shared.lock();
            if shared.ring.fill_count() >= window_bytes {
                let dest =
                    &mut bytemuck::cast_slice_mut::<f32, u8>(stream.window.as_mut_slice())
                        [..window_bytes];
                shared.ring.read(dest);
                stream.window_len = window_bytes / BYTES_PER_SAMPLE;
            } else {
                stream.window_len = 0;
                underflow = true;
            }

            // After an overflow the block alignment of the queued bytes is
            // suspect; discard everything rather than risk a torn window.
            if shared.ring.overflow_count() > 0 {
                shared.ring.clear();
            }
        }

        if underflow {
            self.underflow_ticks += 1;
            log::debug!("input underflow on '{}'", self.device.name);
            return;
        }

        let samples = &stream.window[..stream.window_len];
        stream.level_meter.process_audio_data(samples);

        if let Some(fft) = &mut stream.fft {
            if stream.channel_count > 1 {
                stream.fft_scratch.clear();
                stream
                    .fft_scratch
                    .extend(samples.iter().step_by(stream.channel_count));
                fft.push(&stream.fft_scratch);
            } else {
                fft.push(samples);
            }
            fft.analyze(self.config.floor_db, self.config.head_db);
        }
    }

    /// RMS amplitude of the last tick, `[bypass, low, band, high]`, linear
    /// scale. Zero while idle.
    pub fn channel_level(&self, channel: usize) -> [f32; 4] {
        self.stream
            .as_ref()
            .map(|s| s.level_meter.level(channel))
            .unwrap_or_default()
    }

    /// The last tick's raw PCM, interleaved. Empty while idle or after an
    /// underflow tick.
    pub fn interleaved_samples(&self) -> &[f32] {
        self.stream
            .as_ref()
            .map(|s| &s.window[..s.window_len])
            .unwrap_or(&[])
    }

    /// Strided read-only view of one channel of the last tick's PCM.
    pub fn channel_samples(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        let stride = self.channel_count().max(1);
        self.interleaved_samples()
            .iter()
            .skip(channel)
            .step_by(stride)
            .copied()
    }

    /// Normalized magnitude spectrum, linear frequency axis. Empty while
    /// idle or when spectrum analysis is disabled.
    pub fn spectrum(&self) -> &[f32] {
        self.stream
            .as_ref()
            .and_then(|s| s.fft.as_ref())
            .map(|fft| fft.spectrum())
            .unwrap_or(&[])
    }

    /// The spectrum resampled onto a log-frequency axis.
    pub fn log_spectrum(&mut self) -> &[f32] {
        match &mut self.stream {
            Some(ActiveStream {
                fft: Some(fft),
                log_scaler,
                ..
            }) => log_scaler.resample(fft.spectrum()),
            _ => &[],
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn buffer_bytes(sample_rate: u32, channels: usize, duration: Duration) -> usize {
    (sample_rate as f64 * duration.as_secs_f64()) as usize * channels * BYTES_PER_SAMPLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::test_driver::{sine_bytes, FakeDriver, TICK};

    fn usable_device() -> DeviceInfo {
        DeviceInfo {
            id: "fake:0".into(),
            name: "Fake Input".into(),
            channel_count: 1,
            sample_rate: 48_000,
            is_usable: true,
            is_default: true,
        }
    }

    fn handle() -> DeviceHandle {
        DeviceHandle::new(usable_device(), CaptureConfig::default())
    }

    #[test]
    fn opens_lazily_on_prepare() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let mut handle = handle();
        assert!(handle.state().is_idle());

        // First access: stream opens but this tick's data is stale.
        assert!(!handle.prepare(&driver));
        assert!(handle.state().is_streaming());
        assert_eq!(driver.open_count(), 1);

        // Already streaming: data is valid, no second open.
        assert!(handle.prepare(&driver));
        assert_eq!(driver.open_count(), 1);
    }

    #[test]
    fn idle_timeout_closes_and_prepare_reopens() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let mut handle = handle();
        handle.prepare(&driver);
        assert!(handle.state().is_streaming());

        for _ in 0..10 {
            handle.update(TICK);
            assert!(handle.state().is_streaming());
        }
        handle.update(TICK); // 11th un-prepared tick
        assert!(handle.state().is_idle());
        assert!(driver.stopped());

        handle.prepare(&driver);
        assert!(handle.state().is_streaming());
        assert_eq!(driver.open_count(), 2);
    }

    #[test]
    fn update_feeds_levels_and_spectrum() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let mut handle = handle();
        handle.prepare(&driver);

        // One tick of a full-scale 1 kHz sine, delivered by the "driver".
        driver.deliver(&sine_bytes(48_000, 1_000.0, 800));
        handle.prepare(&driver);
        handle.update(TICK);

        let level = handle.channel_level(0);
        assert!((level[0] - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.05, "bypass {}", level[0]);

        assert_eq!(handle.interleaved_samples().len(), 800);
        assert_eq!(handle.channel_samples(0).count(), 800);
        assert_eq!(handle.spectrum().len(), 512);
        assert!(handle.spectrum().iter().any(|&v| v > 0.0));
        assert_eq!(handle.log_spectrum().len(), 512);
    }

    #[test]
    fn underflow_yields_empty_window() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let mut handle = handle();
        handle.prepare(&driver);

        driver.deliver(&sine_bytes(48_000, 1_000.0, 10)); // far too little
        handle.prepare(&driver);
        handle.update(TICK);

        assert!(handle.interleaved_samples().is_empty());
        assert_eq!(handle.underflow_ticks(), 1);
    }

    #[test]
    fn overflow_discards_all_queued_data() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let mut handle = handle();
        handle.prepare(&driver);

        let capacity = {
            let stream = handle.stream.as_ref().unwrap();
            stream.shared.lock().ring.capacity()
        };
        // Overfill the ring in one burst.
        driver.deliver(&vec![0x3f; capacity + 64]);
        handle.prepare(&driver);
        handle.update(TICK);

        let stream = handle.stream.as_ref().unwrap();
        let shared = stream.shared.lock();
        assert_eq!(shared.ring.fill_count(), 0);
        assert_eq!(shared.ring.overflow_count(), 0);
    }

    #[test]
    fn silence_periods_are_zero_filled() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let mut handle = handle();
        handle.prepare(&driver);

        driver.deliver_silence(3200);
        handle.prepare(&driver);
        handle.update(TICK);

        assert_eq!(handle.interleaved_samples().len(), 800);
        assert!(handle.interleaved_samples().iter().all(|&s| s == 0.0));
        assert_eq!(handle.channel_level(0), [0.0; 4]);
    }

    #[test]
    fn driver_errors_are_counted_not_raised() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let mut handle = handle();
        handle.prepare(&driver);

        driver.deliver_error();
        driver.deliver_error();
        assert_eq!(handle.callback_errors(), 2);
        assert!(handle.state().is_streaming());
    }

    #[test]
    fn open_failure_leaves_handle_idle_and_retries() {
        let driver = FakeDriver::new(vec![usable_device()]);
        driver.fail_next_open();
        let mut handle = handle();

        assert!(!handle.prepare(&driver));
        assert!(handle.state().is_idle());

        // The failure was transient; the next access succeeds.
        assert!(!handle.prepare(&driver));
        assert!(handle.state().is_streaming());
    }

    #[test]
    fn unusable_device_never_opens() {
        let mut device = usable_device();
        device.is_usable = false;
        let driver = FakeDriver::new(vec![device.clone()]);
        let mut handle = DeviceHandle::new(device, CaptureConfig::default());

        assert!(matches!(
            handle.open(&driver),
            Err(CaptureError::NoChannelLayout)
        ));
        assert_eq!(driver.open_count(), 0);
    }

    #[test]
    fn spectrum_disabled_by_config() {
        let driver = FakeDriver::new(vec![usable_device()]);
        let config = CaptureConfig {
            spectrum_resolution: None,
            ..Default::default()
        };
        let mut handle = DeviceHandle::new(usable_device(), config);
        handle.prepare(&driver);

        driver.deliver(&sine_bytes(48_000, 1_000.0, 800));
        handle.prepare(&driver);
        handle.update(TICK);

        assert!(handle.spectrum().is_empty());
        assert!(handle.log_spectrum().is_empty());
        assert!(handle.channel_level(0)[0] > 0.0);
    }
}
