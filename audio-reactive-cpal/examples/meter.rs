//! Prints per-band levels and a coarse spectrum bar for the default input.
//!
//! Run with `RUST_LOG=debug cargo run --example meter`.

use std::io::Write;
use std::time::{Duration, Instant};

use audio_reactive_core::{dbfs, CaptureConfig, DeviceRegistry};
use audio_reactive_cpal::CpalDriver;

const TICK: Duration = Duration::from_nanos(16_666_667); // 1/60 s

fn main() {
    env_logger::init();

    let mut registry = DeviceRegistry::new(CpalDriver::new(), CaptureConfig::default())
        .expect("failed to initialize capture");

    let Some(device) = registry.default_device() else {
        eprintln!("no usable input device");
        return;
    };
    println!(
        "listening on '{}' ({} ch @ {} Hz)",
        device.name, device.channel_count, device.sample_rate
    );
    let id = device.id.clone();

    loop {
        let started = Instant::now();
        registry.update(TICK).expect("device scan failed");

        let [bypass, low, band, high] = registry.channel_level(&id, 0);
        let bar: String = registry
            .log_spectrum(&id)
            .chunks(16)
            .map(|chunk| {
                let peak = chunk.iter().cloned().fold(0.0f32, f32::max);
                [" ", ".", ":", "|", "#"][((peak * 4.0) as usize).min(4)]
            })
            .collect();

        print!(
            "\r{:6.1} dB  low {:4.2}  band {:4.2}  high {:4.2}  [{}]",
            dbfs(bypass),
            low,
            band,
            high,
            bar
        );
        let _ = std::io::stdout().flush();

        if let Some(remaining) = TICK.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}
