//! # audio-reactive-cpal
//!
//! cpal backend for `audio-reactive-core`.
//!
//! Provides [`CpalDriver`], an implementation of the core's `InputDriver`
//! trait on top of the system's default cpal host: device enumeration with
//! usability filtering, default-device detection, and stream delivery from
//! cpal's real-time callback into the core's ring buffer.
//!
//! ## Usage
//! ```no_run
//! use audio_reactive_core::{CaptureConfig, DeviceRegistry};
//! use audio_reactive_cpal::CpalDriver;
//!
//! let mut registry =
//!     DeviceRegistry::new(CpalDriver::new(), CaptureConfig::default()).unwrap();
//! let id = registry.default_device().unwrap().id.clone();
//! loop {
//!     registry.update(std::time::Duration::from_nanos(16_666_667)).unwrap();
//!     let level = registry.channel_level(&id, 0);
//!     println!("bypass RMS: {}", level[0]);
//! }
//! ```

pub mod driver;

pub use driver::CpalDriver;
