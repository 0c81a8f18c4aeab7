use serde::{Deserialize, Serialize};

/// Immutable descriptor for an audio input device.
///
/// Produced by the backend's enumeration; identity is the `id` string,
/// which stays stable across device-list refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub channel_count: usize,
    pub sample_rate: u32,
    /// Whether the device can back a capture stream: it needs at least one
    /// channel layout and must not be a raw device.
    pub is_usable: bool,
    /// Whether this is the system default input.
    pub is_default: bool,
}
