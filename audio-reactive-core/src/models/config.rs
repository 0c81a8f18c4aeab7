use std::time::Duration;

use super::error::CaptureError;

/// Configuration applied to every device handle a registry creates.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Number of spectrum bins, or `None` to skip spectrum analysis.
    /// The FFT window is twice this size. Must be a power of two.
    pub spectrum_resolution: Option<usize>,

    /// Lower edge of the displayed dynamic range in dBFS; maps to 0.
    pub floor_db: f32,

    /// Upper edge of the displayed dynamic range in dBFS; maps to 1.
    /// Callers implementing auto gain move this with the tracked peak.
    pub head_db: f32,

    /// Ticks without a data access before a streaming handle closes itself.
    pub idle_timeout_ticks: u32,

    /// Target stream latency; the backend may negotiate a larger one.
    pub target_latency: Duration,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), CaptureError> {
        if let Some(resolution) = self.spectrum_resolution {
            if resolution < 2 || !resolution.is_power_of_two() {
                return Err(CaptureError::InvalidFftWidth(resolution * 2));
            }
        }
        if self.floor_db >= self.head_db {
            return Err(CaptureError::InvalidConfiguration(format!(
                "floor ({} dB) must be below head ({} dB)",
                self.floor_db, self.head_db
            )));
        }
        if self.idle_timeout_ticks == 0 {
            return Err(CaptureError::InvalidConfiguration(
                "idle timeout must be at least one tick".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            spectrum_resolution: Some(512),
            floor_db: -80.0,
            head_db: 0.0,
            idle_timeout_ticks: 10,
            target_latency: Duration::from_secs_f64(1.0 / 60.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(CaptureConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_resolution() {
        let config = CaptureConfig {
            spectrum_resolution: Some(500),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CaptureError::InvalidFftWidth(1000))
        ));
    }

    #[test]
    fn rejects_inverted_dynamic_range() {
        let config = CaptureConfig {
            floor_db: 0.0,
            head_db: -80.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn spectrum_can_be_disabled() {
        let config = CaptureConfig {
            spectrum_resolution: None,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
