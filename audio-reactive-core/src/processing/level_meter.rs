use super::multiband_filter::MultibandFilter;

// Reference filter parameters shared by every channel.
const FILTER_CUTOFF_HZ: f32 = 960.0;
const FILTER_Q: f32 = 0.15;

/// Per-channel audio level meter with a bypass/low/band/high filter bank.
///
/// Converts one tick's worth of interleaved PCM into per-channel RMS across
/// the four bands. The snapshot is overwritten on every call; smoothing and
/// decay are caller responsibilities.
///
/// Not reentrant: drive a given instance from one thread at a time.
#[derive(Debug)]
pub struct LevelMeter {
    levels: Vec<[f32; 4]>,
    filters: Vec<MultibandFilter>,
    sample_rate: u32,
}

impl LevelMeter {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        let mut meter = Self {
            levels: vec![[0.0; 4]; channels],
            filters: vec![MultibandFilter::default(); channels],
            sample_rate: 0,
        };
        meter.set_sample_rate(sample_rate);
        meter
    }

    pub fn channel_count(&self) -> usize {
        self.levels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Recompute the filter coefficients for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        let fc = FILTER_CUTOFF_HZ / sample_rate as f32;
        for filter in &mut self.filters {
            filter.set_parameter(fc, FILTER_Q);
        }
    }

    /// RMS amplitude of the most recent tick, `[bypass, low, band, high]`,
    /// linear scale.
    pub fn level(&self, channel: usize) -> [f32; 4] {
        self.levels.get(channel).copied().unwrap_or_default()
    }

    /// Process one tick of interleaved samples, overwriting the level
    /// snapshot. Empty input keeps the previous snapshot.
    pub fn process_audio_data(&mut self, input: &[f32]) {
        if input.is_empty() {
            return;
        }

        let channels = self.levels.len();
        let mut sums = vec![[0.0f32; 4]; channels];

        for frame in input.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                let bands = self.filters[ch].feed_sample(sample);
                for (sum, band) in sums[ch].iter_mut().zip(bands) {
                    *sum += band * band;
                }
            }
        }

        let steps = (input.len() / channels) as f32;
        for (level, sum) in self.levels.iter_mut().zip(sums) {
            for i in 0..4 {
                level[i] = (sum[i] / steps).sqrt();
            }
        }
    }
}

/// Convert a linear amplitude to a dBFS-like scale.
///
/// The reference level is the RMS of a full-scale sine (1/sqrt(2)); the
/// epsilon keeps `log10` finite for silent input.
pub fn dbfs(amplitude: f32) -> f32 {
    20.0 * (amplitude / std::f32::consts::FRAC_1_SQRT_2 + 1.5849e-13).log10()
}
