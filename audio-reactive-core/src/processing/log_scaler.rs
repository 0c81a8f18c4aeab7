/// X-axis log-scale resampler for spectrum display.
///
/// Maps a linear-bin spectrum onto a logarithmic frequency axis of the same
/// length, so equal screen distance covers equal pitch distance. The output
/// buffer is reused between calls and only reallocated when the source
/// length changes.
#[derive(Debug, Default)]
pub struct LogScaler {
    buffer: Vec<f32>,
}

impl LogScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resample `source` onto a log-frequency axis.
    ///
    /// For output index `i`, the fractional source position is
    /// `2^(lerp(0.1, 1.0, i / len) * log2(len))`, sampled with a 4-point
    /// cubic and clamped to `[0, 1]`.
    pub fn resample(&mut self, source: &[f32]) -> &[f32] {
        let len = source.len();
        if self.buffer.len() != len {
            self.buffer = vec![0.0; len];
        }
        if len == 0 {
            return &self.buffer;
        }

        let log2_len = (len as f32).log2();
        for (i, out) in self.buffer.iter_mut().enumerate() {
            let x = i as f32 / len as f32;
            let exponent = (0.1 + 0.9 * x) * log2_len;
            let p = exponent.exp2();
            *out = smooth_sample(source, p).clamp(0.0, 1.0);
        }
        &self.buffer
    }
}

/// 4-point sampling at a fractional position, indices clamped at both ends.
fn smooth_sample(source: &[f32], p: f32) -> f32 {
    let last = source.len() - 1;
    let i = (p as usize).min(last);

    let y0 = source[i.saturating_sub(1)];
    let y1 = source[i];
    let y2 = source[(i + 1).min(last)];
    let y3 = source[(i + 2).min(last)];

    cubic(y0, y1, y2, y3, p - i as f32)
}

// Catmull-Rom-style cubic interpolation.
fn cubic(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    let a0 = y3 - y2 - y0 + y1;
    let a1 = y0 - y1 - a0;
    let a2 = y2 - y0;
    let a3 = y1;
    let t2 = t * t;
    a0 * t * t2 + a1 * t2 + a2 * t + a3
}
