/// Three-band (+ bypass) filter built from a single two-pole biquad section.
///
/// One set of coefficients yields four simultaneous responses per sample:
/// `[bypass, low-pass, band-pass, high-pass]`. The design follows the
/// standard biquad cookbook derivation (`K = tan(pi * fc)`,
/// `norm = 1 / (1 + K/Q + K*K)`).
///
/// Single-threaded use only; the state registers carry over between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultibandFilter {
    a0: [f32; 4],
    a1: [f32; 4],
    a2: [f32; 4],
    b1: f32,
    b2: f32,
    z1: [f32; 4],
    z2: [f32; 4],
}

// The bypass lane must ignore the feedback path so it passes the raw input.
const X_MASK: [f32; 4] = [0.0, 1.0, 1.0, 1.0];

impl MultibandFilter {
    /// Derive all coefficients for a normalized cutoff (`fc = hz / rate`)
    /// and resonance. O(1); call again whenever the sample rate changes.
    pub fn set_parameter(&mut self, fc: f32, q: f32) {
        let k = (std::f32::consts::PI * fc).tan();
        let norm = 1.0 / (1.0 + k / q + k * k);

        // Bypass
        self.a0[0] = 1.0;
        self.a1[0] = 0.0;
        self.a2[0] = 0.0;

        // Low-pass
        self.a0[1] = k * k * norm;
        self.a1[1] = 2.0 * self.a0[1];
        self.a2[1] = self.a0[1];

        // Band-pass
        self.a0[2] = k / q * norm;
        self.a1[2] = 0.0;
        self.a2[2] = -self.a0[2];

        // High-pass
        self.a0[3] = norm;
        self.a1[3] = -2.0 * self.a0[3];
        self.a2[3] = self.a0[3];

        self.b1 = 2.0 * (k * k - 1.0) * norm;
        self.b2 = (1.0 - k / q + k * k) * norm;
    }

    /// Advance the filter by one sample and return the four band outputs.
    pub fn feed_sample(&mut self, x: f32) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for i in 0..4 {
            out[i] = self.a0[i] * x + self.z1[i] * X_MASK[i];
            self.z1[i] = self.a1[i] * x + self.z2[i] - out[i] * self.b1;
            self.z2[i] = self.a2[i] * x - out[i] * self.b2;
        }
        out
    }
}
