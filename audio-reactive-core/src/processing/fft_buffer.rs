use crate::models::error::CaptureError;
use crate::processing::level_meter::dbfs;

/// Precomputed rotation for one butterfly: combine the complex values at
/// `even`/`odd`, rotating the odd half by `(cos, sin)`.
#[derive(Debug, Clone, Copy)]
struct Twiddle {
    even: u32,
    odd: u32,
    cos: f32,
    sin: f32,
}

/// Fixed-size FIFO sample window with an iterative radix-2 FFT.
///
/// The permutation and twiddle tables are immutable after construction;
/// changing the width means recreating the whole object. `analyze` produces
/// a magnitude spectrum normalized into `[0, 1]` after dBFS conversion and
/// floor/head range mapping, so callers can adjust display gain without
/// re-deriving the FFT.
#[derive(Debug)]
pub struct FftBuffer {
    width: usize,
    log_width: u32,
    input: Vec<f32>,
    window: Vec<f32>,
    // Bit-reversal pairs, fused with the first butterfly stage.
    permutation: Vec<(u32, u32)>,
    twiddles: Vec<Twiddle>,
    scratch: Vec<[f32; 2]>,
    spectrum: Vec<f32>,
}

impl FftBuffer {
    /// Create a buffer for `width` input samples (`width / 2` output bins).
    ///
    /// `width` must be a power of two, at least 4.
    pub fn new(width: usize) -> Result<Self, CaptureError> {
        if width < 4 || !width.is_power_of_two() {
            return Err(CaptureError::InvalidFftWidth(width));
        }
        let log_width = width.trailing_zeros();

        Ok(Self {
            width,
            log_width,
            input: vec![0.0; width],
            window: Self::build_window(width),
            permutation: Self::build_permutation(width, log_width),
            twiddles: Self::build_twiddles(width),
            scratch: vec![[0.0; 2]; width],
            spectrum: vec![0.0; width / 2],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// The most recent spectrum, one normalized value per bin, linear
    /// frequency axis.
    pub fn spectrum(&self) -> &[f32] {
        &self.spectrum
    }

    /// FIFO update of the input window, no allocation.
    ///
    /// Shorter spans shift the window left and append at the tail; spans of
    /// at least `width` samples replace the window with their most recent
    /// `width` samples.
    pub fn push(&mut self, data: &[f32]) {
        let length = data.len();
        if length == 0 {
            return;
        }

        if length < self.width {
            self.input.copy_within(length.., 0);
            self.input[self.width - length..].copy_from_slice(data);
        } else {
            self.input.copy_from_slice(&data[length - self.width..]);
        }
    }

    /// Run the FFT over the current window and rewrite the spectrum.
    ///
    /// `floor_db`/`head_db` define the displayed dynamic range: a bin at
    /// `floor_db` maps to 0, one at `head_db` maps to 1, clamped.
    pub fn analyze(&mut self, floor_db: f32, head_db: f32) {
        // First pass: window, gather through the bit-reversal permutation,
        // and combine each pair as sum and difference.
        for (i, &(i1, i2)) in self.permutation.iter().enumerate() {
            let a1 = self.input[i1 as usize] * self.window[i1 as usize];
            let a2 = self.input[i2 as usize] * self.window[i2 as usize];
            self.scratch[2 * i] = [a1 + a2, 0.0];
            self.scratch[2 * i + 1] = [a1 - a2, 0.0];
        }

        // Remaining log2(width) - 1 passes with precomputed rotations.
        for t in &self.twiddles {
            let e = self.scratch[t.even as usize];
            let x = self.scratch[t.odd as usize];
            let o = [t.cos * x[0] - t.sin * x[1], t.cos * x[1] + t.sin * x[0]];
            self.scratch[t.even as usize] = [e[0] + o[0], e[1] + o[1]];
            self.scratch[t.odd as usize] = [e[0] - o[0], e[1] - o[1]];
        }

        // Postprocess: magnitude, dBFS, range mapping.
        let div_n = 2.0 / self.width as f32;
        let div_r = 1.0 / (head_db - floor_db);
        for (out, x) in self.spectrum.iter_mut().zip(&self.scratch) {
            let magnitude = div_n * (x[0] * x[0] + x[1] * x[1]).sqrt();
            *out = ((dbfs(magnitude) - floor_db) * div_r).clamp(0.0, 1.0);
        }
    }

    fn build_window(width: usize) -> Vec<f32> {
        // Hanning window.
        let step = 2.0 * std::f32::consts::PI / (width - 1) as f32;
        (0..width).map(|i| (1.0 - (step * i as f32).cos()) / 2.0).collect()
    }

    fn build_permutation(width: usize, log_width: u32) -> Vec<(u32, u32)> {
        let reverse = |x: usize| -> u32 {
            (x as u32).reverse_bits() >> (u32::BITS - log_width)
        };
        (0..width)
            .step_by(2)
            .map(|i| (reverse(i), reverse(i + 1)))
            .collect()
    }

    fn build_twiddles(width: usize) -> Vec<Twiddle> {
        let mut table = Vec::with_capacity((width.trailing_zeros() as usize - 1) * width / 2);
        let mut m = 4;
        while m <= width {
            let step = 2.0 * std::f32::consts::PI / m as f32;
            for k in (0..width).step_by(m) {
                for j in 0..m / 2 {
                    let cos = (step * j as f32).cos();
                    table.push(Twiddle {
                        even: (k + j) as u32,
                        odd: (k + j + m / 2) as u32,
                        cos,
                        // j < m/2 keeps the angle inside [0, pi).
                        sin: (1.0 - cos * cos).max(0.0).sqrt(),
                    });
                }
            }
            m <<= 1;
        }
        table
    }
}
