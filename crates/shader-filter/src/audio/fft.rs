use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Window applied to each channel before the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFunction {
    #[default]
    None,
    Rectangular,
    Triangular,
    Bartlett,
    Welch,
    Sine,
    Hann,
    Hamming,
    Blackman,
    Nuttall,
    BlackmanNuttall,
    BlackmanHarris,
    FlatTop,
}

impl WindowFunction {
    /// Parse a `window` annotation value. Unknown names give `None`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "rectangular" => WindowFunction::Rectangular,
            "triangular" => WindowFunction::Triangular,
            "bartlett" => WindowFunction::Bartlett,
            "welch" => WindowFunction::Welch,
            "sine" => WindowFunction::Sine,
            "hann" | "hanning" => WindowFunction::Hann,
            "hamming" => WindowFunction::Hamming,
            "blackman" => WindowFunction::Blackman,
            "nuttall" => WindowFunction::Nuttall,
            "blackman_nuttall" => WindowFunction::BlackmanNuttall,
            "blackman_harris" => WindowFunction::BlackmanHarris,
            "flat_top" => WindowFunction::FlatTop,
            _ => WindowFunction::None,
        }
    }

    /// Window coefficients for a block of `len` samples.
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        if len < 2 {
            return vec![1.0; len];
        }
        let m = (len - 1) as f32;
        let half = m / 2.0;
        (0..len)
            .map(|i| {
                let n = i as f32;
                match self {
                    WindowFunction::None | WindowFunction::Rectangular => 1.0,
                    WindowFunction::Triangular => 1.0 - ((n - half) / (len as f32 / 2.0)).abs(),
                    WindowFunction::Bartlett => 1.0 - ((n - half) / half).abs(),
                    WindowFunction::Welch => 1.0 - ((n - half) / half).powi(2),
                    WindowFunction::Sine => (PI * n / m).sin(),
                    WindowFunction::Hann => cosine_sum(&[0.5, 0.5], n, m),
                    WindowFunction::Hamming => cosine_sum(&[0.54, 0.46], n, m),
                    WindowFunction::Blackman => cosine_sum(&[0.42, 0.5, 0.08], n, m),
                    WindowFunction::Nuttall => {
                        cosine_sum(&[0.355_768, 0.487_396, 0.144_232, 0.012_604], n, m)
                    }
                    WindowFunction::BlackmanNuttall => cosine_sum(
                        &[0.363_581_9, 0.489_177_5, 0.136_599_5, 0.010_641_1],
                        n,
                        m,
                    ),
                    WindowFunction::BlackmanHarris => {
                        cosine_sum(&[0.358_75, 0.488_29, 0.141_28, 0.011_68], n, m)
                    }
                    WindowFunction::FlatTop => cosine_sum(
                        &[0.215_578_95, 0.416_631_58, 0.277_263_16, 0.083_578_95, 0.006_947_37],
                        n,
                        m,
                    ),
                }
            })
            .collect()
    }
}

/// `a0 - a1 cos(2πn/m) + a2 cos(4πn/m) - ...`
fn cosine_sum(a: &[f32], n: f32, m: f32) -> f32 {
    a.iter()
        .enumerate()
        .map(|(k, &ak)| {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            sign * ak * (2.0 * PI * k as f32 * n / m).cos()
        })
        .sum()
}

/// Forward FFT over fixed-size blocks, producing magnitude spectra.
pub struct FftTransform {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    window: WindowFunction,
    coefficients: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl FftTransform {
    pub fn new(size: usize, window: WindowFunction) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        log::debug!("FFT transform: {size}-point, {window:?} window");
        Self {
            fft,
            size,
            window,
            coefficients: window.coefficients(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn window(&self) -> WindowFunction {
        self.window
    }

    /// Replace `block` (exactly `size` samples) with its magnitude spectrum,
    /// scaled by `2/N` so a full-scale sine peaks near 1.
    pub fn magnitudes(&mut self, block: &mut [f32]) {
        debug_assert_eq!(block.len(), self.size);
        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(block.iter()).zip(&self.coefficients) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 2.0 / self.size as f32;
        for (out, bin) in block.iter_mut().zip(&self.buffer) {
            *out = bin.norm() * scale;
        }
    }

    /// Transform `channels` consecutive blocks in `data` in place and pack the
    /// first half of each spectrum contiguously at the front. Returns the
    /// packed row width.
    pub fn process_channels(&mut self, data: &mut [f32], channels: usize) -> usize {
        let n = self.size;
        let half = n / 2;
        for ch in 0..channels {
            let start = ch * n;
            if let Some(block) = data.get_mut(start..start + n) {
                self.magnitudes(block);
            }
        }
        for ch in 1..channels {
            data.copy_within(ch * n..ch * n + half, ch * half);
        }
        half
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let n = 1024;
        let bin = 32;
        let mut block: Vec<f32> = (0..n)
            .map(|i| (2.0 * PI * bin as f32 * i as f32 / n as f32).sin())
            .collect();
        let mut fft = FftTransform::new(n, WindowFunction::None);
        fft.magnitudes(&mut block);

        assert!(approx_eq(block[bin], 1.0, 1e-3), "peak = {}", block[bin]);
        assert!(block[bin + 5] < 1e-3);
        assert!(block[0] < 1e-3);
    }

    #[test]
    fn packs_half_spectra_per_channel() {
        let n = 8;
        let mut data = vec![0.0; n * 2];
        // Channel 0 silent, channel 1 DC offset.
        data[n..].fill(0.5);
        let mut fft = FftTransform::new(n, WindowFunction::Rectangular);
        let width = fft.process_channels(&mut data, 2);
        assert_eq!(width, 4);
        assert!(data[..4].iter().all(|&v| approx_eq(v, 0.0, 1e-6)));
        // DC bin of an all-0.5 block: |sum| * 2/N = 4 * 2/8 = 1.
        assert!(approx_eq(data[4], 1.0, 1e-5));
        assert!(data[5..8].iter().all(|&v| approx_eq(v, 0.0, 1e-5)));
    }

    #[test]
    fn window_shapes() {
        assert_eq!(WindowFunction::from_name("blackman_harris"), WindowFunction::BlackmanHarris);
        assert_eq!(WindowFunction::from_name("bogus"), WindowFunction::None);

        let hann = WindowFunction::Hann.coefficients(9);
        assert!(approx_eq(hann[0], 0.0, 1e-6));
        assert!(approx_eq(hann[4], 1.0, 1e-6));
        assert!(approx_eq(hann[8], 0.0, 1e-6));

        let bartlett = WindowFunction::Bartlett.coefficients(5);
        assert!(approx_eq(bartlett[2], 1.0, 1e-6));
        assert!(approx_eq(bartlett[0], 0.0, 1e-6));

        assert!(WindowFunction::None.coefficients(4).iter().all(|&w| w == 1.0));
    }
}
