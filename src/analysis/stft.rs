//! Centered short-time Fourier transform and its overlap-add inverse.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

/// Frame-major complex spectrogram; every frame holds `n_fft / 2 + 1` bins.
#[derive(Clone, Debug)]
pub(crate) struct Spectrogram {
    pub(crate) frames: Vec<Vec<Complex32>>,
}

impl Spectrogram {
    pub(crate) fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn magnitude(&self) -> Vec<Vec<f32>> {
        self.map(|value| value.norm())
    }

    pub(crate) fn power(&self) -> Vec<Vec<f32>> {
        self.map(|value| value.norm_sqr())
    }

    /// Scale every bin by a real-valued mask of the same shape.
    pub(crate) fn masked(&self, mask: &[Vec<f32>]) -> Spectrogram {
        let frames = self
            .frames
            .iter()
            .zip(mask)
            .map(|(frame, weights)| {
                frame
                    .iter()
                    .zip(weights)
                    .map(|(value, weight)| *value * *weight)
                    .collect()
            })
            .collect();
        Spectrogram { frames }
    }

    fn map(&self, f: impl Fn(&Complex32) -> f32) -> Vec<Vec<f32>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(&f).collect())
            .collect()
    }
}

/// Reusable forward and inverse plans for one `(n_fft, hop)` pair.
pub(crate) struct StftPlan {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl StftPlan {
    pub(crate) fn new(n_fft: usize, hop: usize) -> Self {
        let n_fft = n_fft.max(2);
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop: hop.max(1),
            window: periodic_hann(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    pub(crate) fn n_fft(&self) -> usize {
        self.n_fft
    }

    /// Zero-pad `n_fft / 2` on both sides, then window and transform each hop.
    pub(crate) fn forward(&self, samples: &[f32]) -> Spectrogram {
        let pad = self.n_fft / 2;
        let padded_len = samples.len() + 2 * pad;
        let frame_count = 1 + (padded_len - self.n_fft) / self.hop;
        let bins = self.n_fft / 2 + 1;
        let mut buffer = vec![Complex32::default(); self.n_fft];
        let mut frames = Vec::with_capacity(frame_count);
        for frame in 0..frame_count {
            let start = frame * self.hop;
            for (n, slot) in buffer.iter_mut().enumerate() {
                let sample = (start + n)
                    .checked_sub(pad)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex32::new(sample * self.window[n], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..bins].to_vec());
        }
        Spectrogram { frames }
    }

    /// Overlap-add inverse trimmed (or zero-padded) to `length` samples.
    pub(crate) fn inverse(&self, spectrogram: &Spectrogram, length: usize) -> Vec<f32> {
        let n = self.n_fft;
        let pad = n / 2;
        let total = n + self.hop * spectrogram.frame_count().saturating_sub(1);
        let mut output = vec![0.0_f32; total];
        let mut window_sum = vec![0.0_f32; total];
        let mut buffer = vec![Complex32::default(); n];
        let scale = 1.0 / n as f32;
        for (frame_idx, frame) in spectrogram.frames.iter().enumerate() {
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k < frame.len() {
                    frame[k]
                } else {
                    frame.get(n - k).map(|value| value.conj()).unwrap_or_default()
                };
            }
            // Real signal: DC and Nyquist carry no imaginary part.
            buffer[0].im = 0.0;
            if n % 2 == 0 {
                buffer[n / 2].im = 0.0;
            }
            self.inverse.process(&mut buffer);
            let start = frame_idx * self.hop;
            for (i, value) in buffer.iter().enumerate() {
                let w = self.window[i];
                output[start + i] += value.re * scale * w;
                window_sum[start + i] += w * w;
            }
        }
        for (sample, norm) in output.iter_mut().zip(&window_sum) {
            if *norm > f32::MIN_POSITIVE {
                *sample /= norm;
            }
        }
        let mut trimmed: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
        trimmed.resize(length, 0.0);
        trimmed
    }
}

/// Hann window of length `n` with period `n`, as used for spectral analysis.
pub(crate) fn periodic_hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate).sin() * 0.5)
            .collect()
    }

    #[test]
    fn frame_count_follows_centered_padding() {
        let plan = StftPlan::new(2048, 512);
        assert_eq!(plan.forward(&vec![0.0; 22_050]).frame_count(), 44);
        assert_eq!(plan.forward(&[]).frame_count(), 1);
        assert_eq!(plan.forward(&[0.0; 10]).frames[0].len(), 1025);
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let plan = StftPlan::new(2048, 512);
        let rate = 8_000.0;
        let spec = plan.forward(&sine(1_000.0, rate, 8_000));
        let frame = &spec.magnitude()[4];
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(peak, 256);
    }

    #[test]
    fn inverse_reconstructs_signal() {
        let plan = StftPlan::new(512, 128);
        let signal = sine(440.0, 8_000.0, 3_000);
        let spec = plan.forward(&signal);
        let restored = plan.inverse(&spec, signal.len());
        assert_eq!(restored.len(), signal.len());
        for (a, b) in signal.iter().zip(&restored) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn periodic_hann_starts_at_zero_and_peaks_mid_window() {
        let window = periodic_hann(8);
        assert!(window[0].abs() < 1e-7);
        assert!((window[4] - 1.0).abs() < 1e-6);
    }
}
