//! Twelve-class pitch-class profile from a power spectrogram.

use super::pitch::estimate_tuning;

pub(crate) const N_CHROMA: usize = 12;
const CENTER_OCTAVE: f64 = 5.0;
const OCTAVE_WIDTH: f64 = 2.0;

/// `N_CHROMA x (n_fft / 2 + 1)` weights mapping FFT bins to pitch classes.
///
/// Rows start at C. Each column is L2-normalised before the octave
/// weighting centred on [`CENTER_OCTAVE`] is applied.
pub(crate) fn chroma_filterbank(sample_rate: u32, n_fft: usize, tuning: f64) -> Vec<Vec<f32>> {
    let sr = sample_rate.max(1) as f64;
    let n_chroma = N_CHROMA as f64;
    let a440 = 440.0 * 2f64.powf(tuning / n_chroma);

    let mut frqbins: Vec<f64> = Vec::with_capacity(n_fft);
    for k in 1..n_fft {
        let freq = k as f64 * sr / n_fft as f64;
        frqbins.push(n_chroma * (freq / (a440 / 16.0)).log2());
    }
    frqbins.insert(0, frqbins[0] - 1.5 * n_chroma);

    let mut binwidth: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    binwidth.push(1.0);

    let half = (n_chroma / 2.0).round();
    let mut weights = vec![vec![0.0_f64; n_fft]; N_CHROMA];
    for k in 0..n_fft {
        for (c, row) in weights.iter_mut().enumerate() {
            let d = (frqbins[k] - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            row[k] = (-0.5 * (2.0 * d / binwidth[k]).powi(2)).exp();
        }
        let norm = weights.iter().map(|row| row[k] * row[k]).sum::<f64>().sqrt();
        let norm = if norm < f64::MIN_POSITIVE { 1.0 } else { norm };
        let octave = (-0.5 * ((frqbins[k] / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        for row in weights.iter_mut() {
            row[k] = row[k] / norm * octave;
        }
    }

    let bins = n_fft / 2 + 1;
    (0..N_CHROMA)
        .map(|c| {
            weights[(c + 3) % N_CHROMA][..bins]
                .iter()
                .map(|w| *w as f32)
                .collect()
        })
        .collect()
}

/// Mean over frames of the max-normalised chroma of `power`.
pub(crate) fn mean_chroma(power: &[Vec<f32>], sample_rate: u32, n_fft: usize) -> Vec<f32> {
    let tuning = estimate_tuning(power, sample_rate, n_fft);
    let filters = chroma_filterbank(sample_rate, n_fft, tuning);
    let mut sums = vec![0.0_f64; N_CHROMA];
    for frame in power {
        let raw: Vec<f64> = filters
            .iter()
            .map(|row| {
                row.iter()
                    .zip(frame)
                    .map(|(w, p)| *w as f64 * *p as f64)
                    .sum()
            })
            .collect();
        let peak = raw.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);
        let scale = if peak < f32::MIN_POSITIVE as f64 { 1.0 } else { peak };
        for (sum, value) in sums.iter_mut().zip(raw) {
            *sum += value / scale;
        }
    }
    let frames = power.len().max(1) as f64;
    sums.into_iter().map(|sum| (sum / frames) as f32).collect()
}
