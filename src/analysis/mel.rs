//! Slaney-scale mel filterbank and MFCC summary.

/// Mel bands fed to the cepstral transform.
pub(crate) const MEL_BANDS: usize = 128;
const AMIN: f64 = 1e-10;
const TOP_DB: f64 = 80.0;

pub(crate) struct MelBank {
    dct_size: usize,
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelBank {
    /// Area-normalised triangular filters spanning `0..=sample_rate / 2`.
    pub(crate) fn new(sample_rate: u32, n_fft: usize, mel_bands: usize, dct_size: usize) -> Self {
        let sr = sample_rate.max(1) as f64;
        let bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..bins).map(|k| k as f64 * sr / n_fft as f64).collect();
        let mel_max = hz_to_mel(sr / 2.0);
        let mel_f: Vec<f64> = (0..mel_bands + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (mel_bands + 1) as f64))
            .collect();
        let filters = (0..mel_bands)
            .map(|m| build_filter(&fft_freqs, mel_f[m], mel_f[m + 1], mel_f[m + 2]))
            .collect();
        Self { dct_size, filters }
    }

    /// Mean over frames of the cepstral coefficients of a power spectrogram.
    pub(crate) fn mean_mfcc(&self, power: &[Vec<f32>]) -> Vec<f32> {
        let mut db: Vec<Vec<f64>> = power
            .iter()
            .map(|frame| {
                apply_filters(&self.filters, frame)
                    .into_iter()
                    .map(|energy| 10.0 * energy.max(AMIN).log10())
                    .collect()
            })
            .collect();
        let peak = db
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let floor = peak - TOP_DB;
        for value in db.iter_mut().flatten() {
            *value = value.max(floor);
        }

        let mut sums = vec![0.0_f64; self.dct_size];
        for frame in &db {
            for (sum, coeff) in sums.iter_mut().zip(dct_ii_ortho(frame, self.dct_size)) {
                *sum += coeff;
            }
        }
        let frames = db.len().max(1) as f64;
        sums.into_iter().map(|sum| (sum / frames) as f32).collect()
    }
}

fn build_filter(fft_freqs: &[f64], lower: f64, center: f64, upper: f64) -> Vec<(usize, f32)> {
    let enorm = 2.0 / (upper - lower);
    let rise = center - lower;
    let fall = upper - center;
    fft_freqs
        .iter()
        .enumerate()
        .filter_map(|(bin, &freq)| {
            let up = (freq - lower) / rise;
            let down = (upper - freq) / fall;
            let weight = up.min(down).max(0.0) * enorm;
            (weight > 0.0).then_some((bin, weight as f32))
        })
        .collect()
}

fn apply_filters(filters: &[Vec<(usize, f32)>], power: &[f32]) -> Vec<f64> {
    filters
        .iter()
        .map(|filter| {
            filter
                .iter()
                .map(|&(bin, weight)| {
                    power.get(bin).copied().unwrap_or(0.0).max(0.0) as f64 * weight as f64
                })
                .sum()
        })
        .collect()
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1_000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

/// Slaney mel: linear below 1 kHz, logarithmic above.
pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Orthonormal type-II DCT truncated to `count` coefficients.
fn dct_ii_ortho(values: &[f64], count: usize) -> Vec<f64> {
    let n = values.len().max(1) as f64;
    (0..count)
        .map(|k| {
            let sum: f64 = values
                .iter()
                .enumerate()
                .map(|(m, v)| {
                    v * (std::f64::consts::PI * k as f64 * (2.0 * m as f64 + 1.0) / (2.0 * n)).cos()
                })
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slaney_scale_round_trips_and_breaks_at_one_khz() {
        assert!((hz_to_mel(1_000.0) - 15.0).abs() < 1e-9);
        assert!((hz_to_mel(500.0) - 7.5).abs() < 1e-9);
        for hz in [50.0, 999.0, 4_000.0, 11_025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn filters_are_area_normalised() {
        let bank = MelBank::new(44_100, 2048, MEL_BANDS, 13);
        assert_eq!(bank.filters.len(), MEL_BANDS);
        let peak = bank.filters[10]
            .iter()
            .map(|(_, w)| *w)
            .fold(0.0_f32, f32::max);
        assert!(peak > 0.0);
        assert!(bank.filters.iter().skip(4).all(|filter| !filter.is_empty()));
    }

    #[test]
    fn ortho_dct_of_constant_only_has_dc() {
        let coeffs = dct_ii_ortho(&[2.0; 16], 4);
        assert!((coeffs[0] - 8.0).abs() < 1e-9);
        assert!(coeffs[1..].iter().all(|c| c.abs() < 1e-9));
    }

    #[test]
    fn silence_is_clamped_to_floor() {
        let bank = MelBank::new(16_000, 512, 32, 13);
        let mfcc = bank.mean_mfcc(&vec![vec![0.0; 257]; 5]);
        assert_eq!(mfcc.len(), 13);
        assert!(mfcc.iter().all(|c| c.is_finite()));
        // All bands sit at 10*log10(amin) = -100 dB.
        assert!((mfcc[0] + 100.0 * (32.0_f32).sqrt()).abs() < 1e-2);
    }
}
