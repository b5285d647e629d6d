//! Parabolic-interpolation pitch tracking over a magnitude spectrogram.

pub(crate) const FMIN_HZ: f64 = 150.0;
pub(crate) const FMAX_HZ: f64 = 4_000.0;
const THRESHOLD: f32 = 0.1;

/// Per-frame pitch and magnitude estimates, frame-major like the input.
pub(crate) struct PitchTrack {
    pub(crate) pitches: Vec<Vec<f32>>,
    pub(crate) magnitudes: Vec<Vec<f32>>,
}

/// Track spectral peaks in `[FMIN_HZ, min(FMAX_HZ, sr / 2))`.
///
/// A bin counts as a peak when it is above `0.1 * frame max` and is a local
/// maximum along frequency (strictly above its lower neighbour, not below its
/// upper one). Its frequency and height are refined by a parabola through the
/// neighbouring bins.
pub(crate) fn piptrack(spectrum: &[Vec<f32>], sample_rate: u32, n_fft: usize) -> PitchTrack {
    let sr = sample_rate as f64;
    let fmax = FMAX_HZ.min(sr / 2.0);
    let bin_hz = sr / n_fft as f64;
    let mut pitches = Vec::with_capacity(spectrum.len());
    let mut magnitudes = Vec::with_capacity(spectrum.len());
    for frame in spectrum {
        let bins = frame.len();
        let mut pitch_row = vec![0.0_f32; bins];
        let mut mag_row = vec![0.0_f32; bins];
        let ref_value = THRESHOLD * frame.iter().copied().fold(0.0_f32, f32::max);
        let gated: Vec<f32> = frame
            .iter()
            .map(|&v| if v > ref_value { v } else { 0.0 })
            .collect();
        for bin in 0..bins {
            let freq = bin as f64 * bin_hz;
            if freq < FMIN_HZ || freq >= fmax || !is_local_max(&gated, bin) {
                continue;
            }
            let (shift, avg) = parabolic_shift(frame, bin);
            pitch_row[bin] = ((bin as f64 + shift as f64) * bin_hz) as f32;
            mag_row[bin] = frame[bin] + 0.5 * avg * shift;
        }
        pitches.push(pitch_row);
        magnitudes.push(mag_row);
    }
    PitchTrack {
        pitches,
        magnitudes,
    }
}

fn is_local_max(values: &[f32], idx: usize) -> bool {
    let prev = values[idx.saturating_sub(1)];
    let next = values[(idx + 1).min(values.len() - 1)];
    values[idx] > prev && values[idx] >= next
}

/// `(shift, avg)` of the parabola through bins `idx - 1 ..= idx + 1`; zero at edges.
fn parabolic_shift(frame: &[f32], idx: usize) -> (f32, f32) {
    if idx == 0 || idx + 1 >= frame.len() {
        return (0.0, 0.0);
    }
    let (left, center, right) = (frame[idx - 1], frame[idx], frame[idx + 1]);
    let avg = 0.5 * (right - left);
    let mut curvature = 2.0 * center - right - left;
    if curvature.abs() < f32::MIN_POSITIVE {
        curvature += 1.0;
    }
    (avg / curvature, avg)
}

/// Average each bin over frames, drop leading all-zero bins, keep at most `cap`.
pub(crate) fn summarize_track(track: &[Vec<f32>], cap: usize) -> Vec<f32> {
    let bins = track.first().map_or(0, Vec::len);
    let frames = track.len().max(1) as f64;
    let means: Vec<f32> = (0..bins)
        .map(|bin| (track.iter().map(|frame| frame[bin] as f64).sum::<f64>() / frames) as f32)
        .collect();
    means
        .into_iter()
        .skip_while(|value| *value == 0.0)
        .take(cap)
        .collect()
}

/// Deviation in fractions of a semitone from A440 tuning, at 0.01 resolution.
///
/// Uses the peaks whose magnitude reaches the median peak magnitude.
pub(crate) fn estimate_tuning(spectrum: &[Vec<f32>], sample_rate: u32, n_fft: usize) -> f64 {
    let track = piptrack(spectrum, sample_rate, n_fft);
    let mut peak_mags: Vec<f32> = Vec::new();
    let mut peaks: Vec<(f32, f32)> = Vec::new();
    for (pitch_row, mag_row) in track.pitches.iter().zip(&track.magnitudes) {
        for (&pitch, &mag) in pitch_row.iter().zip(mag_row) {
            if pitch > 0.0 {
                peak_mags.push(mag);
                peaks.push((pitch, mag));
            }
        }
    }
    let threshold = median(&mut peak_mags).unwrap_or(0.0);
    let frequencies: Vec<f64> = peaks
        .into_iter()
        .filter(|(_, mag)| *mag >= threshold)
        .map(|(pitch, _)| pitch as f64)
        .collect();
    pitch_tuning(&frequencies)
}

const TUNING_RESOLUTION: f64 = 0.01;

fn pitch_tuning(frequencies: &[f64]) -> f64 {
    let bin_count = (1.0 / TUNING_RESOLUTION).ceil() as usize;
    let mut counts = vec![0usize; bin_count];
    let mut any = false;
    for &freq in frequencies.iter().filter(|freq| **freq > 0.0) {
        let octs = (freq / (440.0 / 16.0)).log2();
        let mut residual = (12.0 * octs).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }
        let slot = (((residual + 0.5) / TUNING_RESOLUTION).floor() as usize).min(bin_count - 1);
        counts[slot] += 1;
        any = true;
    }
    if !any {
        return 0.0;
    }
    let mut best = 0;
    for (idx, count) in counts.iter().enumerate() {
        if *count > counts[best] {
            best = idx;
        }
    }
    -0.5 + best as f64 * TUNING_RESOLUTION
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stft::StftPlan;
    use std::f32::consts::PI;

    fn tone_spectrum(freq: f32, rate: u32) -> Vec<Vec<f32>> {
        let signal: Vec<f32> = (0..rate as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect();
        StftPlan::new(2048, 512).forward(&signal).magnitude()
    }

    #[test]
    fn tone_is_tracked_near_its_frequency() {
        let spectrum = tone_spectrum(440.0, 16_000);
        let track = piptrack(&spectrum, 16_000, 2048);
        let frame = &track.pitches[10];
        let tracked: Vec<f32> = frame.iter().copied().filter(|p| *p > 0.0).collect();
        assert!(!tracked.is_empty());
        assert!(tracked.iter().any(|p| (p - 440.0).abs() < 8.0));
    }

    #[test]
    fn bins_outside_band_are_never_peaks() {
        let spectrum = tone_spectrum(100.0, 16_000);
        let track = piptrack(&spectrum, 16_000, 2048);
        let min_bin = (FMIN_HZ * 2048.0 / 16_000.0).ceil() as usize;
        for frame in &track.pitches {
            assert!(frame[..min_bin].iter().all(|p| *p == 0.0));
        }
    }

    #[test]
    fn summary_drops_leading_zero_bins_and_caps() {
        let track = vec![vec![0.0, 0.0, 2.0, 0.0, 4.0], vec![0.0, 0.0, 0.0, 0.0, 2.0]];
        assert_eq!(summarize_track(&track, 20), vec![1.0, 0.0, 3.0]);
        assert_eq!(summarize_track(&track, 1), vec![1.0]);
        assert!(summarize_track(&[vec![0.0; 4]], 20).is_empty());
    }

    #[test]
    fn local_max_is_strict_on_the_left() {
        assert!(is_local_max(&[0.0, 1.0, 1.0], 1));
        assert!(!is_local_max(&[0.0, 1.0, 1.0], 2));
        assert!(!is_local_max(&[1.0, 0.0], 0));
    }

    #[test]
    fn tuning_of_concert_pitches_is_zero() {
        assert!(pitch_tuning(&[440.0, 880.0, 261.6256]).abs() < 1e-9);
        assert_eq!(pitch_tuning(&[]), 0.0);
        let sharp = 440.0 * 2f64.powf(0.2 / 12.0);
        assert!((pitch_tuning(&[sharp]) - 0.2).abs() < 0.011);
    }
}
