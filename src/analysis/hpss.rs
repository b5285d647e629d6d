//! Median-filter harmonic/percussive separation.

use super::stft::{Spectrogram, StftPlan};

const KERNEL: usize = 31;
const MASK_POWER: i32 = 2;

pub(crate) struct Separated {
    pub(crate) harmonic: Vec<f32>,
    pub(crate) percussive: Vec<f32>,
}

/// Split a signal into its harmonic and percussive parts.
///
/// `spectrogram` must be `plan.forward(signal)`; `length` is the signal length.
pub(crate) fn separate(plan: &StftPlan, spectrogram: &Spectrogram, length: usize) -> Separated {
    let magnitude = spectrogram.magnitude();
    let harmonic_env = median_across_time(&magnitude);
    let percussive_env = median_across_frequency(&magnitude);
    let (harmonic_mask, percussive_mask) = soft_masks(&harmonic_env, &percussive_env);
    Separated {
        harmonic: plan.inverse(&spectrogram.masked(&harmonic_mask), length),
        percussive: plan.inverse(&spectrogram.masked(&percussive_mask), length),
    }
}

fn median_across_time(magnitude: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let frames = magnitude.len();
    let bins = magnitude.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0_f32; bins]; frames];
    let mut line = Vec::with_capacity(frames);
    let mut window = Vec::with_capacity(KERNEL);
    for bin in 0..bins {
        line.clear();
        line.extend(magnitude.iter().map(|frame| frame[bin]));
        for (t, value) in median_filter(&line, &mut window).into_iter().enumerate() {
            out[t][bin] = value;
        }
    }
    out
}

fn median_across_frequency(magnitude: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut window = Vec::with_capacity(KERNEL);
    magnitude
        .iter()
        .map(|frame| median_filter(frame, &mut window))
        .collect()
}

/// Sliding median of width [`KERNEL`] with mirrored (`d c b a | a b c d`) edges.
fn median_filter(line: &[f32], window: &mut Vec<f32>) -> Vec<f32> {
    let half = (KERNEL / 2) as isize;
    (0..line.len() as isize)
        .map(|center| {
            window.clear();
            window.extend((-half..=half).map(|offset| line[reflect(center + offset, line.len())]));
            let (_, median, _) = window.select_nth_unstable_by(KERNEL / 2, f32::total_cmp);
            *median
        })
        .collect()
}

fn reflect(mut idx: isize, len: usize) -> usize {
    let len = len as isize;
    loop {
        if idx < 0 {
            idx = -idx - 1;
        } else if idx >= len {
            idx = 2 * len - idx - 1;
        } else {
            return idx as usize;
        }
    }
}

/// Wiener-style masks; a cell where both envelopes vanish gets zero in both.
fn soft_masks(harmonic: &[Vec<f32>], percussive: &[Vec<f32>]) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let mut h_mask = Vec::with_capacity(harmonic.len());
    let mut p_mask = Vec::with_capacity(harmonic.len());
    for (h_frame, p_frame) in harmonic.iter().zip(percussive) {
        let (h_row, p_row): (Vec<f32>, Vec<f32>) = h_frame
            .iter()
            .zip(p_frame)
            .map(|(&h, &p)| {
                let z = h.max(p);
                if z < f32::MIN_POSITIVE {
                    return (0.0, 0.0);
                }
                let hm = (h / z).powi(MASK_POWER);
                let pm = (p / z).powi(MASK_POWER);
                let total = hm + pm;
                (hm / total, pm / total)
            })
            .unzip();
        h_mask.push(h_row);
        p_mask.push(p_row);
    }
    (h_mask, p_mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn reflect_mirrors_including_edge() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(6, 5), 3);
        assert_eq!(reflect(-4, 2), 0);
    }

    #[test]
    fn median_filter_removes_isolated_spike() {
        let mut line = vec![1.0_f32; 64];
        line[20] = 100.0;
        let filtered = median_filter(&line, &mut Vec::new());
        assert!(filtered.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn masks_sum_to_one_except_where_silent() {
        let (h, p) = soft_masks(&[vec![3.0, 0.0, 1.0]], &[vec![1.0, 0.0, 1.0]]);
        assert!((h[0][0] - 0.9).abs() < 1e-6);
        assert!((p[0][0] - 0.1).abs() < 1e-6);
        assert_eq!((h[0][1], p[0][1]), (0.0, 0.0));
        assert!((h[0][2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn steady_tone_is_mostly_harmonic_and_parts_sum_to_signal() {
        let plan = StftPlan::new(2048, 512);
        let signal: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / 8_000.0).sin() * 0.5)
            .collect();
        let spec = plan.forward(&signal);
        let parts = separate(&plan, &spec, signal.len());
        assert_eq!(parts.harmonic.len(), signal.len());
        let energy = |s: &[f32]| s.iter().map(|v| v * v).sum::<f32>();
        assert!(energy(&parts.harmonic) > 4.0 * energy(&parts.percussive));
        for i in (2_000..14_000).step_by(97) {
            let sum = parts.harmonic[i] + parts.percussive[i];
            assert!((sum - signal[i]).abs() < 1e-3);
        }
    }
}
