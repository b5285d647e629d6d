use std::path::Path;

use tracing::trace;

use super::audio::load_analysis_window;
use super::chroma::{N_CHROMA, mean_chroma};
use super::mel::{MEL_BANDS, MelBank};
use super::pitch::{piptrack, summarize_track};
use super::stft::StftPlan;
use super::{ExtractionError, FEATURE_WIDTH, HOP_LENGTH, MFCC_LEN, N_FFT, TRACK_CAP};

/// Raw per-clip features in `[cepstral, pitch, magnitude, chroma]` order.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipFeatures {
    pub mfcc: [f32; MFCC_LEN],
    /// Time-averaged pitch track, leading zero bins dropped, at most 20 long.
    pub pitch: Vec<f32>,
    pub magnitude: Vec<f32>,
    pub chroma: [f32; N_CHROMA],
}

/// One fixed-width matrix row.
pub type FeatureVector = [f32; FEATURE_WIDTH];

impl ClipFeatures {
    /// Pack into a fixed-width row: short tracks are zero-filled on the right,
    /// non-finite values become 0.0.
    pub fn to_vector(&self) -> FeatureVector {
        let mut row = [0.0_f32; FEATURE_WIDTH];
        row[..MFCC_LEN].copy_from_slice(&self.mfcc);
        let pitch_start = MFCC_LEN;
        let mag_start = pitch_start + TRACK_CAP;
        let chroma_start = mag_start + TRACK_CAP;
        for (slot, value) in row[pitch_start..mag_start].iter_mut().zip(&self.pitch) {
            *slot = *value;
        }
        for (slot, value) in row[mag_start..chroma_start].iter_mut().zip(&self.magnitude) {
            *slot = *value;
        }
        row[chroma_start..].copy_from_slice(&self.chroma);
        for value in row.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }
        row
    }
}

/// Decode `path` and extract its features for target rate `sample_rate`.
///
/// Audio is analysed at twice `sample_rate`; chroma uses `sample_rate` itself.
pub fn extract_features(path: &Path, sample_rate: u32) -> Result<ClipFeatures, ExtractionError> {
    let analysis_rate = sample_rate
        .checked_mul(2)
        .filter(|rate| *rate > 0)
        .ok_or(ExtractionError::InvalidSampleRate)?;
    let window = load_analysis_window(path, analysis_rate)?;
    trace!(
        "Extracting {} samples at {} Hz from {}",
        window.len(),
        analysis_rate,
        path.display()
    );
    features_from_samples(&window, sample_rate)
}

/// Extract features from an already decoded window sampled at `2 * sample_rate`.
pub fn features_from_samples(
    window: &[f32],
    sample_rate: u32,
) -> Result<ClipFeatures, ExtractionError> {
    let analysis_rate = sample_rate
        .checked_mul(2)
        .filter(|rate| *rate > 0)
        .ok_or(ExtractionError::InvalidSampleRate)?;
    let plan = StftPlan::new(N_FFT, HOP_LENGTH);
    let spectrogram = plan.forward(window);

    let separated = super::hpss::separate(&plan, &spectrogram, window.len());

    let track = piptrack(&spectrogram.magnitude(), analysis_rate, plan.n_fft());
    let pitch = summarize_track(&track.pitches, TRACK_CAP);
    let magnitude = summarize_track(&track.magnitudes, TRACK_CAP);

    let bank = MelBank::new(analysis_rate, plan.n_fft(), MEL_BANDS, MFCC_LEN);
    let mut mfcc = [0.0_f32; MFCC_LEN];
    mfcc.copy_from_slice(&bank.mean_mfcc(&spectrogram.power()));

    let harmonic_power = plan.forward(&separated.harmonic).power();
    let mut chroma = [0.0_f32; N_CHROMA];
    chroma.copy_from_slice(&mean_chroma(&harmonic_power, sample_rate, plan.n_fft()));

    Ok(ClipFeatures {
        mfcc,
        pitch,
        magnitude,
        chroma,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, rate: u32, seconds: f32, amp: f32) -> Vec<f32> {
        (0..(rate as f32 * seconds) as usize)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * amp)
            .collect()
    }

    #[test]
    fn packing_pads_short_tracks_and_scrubs_non_finite() {
        let features = ClipFeatures {
            mfcc: [1.0; MFCC_LEN],
            pitch: vec![200.0, f32::NAN],
            magnitude: vec![0.5; 25],
            chroma: [f32::INFINITY; N_CHROMA],
        };
        let row = features.to_vector();
        assert_eq!(row.len(), 65);
        assert_eq!(&row[..13], &[1.0; 13]);
        assert_eq!(row[13], 200.0);
        assert_eq!(row[14], 0.0);
        assert!(row[15..33].iter().all(|v| *v == 0.0));
        assert!(row[33..53].iter().all(|v| *v == 0.5));
        assert!(row[53..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn tone_produces_bounded_tracks_and_chroma() {
        let features = features_from_samples(&sine(330.0, 16_000, 2.5, 0.5), 8_000).unwrap();
        assert!(features.pitch.len() <= TRACK_CAP);
        assert_eq!(features.pitch.len(), features.magnitude.len());
        assert!(features.pitch.first().is_some_and(|p| *p > 0.0));
        assert!(features.chroma.iter().all(|c| (0.0..=1.0 + 1e-5).contains(c)));
        assert!(features.mfcc.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn near_silent_and_tiny_windows_keep_full_width() {
        for window in [vec![0.0_f32; 4_000], vec![1e-6_f32; 300], vec![0.1_f32; 1]] {
            let row = features_from_samples(&window, 8_000).unwrap().to_vector();
            assert_eq!(row.len(), FEATURE_WIDTH);
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(matches!(
            features_from_samples(&[0.0; 10], 0),
            Err(ExtractionError::InvalidSampleRate)
        ));
    }

    #[test]
    fn extraction_is_deterministic() {
        let window = sine(250.0, 16_000, 1.0, 0.3);
        let a = features_from_samples(&window, 8_000).unwrap();
        let b = features_from_samples(&window, 8_000).unwrap();
        assert_eq!(a, b);
    }
}
