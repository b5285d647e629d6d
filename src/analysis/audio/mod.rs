//! Decoding clips into the mono analysis window.

mod decode;
mod resample;

use std::path::Path;

use crate::analysis::{ExtractionError, WINDOW_DURATION_SECONDS, WINDOW_OFFSET_SECONDS};

use resample::resample;

/// Load `path` as mono, keep `[offset, offset + duration)` seconds and resample
/// it to `target_rate` with a band-limited filter.
///
/// Clips shorter than the window yield whatever audio lies inside it; a clip
/// that ends before the offset is an [`ExtractionError::EmptyWindow`].
pub(crate) fn load_analysis_window(
    path: &Path,
    target_rate: u32,
) -> Result<Vec<f32>, ExtractionError> {
    if target_rate == 0 {
        return Err(ExtractionError::InvalidSampleRate);
    }
    let decoded = decode::decode_audio(
        path,
        Some(WINDOW_OFFSET_SECONDS + WINDOW_DURATION_SECONDS),
    )?;
    let mut mono = Vec::new();
    downmix_to_mono_into(&mut mono, &decoded.samples, decoded.channels);
    let window = slice_window(&mono, decoded.sample_rate);
    if window.is_empty() {
        return Err(ExtractionError::EmptyWindow {
            path: path.to_path_buf(),
        });
    }
    resample(window, decoded.sample_rate, target_rate).map_err(|err| ExtractionError::Resample {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

fn slice_window(mono: &[f32], sample_rate: u32) -> &[f32] {
    let rate = sample_rate as f64;
    let start = (WINDOW_OFFSET_SECONDS as f64 * rate).round() as usize;
    let len = (WINDOW_DURATION_SECONDS as f64 * rate).round() as usize;
    if start >= mono.len() {
        return &[];
    }
    let end = start.saturating_add(len).min(mono.len());
    &mono[start..end]
}

pub(crate) fn downmix_to_mono_into(out: &mut Vec<f32>, samples: &[f32], channels: u16) {
    let channels = channels.max(1) as usize;
    out.clear();
    if channels == 1 {
        out.extend(samples.iter().copied().map(sanitize_sample));
        return;
    }
    let frames = samples.len() / channels;
    out.reserve(frames);
    for frame in samples.chunks_exact(channels) {
        let sum: f32 = frame.iter().copied().map(sanitize_sample).sum();
        out.push(sum / channels as f32);
    }
}

fn sanitize_sample(sample: f32) -> f32 {
    if !sample.is_finite() {
        return 0.0;
    }
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped != 0.0 && clamped.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        clamped
    }
}
