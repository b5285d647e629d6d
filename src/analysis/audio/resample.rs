use rubato::{FftFixedIn, Resampler, ResampleError, ResamplerConstructionError};
use thiserror::Error;

const CHUNK_FRAMES: usize = 1024;
const SUB_CHUNKS: usize = 2;

#[derive(Debug, Error)]
pub(crate) enum ResampleFailure {
    #[error("Failed to create resampler: {0}")]
    Construction(#[from] ResamplerConstructionError),
    #[error("Resampling failed: {0}")]
    Process(#[from] ResampleError),
}

/// Band-limited FFT resampler; output length is `round(duration * output_rate)`.
///
/// The filter delay is trimmed from the front so output sample `i` lines up
/// with time `i / output_rate`. Equal rates pass the input through untouched.
pub(crate) fn resample(
    samples: &[f32],
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>, ResampleFailure> {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    if samples.is_empty() || input_rate == output_rate {
        return Ok(samples.to_vec());
    }
    let duration_seconds = samples.len() as f64 / input_rate as f64;
    let out_len = (duration_seconds * output_rate as f64).round().max(1.0) as usize;

    let mut resampler = FftFixedIn::<f32>::new(
        input_rate as usize,
        output_rate as usize,
        CHUNK_FRAMES,
        SUB_CHUNKS,
        1,
    )?;
    let delay = resampler.output_delay();
    let mut out = Vec::with_capacity(delay + out_len + CHUNK_FRAMES);

    let mut pos = 0;
    while pos < samples.len() {
        let end = pos + resampler.input_frames_next();
        let block = if end <= samples.len() {
            let input: [&[f32]; 1] = [&samples[pos..end]];
            resampler.process(&input[..], None)?
        } else {
            let input: [&[f32]; 1] = [&samples[pos..]];
            resampler.process_partial(Some(&input[..]), None)?
        };
        out.extend_from_slice(&block[0]);
        pos = end;
    }
    while out.len() < delay + out_len {
        let block = resampler.process_partial::<&[f32]>(None, None)?;
        if block[0].is_empty() {
            break;
        }
        out.extend_from_slice(&block[0]);
    }

    let mut aligned = out.split_off(delay.min(out.len()));
    aligned.resize(out_len, 0.0);
    Ok(aligned)
}
