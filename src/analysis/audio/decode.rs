use std::fs::File;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use tracing::debug;

use crate::analysis::ExtractionError;

/// Raw decoded audio in interleaved `f32` samples.
pub(crate) struct DecodedAudio {
    pub(crate) samples: Vec<f32>,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

/// Decode at most `max_seconds` of audio from `path`.
///
/// WAV files go through `hound`; anything else (or WAV variants hound
/// rejects) falls back to symphonia.
pub(crate) fn decode_audio(
    path: &Path,
    max_seconds: Option<f32>,
) -> Result<DecodedAudio, ExtractionError> {
    if !path.is_file() {
        return Err(ExtractionError::Open {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such audio file"),
        });
    }
    if has_wav_extension(path) {
        match decode_with_hound(path, max_seconds) {
            Ok(decoded) => return Ok(decoded),
            Err(err) => debug!("hound rejected {}: {err}; trying symphonia", path.display()),
        }
    }
    decode_with_symphonia(path, max_seconds)
}

fn has_wav_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn max_interleaved(max_seconds: Option<f32>, sample_rate: u32, channels: u16) -> Option<usize> {
    max_seconds.filter(|limit| *limit > 0.0).map(|limit| {
        let frames = (limit * sample_rate as f32).ceil().max(1.0);
        (frames as usize).saturating_mul(channels as usize).max(1)
    })
}

fn decode_with_hound(path: &Path, max_seconds: Option<f32>) -> Result<DecodedAudio, hound::Error> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate.max(1);
    let channels = spec.channels.max(1);
    let limit = max_interleaved(max_seconds, sample_rate, channels).unwrap_or(usize::MAX);
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .take(limit)
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .take(limit)
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn decode_with_symphonia(
    path: &Path,
    max_seconds: Option<f32>,
) -> Result<DecodedAudio, ExtractionError> {
    let file = File::open(path).map_err(|source| ExtractionError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| ExtractionError::decode(path, format!("probe failed: {err}")))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| ExtractionError::decode(path, "no default track"))?;
    let codec_params = &track.codec_params;
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| ExtractionError::decode(path, "missing sample rate"))?;
    let channels = codec_params
        .channels
        .ok_or_else(|| ExtractionError::decode(path, "missing channel count"))?
        .count() as u16;
    let max_samples = max_interleaved(max_seconds, sample_rate, channels);

    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .map_err(|err| ExtractionError::decode(path, format!("no decoder: {err}")))?;

    let mut samples = Vec::new();
    loop {
        if max_samples.is_some_and(|limit| samples.len() >= limit) {
            break;
        }
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) => break,
            Err(err) => {
                return Err(ExtractionError::decode(path, format!("packet read: {err}")));
            }
        };
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            Err(Error::DecodeError(_)) => continue,
            Err(err) => return Err(ExtractionError::decode(path, err)),
        };
        let spec = *audio_buf.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
        if let Some(limit) = max_samples {
            if samples.len() >= limit {
                samples.truncate(limit);
                break;
            }
        }
    }

    if samples.is_empty() {
        return Err(ExtractionError::decode(path, "decoded 0 samples"));
    }
    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.max(1),
        channels: channels.max(1),
    })
}
