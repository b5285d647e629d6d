use std::f32::consts::PI;
use std::path::Path;

pub fn write_test_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}

pub fn sine(freq: f32, sample_rate: u32, seconds: f32, amplitude: f32) -> Vec<f32> {
    let len = (sample_rate as f32 * seconds).round() as usize;
    (0..len)
        .map(|idx| amplitude * (2.0 * PI * freq * idx as f32 / sample_rate as f32).sin())
        .collect()
}

pub fn write_sine(path: &Path, freq: f32, sample_rate: u32, seconds: f32) {
    write_test_wav(path, sample_rate, &sine(freq, sample_rate, seconds, 0.5));
}
