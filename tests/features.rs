//! Integration tests for clip feature extraction.

mod support;

use semotion::analysis::{
    ExtractionError, FEATURE_WIDTH, MFCC_LEN, TRACK_CAP, extract_features,
};
use support::wav::{write_sine, write_test_wav};
use tempfile::tempdir;

#[test]
fn sine_clip_yields_a_full_width_row() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_sine(&path, 440.0, 22_050, 3.0);

    let features = extract_features(&path, 22_050).unwrap();
    assert_eq!(features.mfcc.len(), MFCC_LEN);
    assert!(!features.pitch.is_empty());
    assert!(features.pitch.len() <= TRACK_CAP);
    assert_eq!(features.pitch.len(), features.magnitude.len());
    assert!(features.chroma.iter().all(|value| (0.0..=1.0).contains(value)));

    let row = features.to_vector();
    assert_eq!(row.len(), FEATURE_WIDTH);
    assert!(row.iter().all(|value| value.is_finite()));
    assert_eq!(&row[..MFCC_LEN], &features.mfcc[..]);
}

#[test]
fn extraction_is_deterministic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_sine(&path, 330.0, 16_000, 3.0);
    let first = extract_features(&path, 8_000).unwrap().to_vector();
    let second = extract_features(&path, 8_000).unwrap().to_vector();
    assert_eq!(first, second);
}

#[test]
fn clip_shorter_than_the_offset_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blip.wav");
    write_test_wav(&path, 8_000, &vec![0.1; 2_000]);
    let err = extract_features(&path, 8_000).unwrap_err();
    assert!(matches!(err, ExtractionError::EmptyWindow { .. }));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = extract_features(&dir.path().join("absent.wav"), 8_000).unwrap_err();
    assert!(matches!(err, ExtractionError::Open { .. }));
}
