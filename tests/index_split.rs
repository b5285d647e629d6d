//! Integration tests for dataset indexing and the train/test split.

mod support;

use std::path::{Path, PathBuf};

use semotion::dataset::{
    DEFAULT_INDEX_FILE_NAME, IndexError, Loaded, SplitError, SplitOptions, build_index,
    default_index_path, load_index, load_split,
};
use semotion::labeling::LabelVocabulary;
use tempfile::tempdir;

fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"").unwrap();
}

fn dataset(root: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for (emotion, count) in [("anger", 3), ("happy", 3), ("sad", 2)] {
        for idx in 0..count {
            let path = root.join(emotion).join(format!("clip_{idx}.wav"));
            touch(&path);
            paths.push(path);
        }
    }
    paths
}

#[test]
fn index_round_trips_through_csv() {
    let dir = tempdir().unwrap();
    dataset(dir.path());
    let vocabulary = LabelVocabulary::emotions();
    let index_path = default_index_path(dir.path());
    assert!(index_path.ends_with(DEFAULT_INDEX_FILE_NAME));

    let index = build_index(dir.path(), &vocabulary, &index_path).unwrap();
    assert_eq!(index.len(), 8);
    let text = std::fs::read_to_string(&index_path).unwrap();
    assert!(text.starts_with("path,label\n"));

    let loaded = load_index(&index_path, &vocabulary).unwrap();
    assert_eq!(loaded.rows, index.rows);
    let labels: Vec<usize> = loaded.rows.iter().map(|row| row.label).collect();
    assert_eq!(labels, vec![0, 0, 0, 3, 3, 3, 5, 5]);
}

#[test]
fn paths_with_commas_and_quotes_survive() {
    let dir = tempdir().unwrap();
    let odd = dir.path().join("fear").join("take 1, \"loud\".wav");
    touch(&odd);
    let vocabulary = LabelVocabulary::emotions();
    let index_path = dir.path().join("index.csv");
    build_index(dir.path(), &vocabulary, &index_path).unwrap();
    let loaded = load_index(&index_path, &vocabulary).unwrap();
    assert_eq!(loaded.rows.len(), 1);
    assert_eq!(loaded.rows[0].path, odd);
    assert_eq!(loaded.rows[0].label, 2);
}

#[test]
fn file_names_with_line_breaks_survive() {
    let dir = tempdir().unwrap();
    let broken = dir.path().join("happy").join("take\n2.wav");
    let crlf = dir.path().join("sad").join("a\r\nb.wav");
    touch(&broken);
    touch(&crlf);
    let vocabulary = LabelVocabulary::emotions();
    let index_path = dir.path().join("index.csv");
    let built = build_index(dir.path(), &vocabulary, &index_path).unwrap();
    assert_eq!(built.len(), 2);

    let loaded = load_index(&index_path, &vocabulary).unwrap();
    assert_eq!(loaded.rows, built.rows);
    assert_eq!(loaded.rows[0].path, broken);
    assert_eq!(loaded.rows[1].path, crlf);
    assert_eq!(loaded.rows[1].label, 5);
}

#[test]
fn unknown_folder_fails_without_writing_an_index() {
    let dir = tempdir().unwrap();
    dataset(dir.path());
    touch(&dir.path().join("bored").join("x.wav"));
    let index_path = dir.path().join("index.csv");
    let err = build_index(dir.path(), &LabelVocabulary::emotions(), &index_path).unwrap_err();
    assert!(matches!(err, IndexError::UnknownLabel { ref label, .. } if label == "bored"));
    assert!(!index_path.exists());
}

#[test]
fn split_is_positional_and_seeded() {
    let dir = tempdir().unwrap();
    dataset(dir.path());
    let vocabulary = LabelVocabulary::emotions();
    let index_path = dir.path().join("index.csv");
    build_index(dir.path(), &vocabulary, &index_path).unwrap();

    let ordered = SplitOptions {
        shuffle: false,
        split_ratio: Some(0.75),
        seed: 42,
    };
    let Loaded::Split(split) = load_split(&index_path, &vocabulary, &ordered).unwrap() else {
        panic!("expected a split");
    };
    assert_eq!(split.train.len(), 6);
    assert_eq!(split.test.len(), 2);
    assert_eq!(&split.full[..6], &split.train[..]);
    assert_eq!(&split.full[6..], &split.test[..]);

    let shuffled = SplitOptions {
        shuffle: true,
        ..ordered
    };
    let first = load_split(&index_path, &vocabulary, &shuffled).unwrap();
    let second = load_split(&index_path, &vocabulary, &shuffled).unwrap();
    assert_eq!(first, second);
    let mut paths: Vec<_> = first.full().iter().map(|row| row.path.clone()).collect();
    paths.sort();
    let mut expected: Vec<_> = split.full.iter().map(|row| row.path.clone()).collect();
    expected.sort();
    assert_eq!(paths, expected);
}

#[test]
fn invalid_ratio_is_rejected_before_reading() {
    let options = SplitOptions {
        shuffle: false,
        split_ratio: Some(0.0),
        seed: 1,
    };
    let err = load_split(
        Path::new("/definitely/not/here.csv"),
        &LabelVocabulary::emotions(),
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, SplitError::InvalidConfiguration(_)));
}

#[test]
fn unshuffled_two_class_split_keeps_directory_order() {
    let dir = tempdir().unwrap();
    for emotion in ["happy", "sad"] {
        for idx in 0..5 {
            touch(&dir.path().join(emotion).join(format!("{idx}.wav")));
        }
    }
    let vocabulary = LabelVocabulary::new(["happy", "sad"]).unwrap();
    let index_path = dir.path().join("index.csv");
    build_index(dir.path(), &vocabulary, &index_path).unwrap();
    let options = SplitOptions {
        shuffle: false,
        split_ratio: Some(0.8),
        seed: 0,
    };
    let Loaded::Split(split) = load_split(&index_path, &vocabulary, &options).unwrap() else {
        panic!("expected a split");
    };
    let train_labels: Vec<usize> = split.train.iter().map(|row| row.label).collect();
    assert_eq!(train_labels, vec![0, 0, 0, 0, 0, 1, 1, 1]);
    assert_eq!(split.test.len(), 2);
    assert!(split.test[0].path.ends_with("sad/3.wav"));
    assert!(split.test[1].path.ends_with("sad/4.wav"));
}
