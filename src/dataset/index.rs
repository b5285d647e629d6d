use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::atomic_file::write_atomic_with;
use crate::labeling::LabelVocabulary;

/// Header line of the persisted index.
pub const INDEX_HEADER: &str = "path,label";
pub(crate) const INDEX_COLUMNS: [&str; 2] = ["path", "label"];
/// File name used when no explicit index path is configured.
pub const DEFAULT_INDEX_FILE_NAME: &str = "index.csv";

const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "mp3", "ogg", "aif", "aiff", "m4a"];

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Unknown emotion label '{label}' for {path}")]
    UnknownLabel { label: String, path: PathBuf },
    #[error("Read dir {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Dataset root {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("No audio files found under {0}")]
    EmptyDataset(PathBuf),
    #[error("Failed to write index {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One `path,label` row of the persisted index.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexRecord {
    pub(crate) path: String,
    pub(crate) label: usize,
}

/// A labeled audio clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSample {
    pub path: PathBuf,
    pub label: usize,
}

/// Ordered clips plus the vocabulary their labels index into.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetIndex {
    pub emotions: LabelVocabulary,
    pub rows: Vec<AudioSample>,
}

impl DatasetIndex {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Default index path for a dataset root.
pub fn default_index_path(root: &Path) -> PathBuf {
    root.join(DEFAULT_INDEX_FILE_NAME)
}

/// Scan `root` and label every audio file by its parent folder name.
///
/// Folders are visited in sorted order so the row order is stable across runs.
pub fn scan_dataset(root: &Path, vocabulary: &LabelVocabulary) -> Result<DatasetIndex, IndexError> {
    if !root.is_dir() {
        return Err(IndexError::NotADirectory(root.to_path_buf()));
    }
    let mut files = Vec::new();
    collect_audio_files(root, &mut files)?;
    let mut rows = Vec::with_capacity(files.len());
    for path in files {
        let label = parent_label(&path, vocabulary)?;
        rows.push(AudioSample { path, label });
    }
    Ok(DatasetIndex {
        emotions: vocabulary.clone(),
        rows,
    })
}

/// Rescan `root` and overwrite the index at `index_path`.
///
/// Nothing is written when the scan fails, so an unknown label never leaves a
/// partial index behind.
pub fn build_index(
    root: &Path,
    vocabulary: &LabelVocabulary,
    index_path: &Path,
) -> Result<DatasetIndex, IndexError> {
    let index = scan_dataset(root, vocabulary)?;
    if index.is_empty() {
        return Err(IndexError::EmptyDataset(root.to_path_buf()));
    }
    write_index(&index, index_path)?;
    info!(
        "Indexed {} clips under {} into {}",
        index.len(),
        root.display(),
        index_path.display()
    );
    Ok(index)
}

pub fn write_index(index: &DatasetIndex, index_path: &Path) -> Result<(), IndexError> {
    write_atomic_with(index_path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(INDEX_COLUMNS)?;
        for row in &index.rows {
            writer.serialize(IndexRecord {
                path: row.path.to_string_lossy().into_owned(),
                label: row.label,
            })?;
        }
        writer.flush()
    })
    .map_err(|source| IndexError::Write {
        path: index_path.to_path_buf(),
        source,
    })
}

fn parent_label(path: &Path, vocabulary: &LabelVocabulary) -> Result<usize, IndexError> {
    let label = path
        .parent()
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    vocabulary
        .index_of(&label)
        .ok_or_else(|| IndexError::UnknownLabel {
            label,
            path: path.to_path_buf(),
        })
}

fn collect_audio_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), IndexError> {
    let read_err = |source| IndexError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(read_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_audio_files(&path, out)?;
        } else if path.is_file() && is_audio_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn labels_follow_parent_folder_positions() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("sad").join("b.wav"));
        touch(&dir.path().join("happy").join("a.wav"));
        touch(&dir.path().join("happy").join("notes.txt"));
        touch(&dir.path().join("happy").join(".hidden.wav"));
        let index = scan_dataset(dir.path(), &LabelVocabulary::emotions()).unwrap();
        let labels: Vec<usize> = index.rows.iter().map(|row| row.label).collect();
        assert_eq!(labels, vec![3, 5]);
        assert!(index.rows[0].path.ends_with("happy/a.wav"));
    }

    #[test]
    fn nested_files_take_their_immediate_parent() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("fear").join("session1").join("fear").join("x.WAV"));
        let index = scan_dataset(dir.path(), &LabelVocabulary::emotions()).unwrap();
        assert_eq!(index.rows[0].label, 2);
        touch(&dir.path().join("fear").join("session2").join("clip.wav"));
        let err = scan_dataset(dir.path(), &LabelVocabulary::emotions()).unwrap_err();
        assert!(matches!(err, IndexError::UnknownLabel { ref label, .. } if label == "session2"));
    }

    #[test]
    fn unknown_label_writes_no_index() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("happy").join("a.wav"));
        touch(&dir.path().join("bored").join("b.wav"));
        let index_path = dir.path().join("index.csv");
        let err = build_index(dir.path(), &LabelVocabulary::emotions(), &index_path).unwrap_err();
        assert!(matches!(err, IndexError::UnknownLabel { .. }));
        assert!(!index_path.exists());
    }

    #[test]
    fn rescan_overwrites_previous_index() {
        let dir = tempdir().unwrap();
        let data = dir.path().join("data");
        touch(&data.join("happy").join("a.wav"));
        let index_path = dir.path().join("index.csv");
        build_index(&data, &LabelVocabulary::emotions(), &index_path).unwrap();
        touch(&data.join("sad").join("b.wav"));
        build_index(&data, &LabelVocabulary::emotions(), &index_path).unwrap();
        let text = fs::read_to_string(&index_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], INDEX_HEADER);
        assert!(lines[2].ends_with(",5"));
    }
}
