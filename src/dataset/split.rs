use std::fs::File;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use crate::labeling::LabelVocabulary;

use super::index::{AudioSample, DatasetIndex, INDEX_COLUMNS, INDEX_HEADER, IndexRecord};

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("Invalid configuration: split ratio {0} must be in (0, 1]")]
    InvalidConfiguration(f64),
    #[error("Failed to read index {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid index {path} line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// How a loaded index is ordered and partitioned.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOptions {
    pub shuffle: bool,
    /// Fraction of rows that go to `train`; `None` returns the full set only.
    pub split_ratio: Option<f64>,
    /// Seed for the row permutation; only read when `shuffle` is set.
    pub seed: u64,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            shuffle: false,
            split_ratio: None,
            seed: 42,
        }
    }
}

impl SplitOptions {
    pub fn validate(&self) -> Result<(), SplitError> {
        match self.split_ratio {
            Some(ratio) if !(ratio > 0.0 && ratio <= 1.0) => {
                Err(SplitError::InvalidConfiguration(ratio))
            }
            _ => Ok(()),
        }
    }
}

/// Train/test partition of an index. `test` positions restart at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub full: Vec<AudioSample>,
    pub train: Vec<AudioSample>,
    pub test: Vec<AudioSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Full(Vec<AudioSample>),
    Split(Split),
}

impl Loaded {
    pub fn full(&self) -> &[AudioSample] {
        match self {
            Loaded::Full(rows) => rows,
            Loaded::Split(split) => &split.full,
        }
    }
}

/// Number of rows placed in `train` for a ratio over `n` rows.
pub fn train_len(ratio: f64, n: usize) -> usize {
    ((ratio * n as f64).floor() as usize).min(n)
}

/// Load an index, then shuffle and split it per `options`.
///
/// Options are validated before the file is opened.
pub fn load_split(
    index_path: &Path,
    vocabulary: &LabelVocabulary,
    options: &SplitOptions,
) -> Result<Loaded, SplitError> {
    options.validate()?;
    let index = load_index(index_path, vocabulary)?;
    split_rows(index.rows, options)
}

/// Shuffle (when requested) and positionally split in-memory rows.
pub fn split_rows(mut rows: Vec<AudioSample>, options: &SplitOptions) -> Result<Loaded, SplitError> {
    options.validate()?;
    if options.shuffle {
        let mut rng = StdRng::seed_from_u64(options.seed);
        rows.shuffle(&mut rng);
    }
    let Some(ratio) = options.split_ratio else {
        return Ok(Loaded::Full(rows));
    };
    let cut = train_len(ratio, rows.len());
    let train = rows[..cut].to_vec();
    let test = rows[cut..].to_vec();
    Ok(Loaded::Split(Split {
        full: rows,
        train,
        test,
    }))
}

/// Parse an index file written by [`super::build_index`].
///
/// Quoted fields may span lines; reported line numbers are those of the
/// offending record's first line.
pub fn load_index(path: &Path, vocabulary: &LabelVocabulary) -> Result<DatasetIndex, SplitError> {
    let file = File::open(path).map_err(|source| SplitError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |line: u64, reason: String| SplitError::Parse {
        path: path.to_path_buf(),
        line: line as usize,
        reason,
    };
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = reader
        .headers()
        .map_err(|err| parse_err(1, err.to_string()))?
        .clone();
    if headers.iter().map(str::trim).ne(INDEX_COLUMNS) {
        return Err(parse_err(1, format!("expected header '{INDEX_HEADER}'")));
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| {
            let line = err.position().map_or(0, |pos| pos.line());
            parse_err(line, err.to_string())
        })?;
        let line = record.position().map_or(0, |pos| pos.line());
        let row: IndexRecord = record
            .deserialize(Some(&headers))
            .map_err(|err| parse_err(line, err.to_string()))?;
        if row.label >= vocabulary.len() {
            return Err(parse_err(
                line,
                format!("label {} outside {}-class vocabulary", row.label, vocabulary.len()),
            ));
        }
        rows.push(AudioSample {
            path: PathBuf::from(row.path),
            label: row.label,
        });
    }
    Ok(DatasetIndex {
        emotions: vocabulary.clone(),
        rows,
    })
}
