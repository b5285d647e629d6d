use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc::channel};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::{DEFAULT_SAMPLE_RATE, ExtractionError, FeatureVector, extract_features};

use super::index::AudioSample;
use super::progress::{MatrixProgress, progress_tick};

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Feature extraction failed for {path}: {source}")]
    Extraction {
        path: PathBuf,
        source: ExtractionError,
    },
}

/// What to do with a row whose clip cannot be analysed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole build on the first failure.
    #[default]
    FailFast,
    /// Drop the row from matrix and labels, log it and keep going.
    SkipAndLog,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatrixOptions {
    pub sample_rate: u32,
    /// Worker threads; `None` uses the available parallelism.
    pub workers: Option<usize>,
    pub failure_policy: FailurePolicy,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            workers: None,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

/// Rectangular feature rows with their aligned labels.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    pub rows: Vec<FeatureVector>,
    pub labels: Vec<usize>,
    /// Rows dropped under [`FailurePolicy::SkipAndLog`].
    pub skipped: usize,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Extract one fixed-width row per sample, in sample order.
///
/// Rows are processed on a scoped worker pool; every result lands in its own
/// slot so the output order never depends on scheduling.
pub fn build_feature_matrix(
    samples: &[AudioSample],
    options: &MatrixOptions,
    mut progress: Option<&mut dyn FnMut(MatrixProgress)>,
) -> Result<FeatureMatrix, MatrixError> {
    let total = samples.len();
    progress_tick(&mut progress, 0, total, 0);
    if samples.is_empty() {
        return Ok(FeatureMatrix {
            rows: Vec::new(),
            labels: Vec::new(),
            skipped: 0,
        });
    }

    let worker_count = options
        .workers
        .filter(|count| *count > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .min(total)
        .max(1);
    debug!("Extracting features for {total} clips on {worker_count} workers");

    let queue = Arc::new(Mutex::new((0..total).collect::<VecDeque<usize>>()));
    let abort = AtomicBool::new(false);
    let (tx, rx) = channel();
    let sample_rate = options.sample_rate;
    let mut slots: Vec<Option<FeatureVector>> = vec![None; total];
    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut first_error: Option<MatrixError> = None;

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let abort = &abort;
            scope.spawn(move || {
                loop {
                    if abort.load(Ordering::Relaxed) {
                        break;
                    }
                    let next = {
                        let mut guard = match queue.lock() {
                            Ok(guard) => guard,
                            Err(_) => return,
                        };
                        guard.pop_front()
                    };
                    let Some(idx) = next else {
                        break;
                    };
                    let result = extract_features(&samples[idx].path, sample_rate)
                        .map(|features| features.to_vector());
                    if tx.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        while let Ok((idx, result)) = rx.recv() {
            processed += 1;
            match result {
                Ok(row) => slots[idx] = Some(row),
                Err(source) => {
                    let path = samples[idx].path.clone();
                    match options.failure_policy {
                        FailurePolicy::FailFast => {
                            abort.store(true, Ordering::Relaxed);
                            if first_error.is_none() {
                                first_error = Some(MatrixError::Extraction { path, source });
                            }
                        }
                        FailurePolicy::SkipAndLog => {
                            skipped += 1;
                            warn!("Skipping {}: {source}", path.display());
                        }
                    }
                }
            }
            progress_tick(&mut progress, processed, total, skipped);
        }
    });

    if let Some(err) = first_error {
        return Err(err);
    }

    let mut rows = Vec::with_capacity(total - skipped);
    let mut labels = Vec::with_capacity(total - skipped);
    for (slot, sample) in slots.into_iter().zip(samples) {
        if let Some(row) = slot {
            rows.push(row);
            labels.push(sample.label);
        }
    }
    Ok(FeatureMatrix {
        rows,
        labels,
        skipped,
    })
}
