//! End-to-end training run: index, split, extract, fit, evaluate and persist.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::atomic_file::write_atomic;
use crate::config::{ConfigError, PipelineConfig, ResolvedOutput};
use crate::dataset::{
    IndexError, Loaded, MatrixError, MatrixProgress, SplitError, build_feature_matrix,
    build_index, load_split,
};
use crate::inference::write_predictions_csv;
use crate::labeling::{CodecError, LabelCodec};
use crate::ml::cnn::{
    CancelFlag, EmotionClassifier, Evaluation, LabeledFeatures, ModelSaveError, TrainError,
    TrainingHistory,
};
use crate::ml::metrics::{ConfusionMatrix, ModelMetrics};

/// Test-set metrics written next to the model artifact.
pub const METRICS_FILE: &str = "metrics.json";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Train(#[from] TrainError),
    #[error(transparent)]
    Save(#[from] ModelSaveError),
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No clips left for training after feature extraction")]
    NothingToTrain,
}

/// Stage reached by a training run, reported through the progress callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineProgress {
    Indexed { rows: usize },
    Split { train: usize, test: usize },
    TrainFeatures(MatrixProgress),
    TestFeatures(MatrixProgress),
    Training { epochs: usize },
    Saved,
}

/// Summary of a finished training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub model_dir: PathBuf,
    pub predictions_path: PathBuf,
    pub history_path: PathBuf,
    pub indexed: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Rows dropped by the skip-and-log policy across both splits.
    pub skipped: usize,
    pub history: TrainingHistory,
    /// `None` when the split left no test rows.
    pub evaluation: Option<Evaluation>,
    pub metrics: Option<ModelMetrics>,
    /// Rendered confusion matrix, rows are true classes.
    pub confusion: Option<String>,
}

fn report(progress: &mut Option<&mut dyn FnMut(PipelineProgress)>, update: PipelineProgress) {
    if let Some(callback) = progress.as_deref_mut() {
        callback(update);
    }
}

/// Run the whole training pipeline described by `config`.
///
/// The dataset is rescanned on every run so the index always mirrors the
/// folder contents. Setting `cancel` stops training between batches; the
/// partially trained model is still saved and evaluated.
pub fn run_training(
    config: &PipelineConfig,
    mut progress: Option<&mut dyn FnMut(PipelineProgress)>,
    cancel: Option<&CancelFlag>,
) -> Result<TrainingReport, PipelineError> {
    config.validate()?;
    let vocabulary = config.vocabulary()?;
    let output = config.resolve_output()?;
    let index_path = config.index_path();

    let index = build_index(&config.dataset.root, &vocabulary, &index_path)?;
    report(&mut progress, PipelineProgress::Indexed { rows: index.len() });

    let (train_samples, test_samples) = match load_split(
        &index_path,
        &vocabulary,
        &config.split_options(),
    )? {
        Loaded::Split(split) => (split.train, split.test),
        Loaded::Full(rows) => (rows, Vec::new()),
    };
    info!(
        "Split {} clips into {} train / {} test",
        index.len(),
        train_samples.len(),
        test_samples.len()
    );
    report(
        &mut progress,
        PipelineProgress::Split {
            train: train_samples.len(),
            test: test_samples.len(),
        },
    );

    let matrix_options = config.matrix_options();
    let train_matrix = {
        let mut forward = |update: MatrixProgress| {
            report(&mut progress, PipelineProgress::TrainFeatures(update));
        };
        build_feature_matrix(&train_samples, &matrix_options, Some(&mut forward))?
    };
    let test_matrix = {
        let mut forward = |update: MatrixProgress| {
            report(&mut progress, PipelineProgress::TestFeatures(update));
        };
        build_feature_matrix(&test_samples, &matrix_options, Some(&mut forward))?
    };
    let skipped = train_matrix.skipped + test_matrix.skipped;
    if skipped > 0 {
        warn!("{skipped} clips could not be analysed and were left out");
    }
    if train_matrix.is_empty() {
        return Err(PipelineError::NothingToTrain);
    }

    let codec = LabelCodec::fit(&vocabulary);
    let train_targets = codec.encode(&train_matrix.labels)?;
    let test_targets = codec.encode(&test_matrix.labels)?;
    let train = LabeledFeatures::new(&train_matrix.rows, &train_targets)?;
    let test = LabeledFeatures::new(&test_matrix.rows, &test_targets)?;
    let validation = (!test.is_empty()).then_some(test);

    let options = config.train_options();
    report(
        &mut progress,
        PipelineProgress::Training {
            epochs: options.epochs,
        },
    );
    let (classifier, history) =
        EmotionClassifier::fit(&vocabulary, train, validation, &options, cancel)?;

    classifier.save(&output.model_dir)?;
    write_history(&output, &history)?;
    report(&mut progress, PipelineProgress::Saved);

    let (evaluation, metrics, confusion) = match validation {
        Some(test) => {
            let evaluation = classifier.evaluate(test)?;
            let predicted = classifier.predict_classes(test.rows)?;
            let actual_names = codec.names(&test_matrix.labels)?;
            let predicted_names = codec.names(&predicted)?;
            let rows: Vec<(String, String)> = actual_names
                .into_iter()
                .zip(predicted_names)
                .map(|(actual, predicted)| (actual.to_string(), predicted.to_string()))
                .collect();
            write_predictions_csv(&output.predictions_path, &rows).map_err(|source| {
                PipelineError::Write {
                    path: output.predictions_path.clone(),
                    source,
                }
            })?;

            let confusion = ConfusionMatrix::from_pairs(
                codec.num_classes(),
                &test_matrix.labels,
                &predicted,
            );
            let names = vocabulary.names();
            let metrics = ModelMetrics::from_confusion(&confusion, names);
            let rendered = confusion.render(names);
            let metrics_path = output.model_dir.join(METRICS_FILE);
            write_atomic(&metrics_path, &serde_json::to_vec_pretty(&metrics)?).map_err(
                |source| PipelineError::Write {
                    path: metrics_path.clone(),
                    source,
                },
            )?;
            info!(
                "Test loss {:.4}, accuracy {:.4}",
                evaluation.loss, evaluation.accuracy
            );
            for class in &metrics.per_class {
                info!(
                    "{:<10} precision={:.3} recall={:.3} f1={:.3} support={}",
                    class.class_id, class.precision, class.recall, class.f1, class.support
                );
            }
            info!("Confusion matrix (rows=true, cols=pred):\n{rendered}");
            (Some(evaluation), Some(metrics), Some(rendered))
        }
        None => {
            warn!("Split left no test clips; skipping evaluation and predictions");
            (None, None, None)
        }
    };

    Ok(TrainingReport {
        model_dir: output.model_dir,
        predictions_path: output.predictions_path,
        history_path: output.history_path,
        indexed: index.len(),
        train_rows: train_matrix.len(),
        test_rows: test_matrix.len(),
        skipped,
        history,
        evaluation,
        metrics,
        confusion,
    })
}

fn write_history(output: &ResolvedOutput, history: &TrainingHistory) -> Result<(), PipelineError> {
    let json = serde_json::to_vec_pretty(history)?;
    write_atomic(&output.history_path, &json).map_err(|source| PipelineError::Write {
        path: output.history_path.clone(),
        source,
    })
}
