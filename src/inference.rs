//! Single-clip emotion prediction from a saved model artifact.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::analysis::{ExtractionError, extract_features};
use crate::atomic_file::write_atomic_with;
use crate::labeling::{CodecError, LabelCodec, LabelVocabulary};
use crate::ml::cnn::{EmotionClassifier, ModelLoadError, TrainError};

/// Header of the predictions table written after training.
pub const PREDICTIONS_HEADER: &str = "actualvalues,predictedvalues";
const PREDICTIONS_COLUMNS: [&str; 2] = ["actualvalues", "predictedvalues"];

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Model(#[from] TrainError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("Model returned no prediction for {0}")]
    EmptyOutput(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub index: usize,
    pub probabilities: Vec<f32>,
}

/// Extractor and trained classifier bound to one sample rate.
///
/// Labels are decoded by a codec fitted from the artifact's vocabulary.
#[derive(Debug)]
pub struct EmotionPredictor {
    classifier: EmotionClassifier,
    codec: LabelCodec,
    sample_rate: u32,
}

impl EmotionPredictor {
    pub fn load(model_dir: &Path, sample_rate: u32) -> Result<Self, ModelLoadError> {
        let classifier = EmotionClassifier::load(model_dir)?;
        Ok(Self::new(classifier, sample_rate))
    }

    pub fn new(classifier: EmotionClassifier, sample_rate: u32) -> Self {
        let codec = LabelCodec::fit(classifier.vocabulary());
        Self {
            classifier,
            codec,
            sample_rate,
        }
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        self.codec.vocabulary()
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn classifier(&self) -> &EmotionClassifier {
        &self.classifier
    }

    pub fn predict_file(&self, path: &Path) -> Result<Prediction, InferenceError> {
        let row = extract_features(path, self.sample_rate)?.to_vector();
        let probabilities = self
            .classifier
            .predict(&[row])?
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::EmptyOutput(path.to_path_buf()))?;
        let index = self.codec.decode_row(&probabilities)?;
        let label = self.codec.name(index)?.to_string();
        debug!("{} -> {label} ({index})", path.display());
        Ok(Prediction {
            label,
            index,
            probabilities,
        })
    }

    /// Predict every path independently; one result per path, in order.
    pub fn predict_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Vec<Result<Prediction, InferenceError>> {
        paths
            .iter()
            .map(|path| self.predict_file(path.as_ref()))
            .collect()
    }
}

/// Write `(actual, predicted)` emotion names as a CSV table.
pub fn write_predictions_csv(path: &Path, rows: &[(String, String)]) -> std::io::Result<()> {
    write_atomic_with(path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(PREDICTIONS_COLUMNS)?;
        for (actual, predicted) in rows {
            writer.write_record([actual, predicted])?;
        }
        writer.flush()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictions_table_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        write_predictions_csv(
            &path,
            &[
                ("happy".to_string(), "sad".to_string()),
                ("fear".to_string(), "fear".to_string()),
            ],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "actualvalues,predictedvalues\nhappy,sad\nfear,fear\n");
    }

    #[test]
    fn loading_a_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = EmotionPredictor::load(dir.path(), 22_050).unwrap_err();
        assert!(matches!(err, ModelLoadError::Missing(_)));
    }
}
