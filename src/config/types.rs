use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::dataset::{FailurePolicy, MatrixOptions, SplitOptions, default_index_path};
use crate::labeling::LabelVocabulary;
use crate::ml::cnn::TrainOptions;

use super::defaults::{
    clamp_worker_count, default_dataset_root, default_emotions, default_sample_rate,
    default_seed, default_split_ratio, default_true,
};

/// Directory name used for the trained model when `[output] model_dir` is unset.
pub const DEFAULT_MODEL_NAME: &str = "emotion_cnn";

/// Errors that may occur while loading, saving or checking a pipeline config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write a config file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Failed to serialize config to TOML.
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    /// A value parsed but cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// No usable application directory for defaulted paths.
    #[error(transparent)]
    AppDir(#[from] AppDirError),
}

/// Complete pipeline configuration, one TOML table per stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub dataset: DatasetSettings,
    #[serde(default)]
    pub features: FeatureSettings,
    #[serde(default)]
    pub training: TrainOptions,
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSettings {
    /// Folder whose subfolders are named after emotions.
    #[serde(default = "default_dataset_root")]
    pub root: PathBuf,
    /// Index CSV location; defaults to `index.csv` inside `root`.
    #[serde(default)]
    pub index_path: Option<PathBuf>,
    /// Class names in label order.
    #[serde(default = "default_emotions")]
    pub emotions: Vec<String>,
    #[serde(default = "default_true")]
    pub shuffle: bool,
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            root: default_dataset_root(),
            index_path: None,
            emotions: default_emotions(),
            shuffle: default_true(),
            split_ratio: default_split_ratio(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettings {
    /// Nominal rate R; analysis decodes at 2R.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Extraction worker override (unset = available parallelism).
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            workers: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Output locations. Unset paths resolve under the app models directory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    #[serde(default)]
    pub predictions_path: Option<PathBuf>,
    #[serde(default)]
    pub history_path: Option<PathBuf>,
}

/// Output paths after defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutput {
    pub model_dir: PathBuf,
    pub predictions_path: PathBuf,
    pub history_path: PathBuf,
}

impl PipelineConfig {
    /// Clamp out-of-range values that have an obvious nearest setting.
    pub fn normalized(mut self) -> Self {
        self.features.workers = clamp_worker_count(self.features.workers);
        self
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vocabulary()?;
        let ratio = self.dataset.split_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::InvalidConfiguration(format!(
                "split_ratio {ratio} must be in (0, 1]"
            )));
        }
        if self.features.sample_rate == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "sample_rate must be positive".into(),
            ));
        }
        if self.features.workers == Some(0) {
            return Err(ConfigError::InvalidConfiguration(
                "workers must be at least 1 when set".into(),
            ));
        }
        self.training
            .validate()
            .map_err(|err| ConfigError::InvalidConfiguration(err.to_string()))
    }

    pub fn vocabulary(&self) -> Result<LabelVocabulary, ConfigError> {
        LabelVocabulary::new(&self.dataset.emotions)
            .map_err(|err| ConfigError::InvalidConfiguration(err.to_string()))
    }

    pub fn index_path(&self) -> PathBuf {
        self.dataset
            .index_path
            .clone()
            .unwrap_or_else(|| default_index_path(&self.dataset.root))
    }

    pub fn split_options(&self) -> SplitOptions {
        SplitOptions {
            shuffle: self.dataset.shuffle,
            split_ratio: Some(self.dataset.split_ratio),
            seed: self.dataset.seed,
        }
    }

    pub fn matrix_options(&self) -> MatrixOptions {
        MatrixOptions {
            sample_rate: self.features.sample_rate,
            workers: self.features.workers,
            failure_policy: self.features.failure_policy,
        }
    }

    pub fn train_options(&self) -> TrainOptions {
        self.training.clone()
    }

    /// Fill unset output paths; predictions and history sit next to the model.
    pub fn resolve_output(&self) -> Result<ResolvedOutput, ConfigError> {
        let model_dir = match &self.output.model_dir {
            Some(dir) => dir.clone(),
            None => app_dirs::models_dir()?.join(DEFAULT_MODEL_NAME),
        };
        let predictions_path = self
            .output
            .predictions_path
            .clone()
            .unwrap_or_else(|| model_dir.join("predictions.csv"));
        let history_path = self
            .output
            .history_path
            .clone()
            .unwrap_or_else(|| model_dir.join("history.json"));
        Ok(ResolvedOutput {
            model_dir,
            predictions_path,
            history_path,
        })
    }
}
