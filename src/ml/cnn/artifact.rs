//! On-disk model artifact: `topology.json` next to a full-precision `weights.mpk`.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::FEATURE_WIDTH;
use crate::atomic_file::write_atomic;
use crate::labeling::LabelVocabulary;

use super::model::{EmotionCnn, EmotionCnnConfig, LayerSpec, ParamShape};
use super::train::TrainOptions;

pub const ARTIFACT_VERSION: u32 = 1;
pub const TOPOLOGY_FILE: &str = "topology.json";
pub const WEIGHTS_FILE: &str = "weights.mpk";
const WEIGHTS_STEM: &str = "weights";
const PARTIAL_WEIGHTS_STEM: &str = "weights-partial";
const ARCHITECTURE: &str = "emotion_cnn_1d";

#[derive(Debug, Error)]
pub enum ModelSaveError {
    #[error("Failed to create model dir {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to record weights: {0}")]
    Record(String),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize topology: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Model file missing: {0}")]
    Missing(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid topology {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unsupported artifact version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("Model expects {found} input columns, features have {expected}")]
    InputWidth { found: usize, expected: usize },
    #[error("Vocabulary has {classes} classes but the output layer has {units} units")]
    Vocabulary { classes: usize, units: usize },
    #[error("Parameter shapes do not match the topology: {0}")]
    Shape(String),
    #[error("Failed to load weights: {0}")]
    Record(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSpec {
    pub kind: String,
    pub learning_rate: f64,
    pub rho: f64,
    pub epsilon: f64,
    pub decay: f64,
}

/// Everything needed to rebuild and check a trained network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub format_version: u32,
    pub architecture: String,
    pub input_width: usize,
    pub vocabulary: LabelVocabulary,
    pub network: EmotionCnnConfig,
    pub layers: Vec<LayerSpec>,
    pub parameter_shapes: Vec<ParamShape>,
    pub optimizer: OptimizerSpec,
    pub loss: String,
    pub metrics: Vec<String>,
    pub training: TrainOptions,
    /// Backend the weights were trained on.
    pub backend: String,
}

impl Topology {
    pub(crate) fn new(
        vocabulary: &LabelVocabulary,
        network: &EmotionCnnConfig,
        options: &TrainOptions,
        backend: &str,
    ) -> Self {
        Self {
            format_version: ARTIFACT_VERSION,
            architecture: ARCHITECTURE.to_string(),
            input_width: network.input_width,
            vocabulary: vocabulary.clone(),
            network: network.clone(),
            layers: network.layers(),
            parameter_shapes: network.parameter_shapes(),
            optimizer: OptimizerSpec {
                kind: "rmsprop".to_string(),
                learning_rate: options.learning_rate,
                rho: 0.9,
                epsilon: 1e-7,
                decay: options.decay,
            },
            loss: "categorical_crossentropy".to_string(),
            metrics: vec!["accuracy".to_string()],
            training: options.clone(),
            backend: backend.to_string(),
        }
    }

    /// Reject topologies this build cannot reproduce.
    pub fn check(&self) -> Result<(), ModelLoadError> {
        if self.format_version != ARTIFACT_VERSION {
            return Err(ModelLoadError::Version {
                found: self.format_version,
                expected: ARTIFACT_VERSION,
            });
        }
        if self.input_width != FEATURE_WIDTH || self.network.input_width != FEATURE_WIDTH {
            return Err(ModelLoadError::InputWidth {
                found: self.input_width,
                expected: FEATURE_WIDTH,
            });
        }
        if self.vocabulary.len() != self.network.num_classes {
            return Err(ModelLoadError::Vocabulary {
                classes: self.vocabulary.len(),
                units: self.network.num_classes,
            });
        }
        compare_shapes(&self.network.parameter_shapes(), &self.parameter_shapes)
    }
}

pub(crate) fn compare_shapes(
    expected: &[ParamShape],
    found: &[ParamShape],
) -> Result<(), ModelLoadError> {
    if expected.len() != found.len() {
        return Err(ModelLoadError::Shape(format!(
            "expected {} parameters, found {}",
            expected.len(),
            found.len()
        )));
    }
    for (want, got) in expected.iter().zip(found) {
        if want != got {
            return Err(ModelLoadError::Shape(format!(
                "{} is {:?}, expected {} {:?}",
                got.name, got.shape, want.name, want.shape
            )));
        }
    }
    Ok(())
}

/// Write weights first and topology last, each replaced atomically.
pub(crate) fn save_artifact<B: Backend>(
    model: &EmotionCnn<B>,
    topology: &Topology,
    dir: &Path,
) -> Result<(), ModelSaveError> {
    fs::create_dir_all(dir).map_err(|source| ModelSaveError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let partial = dir.join(PARTIAL_WEIGHTS_STEM);
    model
        .clone()
        .save_file(partial.clone(), &recorder)
        .map_err(|err| ModelSaveError::Record(format!("{err:?}")))?;
    let weights_path = dir.join(WEIGHTS_FILE);
    fs::rename(partial.with_extension("mpk"), &weights_path).map_err(|source| {
        ModelSaveError::Write {
            path: weights_path.clone(),
            source,
        }
    })?;

    let topology_path = dir.join(TOPOLOGY_FILE);
    let json = serde_json::to_vec_pretty(topology)?;
    write_atomic(&topology_path, &json).map_err(|source| ModelSaveError::Write {
        path: topology_path,
        source,
    })
}

pub(crate) fn read_topology(dir: &Path) -> Result<Topology, ModelLoadError> {
    let path = dir.join(TOPOLOGY_FILE);
    if !path.is_file() {
        return Err(ModelLoadError::Missing(path));
    }
    let bytes = fs::read(&path).map_err(|source| ModelLoadError::Read {
        path: path.clone(),
        source,
    })?;
    let topology: Topology =
        serde_json::from_slice(&bytes).map_err(|source| ModelLoadError::Parse { path, source })?;
    topology.check()?;
    Ok(topology)
}

/// Rebuild the network from `topology` and load its recorded weights.
pub(crate) fn load_weights<B: Backend>(
    topology: &Topology,
    dir: &Path,
    device: &B::Device,
) -> Result<EmotionCnn<B>, ModelLoadError> {
    let weights_path = dir.join(WEIGHTS_FILE);
    if !weights_path.is_file() {
        return Err(ModelLoadError::Missing(weights_path));
    }
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let model = topology
        .network
        .init::<B>(device)
        .load_file(dir.join(WEIGHTS_STEM), &recorder, device)
        .map_err(|err| ModelLoadError::Record(format!("{err:?}")))?;
    compare_shapes(&topology.parameter_shapes, &model.parameter_shapes())?;
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        let vocabulary = LabelVocabulary::emotions();
        let network = EmotionCnnConfig {
            input_width: FEATURE_WIDTH,
            num_classes: vocabulary.len(),
            dropout: 0.1,
        };
        Topology::new(&vocabulary, &network, &TrainOptions::default(), "ndarray")
    }

    #[test]
    fn fresh_topology_passes_checks_and_round_trips() {
        let topology = topology();
        topology.check().unwrap();
        let json = serde_json::to_string(&topology).unwrap();
        let parsed: Topology = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, topology);
        assert_eq!(parsed.optimizer.kind, "rmsprop");
    }

    #[test]
    fn mismatches_are_rejected() {
        let mut bad = topology();
        bad.format_version = 9;
        assert!(matches!(bad.check(), Err(ModelLoadError::Version { found: 9, .. })));

        let mut bad = topology();
        bad.input_width = 64;
        assert!(matches!(bad.check(), Err(ModelLoadError::InputWidth { .. })));

        let mut bad = topology();
        bad.network.num_classes = 3;
        assert!(matches!(bad.check(), Err(ModelLoadError::Vocabulary { .. })));

        let mut bad = topology();
        bad.parameter_shapes[0].shape = vec![1, 1, 1];
        assert!(matches!(bad.check(), Err(ModelLoadError::Shape(_))));
    }

    #[test]
    fn missing_topology_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_topology(dir.path()),
            Err(ModelLoadError::Missing(_))
        ));
    }
}
