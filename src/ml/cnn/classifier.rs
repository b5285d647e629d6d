use std::path::Path;

use burn::backend::Autodiff;
use tracing::info;

use crate::analysis::{FEATURE_WIDTH, FeatureVector};
use crate::labeling::{LabelVocabulary, argmax};

use super::artifact::{self, ModelLoadError, ModelSaveError, Topology};
#[cfg(feature = "cuda")]
use super::backend::{CudaBackend, CudaGpuDevice};
use super::backend::{
    BackendKind, CpuBackend, CpuDevice, GpuBackend, GpuDevice, backend_kind, init_wgpu,
};
use super::model::{EmotionCnn, EmotionCnnConfig};
use super::train::{
    CancelFlag, Evaluation, LabeledFeatures, TrainError, TrainOptions, TrainingHistory,
    evaluate_on, predict_on, train_on,
};

enum ClassifierModel {
    Cpu {
        model: EmotionCnn<CpuBackend>,
        device: CpuDevice,
    },
    Wgpu {
        model: EmotionCnn<GpuBackend>,
        device: GpuDevice,
    },
    #[cfg(feature = "cuda")]
    Cuda {
        model: EmotionCnn<CudaBackend>,
        device: CudaGpuDevice,
    },
}

macro_rules! with_model {
    ($inner:expr, |$model:ident, $device:ident| $body:expr) => {
        match $inner {
            ClassifierModel::Cpu {
                model: $model,
                device: $device,
            } => $body,
            ClassifierModel::Wgpu {
                model: $model,
                device: $device,
            } => $body,
            #[cfg(feature = "cuda")]
            ClassifierModel::Cuda {
                model: $model,
                device: $device,
            } => $body,
        }
    };
}

/// Trained emotion network plus the topology and vocabulary it was built with.
pub struct EmotionClassifier {
    model: ClassifierModel,
    topology: Topology,
}

impl std::fmt::Debug for EmotionClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionClassifier")
            .field("backend", &self.backend().name())
            .field("topology", &self.topology)
            .finish()
    }
}

impl EmotionClassifier {
    /// Train a fresh network on the backend chosen by `SEMOTION_BACKEND`.
    pub fn fit(
        vocabulary: &LabelVocabulary,
        train: LabeledFeatures<'_>,
        validation: Option<LabeledFeatures<'_>>,
        options: &TrainOptions,
        cancel: Option<&CancelFlag>,
    ) -> Result<(Self, TrainingHistory), TrainError> {
        options.validate()?;
        let classes = vocabulary.len();
        if classes < 2 {
            return Err(TrainError::NeedTwoClasses(classes));
        }
        if train.is_empty() {
            return Err(TrainError::EmptyDataset);
        }
        for data in std::iter::once(train).chain(validation) {
            if data.targets.classes() != classes {
                return Err(TrainError::ClassMismatch {
                    expected: classes,
                    actual: data.targets.classes(),
                });
            }
        }
        let config = EmotionCnnConfig {
            input_width: FEATURE_WIDTH,
            num_classes: classes,
            dropout: options.dropout,
        };
        let kind = backend_kind();
        info!(
            "Training on {} rows ({} validation) for {} epochs with the {} backend",
            train.len(),
            validation.map_or(0, |data| data.len()),
            options.epochs,
            kind.name()
        );
        let (model, history) = match kind {
            BackendKind::Cpu => {
                let device = CpuDevice::default();
                let (model, history) = train_on::<Autodiff<CpuBackend>>(
                    &device, &config, train, validation, options, cancel,
                )?;
                (ClassifierModel::Cpu { model, device }, history)
            }
            BackendKind::Wgpu => {
                let device = GpuDevice::default();
                init_wgpu(&device);
                let (model, history) = train_on::<Autodiff<GpuBackend>>(
                    &device, &config, train, validation, options, cancel,
                )?;
                (ClassifierModel::Wgpu { model, device }, history)
            }
            #[cfg(feature = "cuda")]
            BackendKind::Cuda => {
                let device = CudaGpuDevice::default();
                let (model, history) = train_on::<Autodiff<CudaBackend>>(
                    &device, &config, train, validation, options, cancel,
                )?;
                (ClassifierModel::Cuda { model, device }, history)
            }
        };
        let topology = Topology::new(vocabulary, &config, options, kind.name());
        Ok((Self { model, topology }, history))
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.topology.vocabulary
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn num_classes(&self) -> usize {
        self.topology.network.num_classes
    }

    pub fn backend(&self) -> BackendKind {
        match &self.model {
            ClassifierModel::Cpu { .. } => BackendKind::Cpu,
            ClassifierModel::Wgpu { .. } => BackendKind::Wgpu,
            #[cfg(feature = "cuda")]
            ClassifierModel::Cuda { .. } => BackendKind::Cuda,
        }
    }

    pub fn evaluate(&self, data: LabeledFeatures<'_>) -> Result<Evaluation, TrainError> {
        if data.targets.classes() != self.num_classes() {
            return Err(TrainError::ClassMismatch {
                expected: self.num_classes(),
                actual: data.targets.classes(),
            });
        }
        with_model!(&self.model, |model, device| evaluate_on(model, device, data))
    }

    /// Class probabilities, one row per input row.
    pub fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<Vec<f32>>, TrainError> {
        let classes = self.num_classes();
        with_model!(&self.model, |model, device| predict_on(
            model, device, rows, classes
        ))
    }

    /// Most probable class per row; ties go to the lowest index.
    pub fn predict_classes(&self, rows: &[FeatureVector]) -> Result<Vec<usize>, TrainError> {
        Ok(self
            .predict(rows)?
            .iter()
            .map(|probabilities| argmax(probabilities))
            .collect())
    }

    pub fn save(&self, dir: &Path) -> Result<(), ModelSaveError> {
        with_model!(&self.model, |model, _device| artifact::save_artifact(
            model,
            &self.topology,
            dir
        ))?;
        info!("Saved model to {}", dir.display());
        Ok(())
    }

    /// Load and validate an artifact directory on the `SEMOTION_BACKEND` backend.
    pub fn load(dir: &Path) -> Result<Self, ModelLoadError> {
        let topology = artifact::read_topology(dir)?;
        let model = match backend_kind() {
            BackendKind::Cpu => {
                let device = CpuDevice::default();
                let model = artifact::load_weights::<CpuBackend>(&topology, dir, &device)?;
                ClassifierModel::Cpu { model, device }
            }
            BackendKind::Wgpu => {
                let device = GpuDevice::default();
                init_wgpu(&device);
                let model = artifact::load_weights::<GpuBackend>(&topology, dir, &device)?;
                ClassifierModel::Wgpu { model, device }
            }
            #[cfg(feature = "cuda")]
            BackendKind::Cuda => {
                let device = CudaGpuDevice::default();
                let model = artifact::load_weights::<CudaBackend>(&topology, dir, &device)?;
                ClassifierModel::Cuda { model, device }
            }
        };
        Ok(Self { model, topology })
    }
}
