//! Convolutional emotion classifier built on burn.

mod artifact;
mod backend;
mod classifier;
mod model;
mod train;

pub use artifact::{
    ARTIFACT_VERSION, ModelLoadError, ModelSaveError, OptimizerSpec, TOPOLOGY_FILE, Topology,
    WEIGHTS_FILE,
};
pub use backend::{BACKEND_ENV, BackendKind, backend_kind};
pub use classifier::EmotionClassifier;
pub use model::{EmotionCnn, EmotionCnnConfig, LayerSpec, ParamShape};
pub use train::{
    CancelFlag, EpochStats, Evaluation, LabeledFeatures, TrainError, TrainOptions,
    TrainingHistory,
};
