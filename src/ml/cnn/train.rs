use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use burn::module::AutodiffModule;
use burn::optim::{GradientsParams, Optimizer, RmsPropConfig};
use burn::tensor::activation::log_softmax;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor, TensorData};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::analysis::{FEATURE_WIDTH, FeatureVector};
use crate::labeling::{OneHot, argmax};

use super::model::{EmotionCnn, EmotionCnnConfig};

const EVAL_BATCH: usize = 256;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("Training set is empty")]
    EmptyDataset,
    #[error("Feature rows ({rows}) and targets ({targets}) differ in length")]
    ShapeMismatch { rows: usize, targets: usize },
    #[error("Target width {actual} does not match {expected} classes")]
    ClassMismatch { expected: usize, actual: usize },
    #[error("Need at least 2 classes, got {0}")]
    NeedTwoClasses(usize),
    #[error("Invalid training options: {0}")]
    InvalidOptions(String),
    #[error("Tensor readback failed: {0}")]
    Tensor(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Time-based decay: `lr / (1 + decay * step)`.
    pub decay: f64,
    pub dropout: f64,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 370,
            batch_size: 16,
            learning_rate: 1e-5,
            decay: 1e-6,
            dropout: 0.1,
            seed: 42,
        }
    }
}

impl TrainOptions {
    pub fn validate(&self) -> Result<(), TrainError> {
        if self.epochs == 0 {
            return Err(TrainError::InvalidOptions("epochs must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(TrainError::InvalidOptions("batch_size must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(TrainError::InvalidOptions(format!(
                "learning_rate {} must be positive",
                self.learning_rate
            )));
        }
        if !(self.decay.is_finite() && self.decay >= 0.0) {
            return Err(TrainError::InvalidOptions(format!(
                "decay {} must be non-negative",
                self.decay
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TrainError::InvalidOptions(format!(
                "dropout {} must be in [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }

    pub(crate) fn learning_rate_at(&self, step: u64) -> f64 {
        self.learning_rate / (1.0 + self.decay * step as f64)
    }
}

/// Feature rows paired with one-hot targets.
#[derive(Clone, Copy, Debug)]
pub struct LabeledFeatures<'a> {
    pub rows: &'a [FeatureVector],
    pub targets: &'a OneHot,
}

impl<'a> LabeledFeatures<'a> {
    pub fn new(rows: &'a [FeatureVector], targets: &'a OneHot) -> Result<Self, TrainError> {
        if rows.len() != targets.rows() {
            return Err(TrainError::ShapeMismatch {
                rows: rows.len(),
                targets: targets.rows(),
            });
        }
        Ok(Self { rows, targets })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn truth(&self, idx: usize) -> usize {
        argmax(self.targets.row(idx))
    }
}

/// Shared flag polled between batches; setting it stops training early.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub val_loss: Option<f32>,
    pub val_accuracy: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochStats>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub loss: f32,
    /// Fraction of rows whose argmax matches the target, in `[0, 1]`.
    pub accuracy: f32,
}

/// Run the full training loop on an autodiff backend.
///
/// Returns the inference-mode network; `history.cancelled` is set when the
/// cancel flag stopped training before the last epoch.
pub(crate) fn train_on<B: AutodiffBackend>(
    device: &B::Device,
    config: &EmotionCnnConfig,
    train: LabeledFeatures<'_>,
    validation: Option<LabeledFeatures<'_>>,
    options: &TrainOptions,
    cancel: Option<&CancelFlag>,
) -> Result<(EmotionCnn<B::InnerBackend>, TrainingHistory), TrainError> {
    B::seed(device, options.seed);
    let mut model: EmotionCnn<B> = config.init(device);
    let mut optim = RmsPropConfig::new()
        .with_alpha(0.9)
        .with_epsilon(1e-7)
        .init::<B, EmotionCnn<B>>();
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut history = TrainingHistory::default();
    let mut step = 0u64;

    'epochs: for epoch in 1..=options.epochs {
        order.shuffle(&mut rng);
        let mut loss_sum = 0.0_f64;
        let mut correct = 0usize;
        let mut seen = 0usize;
        for batch in order.chunks(options.batch_size) {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                history.cancelled = true;
                info!("Training cancelled during epoch {epoch}");
                break 'epochs;
            }
            let input = batch_input::<B>(train.rows, batch, device);
            let targets = batch_targets::<B>(train.targets, batch, device);
            let logits = model.forward(input);
            let log_probs = log_softmax(logits, 1);
            let predictions = read_rows(log_probs.clone().detach(), config.num_classes)?;
            for (row, &idx) in predictions.iter().zip(batch) {
                if argmax(row) == train.truth(idx) {
                    correct += 1;
                }
            }
            let loss = (log_probs * targets).sum_dim(1).mean().neg();
            let loss_value: f32 = loss.clone().into_scalar().elem();
            loss_sum += loss_value as f64 * batch.len() as f64;
            seen += batch.len();

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(options.learning_rate_at(step), model, grads);
            step += 1;
        }

        let train_loss = (loss_sum / seen.max(1) as f64) as f32;
        let train_accuracy = correct as f32 / seen.max(1) as f32;
        let val = match validation {
            Some(data) if !data.is_empty() => Some(evaluate_on(&model.valid(), device, data)?),
            _ => None,
        };
        info!(
            "epoch {epoch}/{}: loss {train_loss:.4} acc {train_accuracy:.3}{}",
            options.epochs,
            val.map(|v| format!(" val_loss {:.4} val_acc {:.3}", v.loss, v.accuracy))
                .unwrap_or_default()
        );
        history.epochs.push(EpochStats {
            epoch,
            train_loss,
            train_accuracy,
            val_loss: val.map(|v| v.loss),
            val_accuracy: val.map(|v| v.accuracy),
        });
    }

    Ok((model.valid(), history))
}

/// Mean cross-entropy and accuracy of `model` over `data`.
pub(crate) fn evaluate_on<B: Backend>(
    model: &EmotionCnn<B>,
    device: &B::Device,
    data: LabeledFeatures<'_>,
) -> Result<Evaluation, TrainError> {
    if data.is_empty() {
        return Ok(Evaluation {
            loss: 0.0,
            accuracy: 0.0,
        });
    }
    let classes = data.targets.classes();
    let mut loss_sum = 0.0_f64;
    let mut correct = 0usize;
    let indices: Vec<usize> = (0..data.len()).collect();
    for batch in indices.chunks(EVAL_BATCH) {
        let log_probs = log_softmax(model.forward(batch_input::<B>(data.rows, batch, device)), 1);
        for (row, &idx) in read_rows(log_probs, classes)?.iter().zip(batch) {
            let target = data.targets.row(idx);
            loss_sum -= row
                .iter()
                .zip(target)
                .map(|(lp, t)| *lp as f64 * *t as f64)
                .sum::<f64>();
            if argmax(row) == data.truth(idx) {
                correct += 1;
            }
        }
    }
    Ok(Evaluation {
        loss: (loss_sum / data.len() as f64) as f32,
        accuracy: correct as f32 / data.len() as f32,
    })
}

/// Softmax probabilities for every row.
pub(crate) fn predict_on<B: Backend>(
    model: &EmotionCnn<B>,
    device: &B::Device,
    rows: &[FeatureVector],
    classes: usize,
) -> Result<Vec<Vec<f32>>, TrainError> {
    let indices: Vec<usize> = (0..rows.len()).collect();
    let mut out = Vec::with_capacity(rows.len());
    for batch in indices.chunks(EVAL_BATCH) {
        let log_probs = log_softmax(model.forward(batch_input::<B>(rows, batch, device)), 1);
        out.extend(read_rows(log_probs.exp(), classes)?);
    }
    Ok(out)
}

fn batch_input<B: Backend>(
    rows: &[FeatureVector],
    batch: &[usize],
    device: &B::Device,
) -> Tensor<B, 3> {
    let mut flat = Vec::with_capacity(batch.len() * FEATURE_WIDTH);
    for &idx in batch {
        flat.extend_from_slice(&rows[idx]);
    }
    Tensor::from_data(TensorData::new(flat, [batch.len(), 1, FEATURE_WIDTH]), device)
}

fn batch_targets<B: Backend>(targets: &OneHot, batch: &[usize], device: &B::Device) -> Tensor<B, 2> {
    let mut flat = Vec::with_capacity(batch.len() * targets.classes());
    for &idx in batch {
        flat.extend_from_slice(targets.row(idx));
    }
    Tensor::from_data(TensorData::new(flat, [batch.len(), targets.classes()]), device)
}

fn read_rows<B: Backend>(tensor: Tensor<B, 2>, classes: usize) -> Result<Vec<Vec<f32>>, TrainError> {
    let values = tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| TrainError::Tensor(format!("{err:?}")))?;
    Ok(values
        .chunks(classes.max(1))
        .map(|row| row.to_vec())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learning_rate_decays_with_step() {
        let options = TrainOptions {
            learning_rate: 1e-3,
            decay: 0.5,
            ..TrainOptions::default()
        };
        assert!((options.learning_rate_at(0) - 1e-3).abs() < 1e-12);
        assert!((options.learning_rate_at(2) - 5e-4).abs() < 1e-12);
    }

    #[test]
    fn defaults_are_valid_and_zero_epochs_are_not() {
        assert!(TrainOptions::default().validate().is_ok());
        let bad = TrainOptions {
            epochs: 0,
            ..TrainOptions::default()
        };
        assert!(matches!(bad.validate(), Err(TrainError::InvalidOptions(_))));
        let bad = TrainOptions {
            dropout: 1.0,
            ..TrainOptions::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(!other.is_cancelled());
        flag.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn labeled_features_require_aligned_lengths() {
        let targets = OneHot::new(2, 2, vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let rows = vec![[0.0_f32; FEATURE_WIDTH]];
        assert!(matches!(
            LabeledFeatures::new(&rows, &targets),
            Err(TrainError::ShapeMismatch { rows: 1, targets: 2 })
        ));
    }
}
