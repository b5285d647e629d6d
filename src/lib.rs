//! Library exports for the command-line tools, benchmarks and tests.
/// Feature extraction from speech clips.
pub mod analysis;
/// Application directory helpers.
pub mod app_dirs;
/// Whole-file atomic writes.
pub mod atomic_file;
/// TOML pipeline configuration.
pub mod config;
/// Dataset indexing, splitting and feature matrices.
pub mod dataset;
/// Single-clip prediction from a saved model.
pub mod inference;
/// Emotion vocabulary and label codec.
pub mod labeling;
/// Logging initialization.
pub mod logging;
/// Classifier, training loop and evaluation metrics.
pub mod ml;
/// Training pipeline orchestration.
pub mod pipeline;
