//! Machine learning helpers for training and inference.
//!
//! The classifier consumes fixed-width feature rows and is persisted as a
//! versioned artifact directory.

pub mod cnn;
pub mod metrics;
