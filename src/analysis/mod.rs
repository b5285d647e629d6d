//! Per-clip acoustic feature extraction.

mod audio;
mod chroma;
mod error;
mod features;
mod hpss;
mod mel;
mod pitch;
mod stft;

pub use error::ExtractionError;
pub use features::{ClipFeatures, FeatureVector, extract_features, features_from_samples};

/// Target sample rate when none is configured; analysis runs at twice this.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;
/// Start of the analysis window within each clip.
pub const WINDOW_OFFSET_SECONDS: f32 = 0.5;
pub const WINDOW_DURATION_SECONDS: f32 = 2.5;

pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;

pub const MFCC_LEN: usize = 13;
/// Slot width of the pitch and magnitude tracks.
pub const TRACK_CAP: usize = 20;
pub const CHROMA_LEN: usize = chroma::N_CHROMA;
pub const FEATURE_WIDTH: usize = MFCC_LEN + 2 * TRACK_CAP + CHROMA_LEN;
