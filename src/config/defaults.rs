use std::path::PathBuf;

use crate::analysis::DEFAULT_SAMPLE_RATE;
use crate::labeling::DEFAULT_EMOTIONS;

pub(super) const MAX_WORKER_COUNT: usize = 64;

pub(super) fn default_true() -> bool {
    true
}

pub(super) fn default_dataset_root() -> PathBuf {
    PathBuf::from("dataset")
}

pub(super) fn default_emotions() -> Vec<String> {
    DEFAULT_EMOTIONS.iter().map(|name| name.to_string()).collect()
}

pub(super) fn default_split_ratio() -> f64 {
    0.75
}

pub(super) fn default_seed() -> u64 {
    42
}

pub(super) fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

pub(super) fn clamp_worker_count(value: Option<usize>) -> Option<usize> {
    value.map(|count| count.min(MAX_WORKER_COUNT))
}
