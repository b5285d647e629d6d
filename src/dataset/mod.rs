//! Dataset indexing, splitting and feature-matrix assembly.

mod index;
mod matrix;
mod progress;
mod split;

pub use index::{
    AudioSample, DEFAULT_INDEX_FILE_NAME, DatasetIndex, INDEX_HEADER, IndexError, build_index,
    default_index_path, scan_dataset, write_index,
};
pub use matrix::{FailurePolicy, FeatureMatrix, MatrixError, MatrixOptions, build_feature_matrix};
pub use progress::MatrixProgress;
pub use split::{
    Loaded, Split, SplitError, SplitOptions, load_index, load_split, split_rows, train_len,
};
