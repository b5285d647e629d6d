use thiserror::Error;

use super::LabelVocabulary;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Label {label} is outside the {classes}-class vocabulary")]
    LabelOutOfRange { label: usize, classes: usize },
    #[error("Expected rows of width {expected}, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("A {rows}x{classes} target matrix needs {expected} values, got {actual}")]
    LengthMismatch {
        rows: usize,
        classes: usize,
        expected: usize,
        actual: usize,
    },
}

/// Row-major one-hot target matrix (`rows x classes`).
#[derive(Debug, Clone, PartialEq)]
pub struct OneHot {
    rows: usize,
    classes: usize,
    values: Vec<f32>,
}

impl OneHot {
    /// Wrap row-major values; `values.len()` must equal `rows * classes`.
    pub fn new(rows: usize, classes: usize, values: Vec<f32>) -> Result<Self, CodecError> {
        let expected = rows * classes;
        if values.len() != expected {
            return Err(CodecError::LengthMismatch {
                rows,
                classes,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            rows,
            classes,
            values,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.classes;
        &self.values[start..start + self.classes]
    }
}

/// Label codec fitted once against a vocabulary.
///
/// The codec that encoded the training targets is the only one used to encode
/// evaluation targets and decode predictions; it is handed around by reference
/// and never refitted from a different label column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCodec {
    vocabulary: LabelVocabulary,
}

impl LabelCodec {
    pub fn fit(vocabulary: &LabelVocabulary) -> Self {
        Self {
            vocabulary: vocabulary.clone(),
        }
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn num_classes(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn encode(&self, labels: &[usize]) -> Result<OneHot, CodecError> {
        let classes = self.num_classes();
        let mut values = vec![0.0f32; labels.len() * classes];
        for (row, &label) in labels.iter().enumerate() {
            if label >= classes {
                return Err(CodecError::LabelOutOfRange { label, classes });
            }
            values[row * classes + label] = 1.0;
        }
        Ok(OneHot {
            rows: labels.len(),
            classes,
            values,
        })
    }

    /// Argmax each row of a one-hot or probability matrix.
    pub fn decode(&self, matrix: &OneHot) -> Result<Vec<usize>, CodecError> {
        if matrix.classes != self.num_classes() {
            return Err(CodecError::WidthMismatch {
                expected: self.num_classes(),
                actual: matrix.classes,
            });
        }
        Ok((0..matrix.rows).map(|row| argmax(matrix.row(row))).collect())
    }

    /// Decode one probability vector into its class index.
    pub fn decode_row(&self, row: &[f32]) -> Result<usize, CodecError> {
        if row.len() != self.num_classes() {
            return Err(CodecError::WidthMismatch {
                expected: self.num_classes(),
                actual: row.len(),
            });
        }
        Ok(argmax(row))
    }

    /// Decode per-row probability vectors into class indices.
    pub fn decode_rows(&self, rows: &[Vec<f32>]) -> Result<Vec<usize>, CodecError> {
        rows.iter().map(|row| self.decode_row(row)).collect()
    }

    pub fn name(&self, index: usize) -> Result<&str, CodecError> {
        self.vocabulary
            .name(index)
            .ok_or(CodecError::LabelOutOfRange {
                label: index,
                classes: self.num_classes(),
            })
    }

    pub fn names(&self, indices: &[usize]) -> Result<Vec<&str>, CodecError> {
        indices.iter().map(|&index| self.name(index)).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.vocabulary.index_of(name)
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &value) in values.iter().enumerate() {
        if value > best_val {
            best_val = value;
            best = idx;
        }
    }
    best
}
