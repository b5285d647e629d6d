use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Emotion classes in label-index order.
pub const DEFAULT_EMOTIONS: &[&str] = &[
    "anger", "disgust", "fear", "happy", "neutral", "sad", "surprise",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("Label vocabulary is empty")]
    Empty,
    #[error("Label vocabulary contains an empty class name at position {0}")]
    BlankName(usize),
    #[error("Label vocabulary contains duplicate class '{0}'")]
    Duplicate(String),
}

/// Ordered list of class names; a label is a position in this list.
///
/// Names are normalized (trimmed, ASCII-lowercased) so directory names such as
/// `Happy` or ` sad ` resolve to the same class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelVocabulary {
    classes: Vec<String>,
}

impl LabelVocabulary {
    pub fn new<I, S>(classes: I) -> Result<Self, VocabularyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for (idx, class) in classes.into_iter().enumerate() {
            let name = normalize(class.as_ref());
            if name.is_empty() {
                return Err(VocabularyError::BlankName(idx));
            }
            if out.contains(&name) {
                return Err(VocabularyError::Duplicate(name));
            }
            out.push(name);
        }
        if out.is_empty() {
            return Err(VocabularyError::Empty);
        }
        Ok(Self { classes: out })
    }

    /// The seven-class emotion vocabulary.
    pub fn emotions() -> Self {
        Self {
            classes: DEFAULT_EMOTIONS.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        let name = normalize(name);
        self.classes.iter().position(|class| *class == name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.classes
    }
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        Self::emotions()
    }
}

impl TryFrom<Vec<String>> for LabelVocabulary {
    type Error = VocabularyError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LabelVocabulary> for Vec<String> {
    fn from(value: LabelVocabulary) -> Self {
        value.classes
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}
