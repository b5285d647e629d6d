//! Emotion label vocabulary and the one-hot label codec.

mod codec;
mod vocabulary;

pub use codec::{CodecError, LabelCodec, OneHot, argmax};
pub use vocabulary::{DEFAULT_EMOTIONS, LabelVocabulary, VocabularyError};
