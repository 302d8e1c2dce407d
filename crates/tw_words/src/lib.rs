//! Dictionary words, and finding them in the stream as it flows past.

mod detector;
mod dictionary;

pub use self::detector::WordDetector;
pub use self::dictionary::{Dictionary, DictionaryError};
