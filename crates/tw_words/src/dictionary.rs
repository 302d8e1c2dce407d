use std::path::{Path, PathBuf};

use tw_types::{MAX_WORD_LEN, MIN_WORD_LEN};

#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error("failed to read dictionary {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("dictionary {path:?} contained no usable words")]
    Empty { path: PathBuf },
}

/// An immutable set of lowercase words, loaded once at startup.
///
/// Entries outside `[MIN_WORD_LEN, MAX_WORD_LEN]` or containing anything but
/// ASCII lowercase letters are dropped on load — the stream only ever
/// contains `a..=z`, so nothing else can match.
#[derive(Debug)]
pub struct Dictionary {
    words: ahash::HashSet<Box<str>>,
}

impl Dictionary {
    /// Load a newline-delimited word list.
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_owned(),
            source,
        })?;

        let dictionary = Self::from_words(contents.lines());
        if dictionary.is_empty() {
            return Err(DictionaryError::Empty {
                path: path.to_owned(),
            });
        }

        log::debug!(
            "loaded {} dictionary words from {path:?}",
            dictionary.len()
        );
        Ok(dictionary)
    }

    /// Build a dictionary from any word iterator, applying the same filter
    /// as [`Self::load`].
    pub fn from_words<I>(words: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let words = words
            .into_iter()
            .filter_map(|word| {
                let word = word.as_ref().trim();
                let usable = (MIN_WORD_LEN..=MAX_WORD_LEN).contains(&word.len())
                    && word.bytes().all(|b| b.is_ascii_lowercase());
                usable.then(|| word.into())
            })
            .collect();
        Self { words }
    }

    #[inline]
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
