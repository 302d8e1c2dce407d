//! Shared vocabulary for the typewriter stream.
//!
//! Everything here is keyed off the *absolute index*: the 0-based position of
//! a character in the single global stream. The index ties the in-memory
//! stream, the chunked durable storage and the word hits together, so all
//! crates speak in terms of the types and tunables defined here.

use std::fmt;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Compiled-in tunables.
//
// These are defaults: the store/engine constructors take them as explicit
// options so tests can shrink them (e.g. a 4-character chunk).

/// Characters per finished chunk.
pub const CHUNK_LEN: u64 = 8192;

/// Shortest dictionary word we care about.
pub const MIN_WORD_LEN: usize = 3;

/// Longest dictionary word we care about; also the detector window size.
pub const MAX_WORD_LEN: usize = 12;

/// Finished chunks kept in memory.
pub const LRU_CAPACITY: usize = 32;

/// Word hits buffered before a forced flush.
pub const WORD_BATCH_SIZE: usize = 16;

/// How often the dirty cursor (and partial working chunk) is mirrored out.
pub const CURSOR_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// How long word hits may sit in the pending buffer before a flush.
pub const WORD_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Generation loop frequency.
pub const TICKS_PER_SECOND: u32 = 60;

/// Each viewer speeds the monkey up by this many characters per minute.
pub const CPM_PER_USER: u64 = 5;

/// Phantom viewers keeping the stream alive when nobody is watching.
pub const BASELINE_USERS: u64 = 250;

/// Simulated-audience jitter is drawn from `-AUDIENCE_JITTER..=AUDIENCE_JITTER`.
pub const AUDIENCE_JITTER: i64 = 20;

/// The one true seed. Changing it forks the universe: every character ever
/// generated depends on it.
pub const STREAM_SEED: u64 = 0x6d6f_6e6b_6579_2121; // "monkey!!"

/// Upper bound on a single `/v1/chars` read, in characters.
pub const MAX_READ_LEN: u64 = 16 * CHUNK_LEN;

// ----------------------------------------------------------------------------

/// A dictionary word found in the stream.
///
/// The substring of the stream at `[start, start + len)` equals `word`,
/// forever: characters are immutable once generated. `(start, len)` is the
/// identity used for deduplication.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct WordHit {
    /// Absolute index of the first character of the word.
    pub start: u64,

    /// Word length in characters, in `[MIN_WORD_LEN, MAX_WORD_LEN]`.
    pub len: u32,

    pub word: String,
}

impl WordHit {
    /// One past the last character of the word.
    #[inline]
    pub fn end(&self) -> u64 {
        self.start + self.len as u64
    }

    /// Durable document id for this hit. A pure function of `(start, len)`,
    /// so re-writing the same hit collapses to one document.
    pub fn doc_id(&self) -> String {
        format!("word_{}_{}", self.start, self.len)
    }
}

impl fmt::Display for WordHit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}+{}", self.word, self.start, self.len)
    }
}

// ----------------------------------------------------------------------------

/// Everything the transport fans out to subscribers.
///
/// Serialized as JSON with a kebab-case `type` tag, e.g.
/// `{"type":"char","index":42,"ch":"q"}`. The first two variants are only
/// sent once per connection, as the initial snapshot.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Index of the next character the subscriber will receive live.
    Cursor { index: u64 },

    /// All word hits up to the snapshot point, sorted by `start`.
    InitWords { words: Vec<WordHit> },

    /// One generated character.
    Char { index: u64, ch: char },

    /// One detected word.
    Word {
        #[serde(flatten)]
        hit: WordHit,
    },
}

// ----------------------------------------------------------------------------
