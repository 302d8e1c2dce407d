//! Durable storage for the stream: chunked append-only text, and the set of
//! detected words. Both stores sit on a [`tw_backend::DocumentBackend`] and
//! follow the same write-behind discipline — mutate in memory immediately,
//! mirror out on a timer or a threshold, atomically.

mod chunk_store;
mod flusher;
mod word_store;

pub use self::chunk_store::{ChunkStore, ChunkStoreOptions, CHUNKS_COLLECTION, META_COLLECTION};
pub use self::word_store::{WordStore, WordStoreOptions, WORDS_COLLECTION};

// ---

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] tw_backend::BackendError),

    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("malformed document {collection}/{id}: {source}")]
    MalformedDocument {
        collection: String,
        id: String,
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) fn parse_doc<T: serde::de::DeserializeOwned>(
    collection: &str,
    id: &str,
    doc: tw_backend::Document,
) -> StoreResult<T> {
    serde_json::from_value(doc).map_err(|source| StoreError::MalformedDocument {
        collection: collection.to_owned(),
        id: id.to_owned(),
        source,
    })
}
