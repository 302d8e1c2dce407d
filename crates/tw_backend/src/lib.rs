//! The durable document backend the stream is persisted to.
//!
//! The streaming core only ever needs three operations from its database:
//! read one document, atomically write a batch of documents, and list a
//! collection. [`DocumentBackend`] captures that contract; everything above
//! it is backend-agnostic.
//!
//! Two implementations ship here:
//! * [`MemoryBackend`] — a hash map; for tests and ephemeral runs.
//! * [`FileBackend`] — a whole-database JSON snapshot on local disk with
//!   atomic (temp-file + rename) batch commits; for single-node durable runs.
//!
//! A real remote document database slots in behind the same trait.

mod file;
mod memory;

pub use self::file::FileBackend;
pub use self::memory::MemoryBackend;

/// Documents are schemaless JSON at this layer; the stores above parse them
/// into typed shapes.
pub type Document = serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("backend i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend (de)serialization failure: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("backend failure: {0}")]
    Other(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// One document write inside an atomic batch.
#[derive(Clone, Debug)]
pub struct BatchWrite {
    pub collection: String,
    pub id: String,
    pub doc: Document,
}

impl BatchWrite {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, doc: Document) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            doc,
        }
    }
}

/// A key/document store: string-keyed documents inside named collections.
///
/// `write_batch` is all-or-nothing: either every write in the batch is
/// durable afterwards, or none is. That atomicity is what lets the chunk
/// store advance a chunk and its cursor as one fact.
#[async_trait::async_trait]
pub trait DocumentBackend: Send + Sync + 'static {
    /// Fetch a single document, or `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Document>>;

    /// Atomically commit every write in the batch.
    async fn write_batch(&self, writes: Vec<BatchWrite>) -> BackendResult<()>;

    /// All documents of a collection, as `(id, document)` pairs.
    async fn list(&self, collection: &str) -> BackendResult<Vec<(String, Document)>>;

    /// Convenience: a batch of one.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> BackendResult<()> {
        self.write_batch(vec![BatchWrite::new(collection, id, doc)])
            .await
    }
}
