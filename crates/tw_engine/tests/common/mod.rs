use std::sync::atomic::{AtomicBool, Ordering};

use tw_backend::{BackendError, BackendResult, BatchWrite, Document, DocumentBackend, MemoryBackend};

/// A memory backend whose writes can be made to fail on demand.
pub struct FailingBackend {
    inner: MemoryBackend,
    fail_writes: AtomicBool,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl DocumentBackend for FailingBackend {
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        self.inner.get(collection, id).await
    }

    async fn write_batch(&self, writes: Vec<BatchWrite>) -> BackendResult<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(BackendError::Other("injected write failure".to_owned()));
        }
        self.inner.write_batch(writes).await
    }

    async fn list(&self, collection: &str) -> BackendResult<Vec<(String, Document)>> {
        self.inner.list(collection).await
    }
}
