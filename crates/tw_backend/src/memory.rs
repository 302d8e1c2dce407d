use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::{BackendResult, BatchWrite, Document, DocumentBackend};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// An in-memory backend. Nothing survives the process; batches are trivially
/// atomic because they happen under one lock.
#[derive(Default)]
pub struct MemoryBackend {
    collections: Mutex<Collections>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently in a collection. Test helper.
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait::async_trait]
impl DocumentBackend for MemoryBackend {
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn write_batch(&self, writes: Vec<BatchWrite>) -> BackendResult<()> {
        let mut collections = self.collections.lock();
        for write in writes {
            collections
                .entry(write.collection)
                .or_default()
                .insert(write.id, write.doc);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> BackendResult<Vec<(String, Document)>> {
        Ok(self
            .collections
            .lock()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
