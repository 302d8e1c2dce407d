use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tokio::sync::Mutex;

use crate::{BackendResult, BatchWrite, Document, DocumentBackend};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// A single-file JSON snapshot of the whole database.
///
/// Every batch is applied to a copy of the in-memory state, serialized, and
/// atomically swapped in via temp-file + rename; a failed commit leaves both
/// memory and disk exactly as they were. Rewriting the full database per
/// batch is O(database size), which is fine at this service's scale — the
/// trait seam is where a real remote document store would take over.
pub struct FileBackend {
    path: PathBuf,
    state: Mutex<Collections>,
}

impl FileBackend {
    /// Open (or create) the database at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> BackendResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Collections::default(),
            Err(err) => return Err(err.into()),
        };

        log::debug!("opened document snapshot at {path:?}");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    async fn persist(&self, state: &Collections) -> BackendResult<()> {
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(state)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentBackend for FileBackend {
    async fn get(&self, collection: &str, id: &str) -> BackendResult<Option<Document>> {
        Ok(self
            .state
            .lock()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn write_batch(&self, writes: Vec<BatchWrite>) -> BackendResult<()> {
        let mut state = self.state.lock().await;

        // Apply to a copy, persist, and only then commit to memory: a failed
        // rename must not leave memory ahead of disk.
        let mut next = state.clone();
        for write in writes {
            next.entry(write.collection)
                .or_default()
                .insert(write.id, write.doc);
        }
        self.persist(&next).await?;

        *state = next;
        Ok(())
    }

    async fn list(&self, collection: &str) -> BackendResult<Vec<(String, Document)>> {
        Ok(self
            .state
            .lock()
            .await
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
