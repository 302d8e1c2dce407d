use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use tw_backend::{BatchWrite, DocumentBackend};
use tw_types::WordHit;

use crate::flusher::Flusher;
use crate::{parse_doc, StoreResult};

pub const WORDS_COLLECTION: &str = "words";

#[derive(serde::Serialize, serde::Deserialize)]
struct WordDoc {
    start: u64,
    len: u32,
    word: String,
    timestamp: u64,
}

// ---

#[derive(Clone, Debug)]
pub struct WordStoreOptions {
    /// Pending hits that force an immediate flush.
    pub batch_size: usize,

    /// Upper bound on how long a pending hit waits for the coalescing flush.
    pub flush_interval: Duration,
}

impl Default for WordStoreOptions {
    fn default() -> Self {
        Self {
            batch_size: tw_types::WORD_BATCH_SIZE,
            flush_interval: tw_types::WORD_FLUSH_INTERVAL,
        }
    }
}

struct Pending {
    hits: Vec<WordHit>,

    /// One past the end of the latest hit ever seen (pending or persisted).
    /// Monotone.
    high_water: u64,
}

/// The persistent set of detected words.
///
/// Hits are buffered and written in batches — immediately when the buffer
/// fills up, otherwise by a coalescing timer. Document ids are a pure
/// function of `(start, len)`, so replaying the same hit (after a restart
/// scan, say) rewrites the same document and the set stays a set.
pub struct WordStore {
    backend: Arc<dyn DocumentBackend>,
    opts: WordStoreOptions,
    pending: Mutex<Pending>,
    flusher: Mutex<Option<Flusher>>,
}

impl WordStore {
    pub fn create(backend: Arc<dyn DocumentBackend>, opts: WordStoreOptions) -> Arc<Self> {
        let store = Arc::new(Self {
            backend,
            opts,
            pending: Mutex::new(Pending {
                hits: Vec::new(),
                high_water: 0,
            }),
            flusher: Mutex::new(None),
        });

        let weak = Arc::downgrade(&store);
        let flusher = Flusher::spawn(store.opts.flush_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(store) = weak.upgrade() else { return };
                if let Err(err) = store.flush().await {
                    log::warn!("word flush failed (will retry): {err}");
                }
            }
        });
        *store.flusher.lock() = Some(flusher);

        store
    }

    /// Every persisted hit, sorted by start. Also (re)establishes the
    /// high-water mark, so call this before trusting [`Self::high_water`]
    /// on a fresh store.
    pub async fn load_all(&self) -> StoreResult<Vec<WordHit>> {
        let docs = self.backend.list(WORDS_COLLECTION).await?;

        let mut hits = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            let doc: WordDoc = parse_doc(WORDS_COLLECTION, &id, doc)?;
            hits.push(WordHit {
                start: doc.start,
                len: doc.len,
                word: doc.word,
            });
        }
        hits.sort();

        let high_water = hits.iter().map(WordHit::end).max().unwrap_or(0);
        {
            let mut pending = self.pending.lock();
            pending.high_water = pending.high_water.max(high_water);
        }

        log::info!(
            "word store open: {} persisted hits, high water {high_water}",
            hits.len()
        );
        Ok(hits)
    }

    /// One past the end of the latest hit seen so far.
    pub fn high_water(&self) -> u64 {
        self.pending.lock().high_water
    }

    /// Enqueue a hit for persistence. Returns immediately unless the buffer
    /// just filled up, in which case the forced flush is awaited.
    pub async fn add(&self, hit: WordHit) -> StoreResult<()> {
        let force_flush = {
            let mut pending = self.pending.lock();
            pending.high_water = pending.high_water.max(hit.end());
            pending.hits.push(hit);
            pending.hits.len() >= self.opts.batch_size
        };

        if force_flush {
            self.flush().await?;
        }
        Ok(())
    }

    /// Write all pending hits as one atomic batch. On failure the hits are
    /// re-queued and the next timer tick retries.
    pub async fn flush(&self) -> StoreResult<()> {
        let drained = std::mem::take(&mut self.pending.lock().hits);
        if drained.is_empty() {
            return Ok(());
        }

        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64);

        let mut writes = Vec::with_capacity(drained.len());
        for hit in &drained {
            writes.push(BatchWrite::new(
                WORDS_COLLECTION,
                hit.doc_id(),
                serde_json::to_value(WordDoc {
                    start: hit.start,
                    len: hit.len,
                    word: hit.word.clone(),
                    timestamp,
                })?,
            ));
        }

        let count = drained.len();
        match self.backend.write_batch(writes).await {
            Ok(()) => {
                log::debug!("persisted {count} word hits");
                Ok(())
            }
            Err(err) => {
                // Put them back in front of anything added meanwhile.
                let mut pending = self.pending.lock();
                let mut requeued = drained;
                requeued.append(&mut pending.hits);
                pending.hits = requeued;
                Err(err.into())
            }
        }
    }

    /// Stop the flush timer and write whatever is still pending.
    pub async fn close(&self) -> StoreResult<()> {
        let flusher = self.flusher.lock().take();
        if let Some(flusher) = flusher {
            flusher.stop().await;
        }
        self.flush().await
    }
}
