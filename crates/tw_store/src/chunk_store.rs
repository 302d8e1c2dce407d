use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};

use tw_backend::{BatchWrite, DocumentBackend};

use crate::flusher::Flusher;
use crate::{parse_doc, StoreResult};

pub const CHUNKS_COLLECTION: &str = "chunks";
pub const META_COLLECTION: &str = "meta";

const CURSOR_DOC_ID: &str = "cursor";

fn chunk_doc_id(id: u64) -> String {
    format!("chunk_{id}")
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ChunkDoc {
    text: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CursorDoc {
    index: u64,
}

// ---

#[derive(Clone, Debug)]
pub struct ChunkStoreOptions {
    /// Characters per finished chunk.
    pub chunk_len: u64,

    /// Finished chunks kept in memory.
    pub lru_capacity: usize,

    /// How often the dirty working chunk + cursor are mirrored out.
    pub flush_interval: Duration,
}

impl Default for ChunkStoreOptions {
    fn default() -> Self {
        Self {
            chunk_len: tw_types::CHUNK_LEN,
            lru_capacity: tw_types::LRU_CAPACITY,
            flush_interval: tw_types::CURSOR_FLUSH_INTERVAL,
        }
    }
}

/// The in-memory single-writer state: the cursor and the growing chunk.
struct State {
    /// Absolute index of the next character to be written. Always equals the
    /// total number of characters ever appended.
    cursor: u64,

    /// `chunk_id(cursor)`.
    working_id: u64,

    /// The growing chunk. `working.len() == cursor % chunk_len`, except for
    /// the moment inside `append` where it reaches `chunk_len` and rolls
    /// over.
    working: String,

    /// Set on every append; cleared when a flush captures its snapshot.
    dirty: bool,
}

/// Append-only text storage addressable by absolute index.
///
/// Writes go to the in-RAM working chunk immediately; durability follows in
/// one of two ways, both as *atomic* chunk+cursor batches:
/// * rollover — the moment the working chunk fills up, it and the advanced
///   cursor are committed together, then the chunk is promoted to the LRU;
/// * the flush timer — every couple of seconds the partial working chunk and
///   the cursor are mirrored out together, so a restart never sees a cursor
///   pointing into a chunk the backend doesn't have.
///
/// There is exactly one logical writer (`append` is never called
/// concurrently); reads may run concurrently with the writer and always
/// observe a consistent cursor/working pair.
pub struct ChunkStore {
    backend: Arc<dyn DocumentBackend>,
    opts: ChunkStoreOptions,
    state: RwLock<State>,
    lru: Mutex<LruCache<u64, Arc<str>>>,

    /// Serializes backend writes (rollover vs. timer flush) so the two can
    /// never interleave and regress a persisted chunk or cursor.
    write_gate: tokio::sync::Mutex<()>,

    flusher: Mutex<Option<Flusher>>,
}

impl ChunkStore {
    /// Open the store, adopting whatever the backend has: the persisted
    /// cursor and, if present, the partially-written working chunk.
    pub async fn create(
        backend: Arc<dyn DocumentBackend>,
        opts: ChunkStoreOptions,
    ) -> StoreResult<Arc<Self>> {
        let mut cursor = match backend.get(META_COLLECTION, CURSOR_DOC_ID).await? {
            Some(doc) => parse_doc::<CursorDoc>(META_COLLECTION, CURSOR_DOC_ID, doc)?.index,
            None => 0,
        };

        let mut working_id = cursor / opts.chunk_len;
        let mut working = String::new();
        let mut adopt_full = None;

        let working_doc_id = chunk_doc_id(working_id);
        if let Some(doc) = backend.get(CHUNKS_COLLECTION, &working_doc_id).await? {
            let text = parse_doc::<ChunkDoc>(CHUNKS_COLLECTION, &working_doc_id, doc)?.text;
            let offset = (cursor % opts.chunk_len) as usize;

            if text.len() as u64 == opts.chunk_len && offset == 0 {
                // The chunk at the cursor is already finished: seat it in the
                // LRU and open a fresh working chunk after it. The cursor
                // must follow, or the next append would land in the wrong
                // chunk.
                adopt_full = Some((working_id, text));
                working_id += 1;
                cursor = working_id * opts.chunk_len;
            } else {
                match text.len().cmp(&offset) {
                    std::cmp::Ordering::Equal => working = text,
                    std::cmp::Ordering::Greater => {
                        // The mirrored chunk ran ahead of the persisted
                        // cursor. The extra characters are exactly what the
                        // deterministic generator will type again, so drop
                        // them and let the stream re-materialize.
                        log::warn!(
                            "working chunk {working_id} has {} chars but cursor {cursor} \
                             expects {offset}; truncating",
                            text.len()
                        );
                        working = text;
                        working.truncate(offset);
                    }
                    std::cmp::Ordering::Less => {
                        // The cursor ran ahead of the mirrored chunk. Rewind
                        // to what is actually durable; regeneration fills the
                        // gap with identical characters.
                        log::warn!(
                            "cursor {cursor} points past working chunk {working_id} \
                             ({} chars); rewinding",
                            text.len()
                        );
                        cursor = working_id * opts.chunk_len + text.len() as u64;
                        working = text;
                    }
                }
            }
        } else if cursor % opts.chunk_len != 0 {
            log::warn!(
                "cursor {cursor} expects a working chunk {working_id} the backend doesn't \
                 have; rewinding to the chunk boundary"
            );
            cursor = working_id * opts.chunk_len;
        }

        let lru_capacity = NonZeroUsize::new(opts.lru_capacity).unwrap_or(NonZeroUsize::MIN);
        let store = Arc::new(Self {
            backend,
            opts,
            state: RwLock::new(State {
                cursor,
                working_id,
                working,
                dirty: false,
            }),
            lru: Mutex::new(LruCache::new(lru_capacity)),
            write_gate: tokio::sync::Mutex::new(()),
            flusher: Mutex::new(None),
        });

        if let Some((id, text)) = adopt_full {
            store.lru.lock().put(id, text.into());
        }

        let weak = Arc::downgrade(&store);
        let flusher = Flusher::spawn(store.opts.flush_interval, move || {
            let weak = weak.clone();
            async move {
                let Some(store) = weak.upgrade() else { return };
                if let Err(err) = store.flush_dirty().await {
                    log::warn!("cursor flush failed (will retry): {err}");
                }
            }
        });
        *store.flusher.lock() = Some(flusher);

        log::info!(
            "chunk store open: cursor={}, working chunk {}",
            store.cursor(),
            working_id
        );
        Ok(store)
    }

    /// Absolute index of the next character to be written.
    pub fn cursor(&self) -> u64 {
        self.state.read().cursor
    }

    /// Number of chunks with at least one character in them.
    pub fn chunk_count(&self) -> u64 {
        let state = self.state.read();
        state.working_id + !state.working.is_empty() as u64
    }

    pub fn chunk_len(&self) -> u64 {
        self.opts.chunk_len
    }

    /// Append one character, returning the absolute index it was written at.
    ///
    /// Must be called from the single writer only. If the append fills the
    /// working chunk, the chunk+cursor rollover batch is awaited before
    /// returning; a failed rollover rolls the append back and surfaces the
    /// error, so the caller can halt generation without having handed out an
    /// index that was never committable.
    pub async fn append(&self, ch: char) -> StoreResult<u64> {
        debug_assert!(ch.is_ascii_lowercase(), "stream characters are a..=z");

        let (idx, rollover) = {
            let mut state = self.state.write();
            let idx = state.cursor;
            state.working.push(ch);
            state.cursor += 1;
            state.dirty = true;

            let rollover = (state.working.len() as u64 >= self.opts.chunk_len)
                .then(|| (state.working_id, state.working.clone(), state.cursor));
            (idx, rollover)
        };

        if let Some((id, text, cursor)) = rollover {
            if let Err(err) = self.flush_full(id, text, cursor).await {
                let mut state = self.state.write();
                state.working.pop();
                state.cursor -= 1;
                return Err(err);
            }
        }

        Ok(idx)
    }

    /// Commit a finished chunk together with the advanced cursor, then
    /// promote it into the LRU and open a fresh working chunk.
    async fn flush_full(&self, id: u64, text: String, cursor: u64) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;

        self.backend
            .write_batch(vec![
                BatchWrite::new(
                    CHUNKS_COLLECTION,
                    chunk_doc_id(id),
                    serde_json::to_value(ChunkDoc { text: text.clone() })?,
                ),
                BatchWrite::new(
                    META_COLLECTION,
                    CURSOR_DOC_ID,
                    serde_json::to_value(CursorDoc { index: cursor })?,
                ),
            ])
            .await?;

        {
            let mut state = self.state.write();
            state.working_id = id + 1;
            state.working.clear();
            state.dirty = false; // the batch persisted the cursor too
        }
        self.lru.lock().put(id, text.into());

        log::debug!("chunk {id} finished at cursor {cursor}");
        Ok(())
    }

    /// Mirror the partial working chunk and the cursor out, if anything
    /// changed since the last flush. Both land in one atomic batch.
    pub async fn flush_dirty(&self) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;

        let (id, text, cursor) = {
            let mut state = self.state.write();
            if !state.dirty {
                return Ok(());
            }
            state.dirty = false;
            (state.working_id, state.working.clone(), state.cursor)
        };

        let result = self
            .backend
            .write_batch(vec![
                BatchWrite::new(
                    CHUNKS_COLLECTION,
                    chunk_doc_id(id),
                    serde_json::to_value(ChunkDoc { text })?,
                ),
                BatchWrite::new(
                    META_COLLECTION,
                    CURSOR_DOC_ID,
                    serde_json::to_value(CursorDoc { index: cursor })?,
                ),
            ])
            .await;

        if result.is_err() {
            self.state.write().dirty = true;
        }
        result.map_err(Into::into)
    }

    /// The text of one chunk: the working chunk's current contents, a cached
    /// finished chunk, or a read-through fetch. A chunk the backend has
    /// never seen reads as empty.
    pub async fn read_chunk(&self, id: u64) -> StoreResult<Arc<str>> {
        {
            let state = self.state.read();
            if id == state.working_id {
                return Ok(state.working.as_str().into());
            }
            if id > state.working_id {
                return Ok("".into());
            }
        }

        if let Some(text) = self.lru.lock().get(&id) {
            return Ok(text.clone());
        }

        let doc_id = chunk_doc_id(id);
        let text: Arc<str> = match self.backend.get(CHUNKS_COLLECTION, &doc_id).await? {
            Some(doc) => parse_doc::<ChunkDoc>(CHUNKS_COLLECTION, &doc_id, doc)?.text.into(),
            None => "".into(),
        };

        self.lru.lock().put(id, text.clone());
        Ok(text)
    }

    /// The stream text at `[start, start + len)`.
    ///
    /// Returns a shorter string when the request extends past the cursor, and
    /// an empty string when it starts at or past it (or `len == 0`).
    pub async fn read_slice(&self, start: u64, len: u64) -> StoreResult<String> {
        if len == 0 {
            return Ok(String::new());
        }

        let end = start.saturating_add(len);
        let first = start / self.opts.chunk_len;
        let last = (end - 1) / self.opts.chunk_len;

        let mut text = String::with_capacity(len as usize);
        for id in first..=last {
            text.push_str(&self.read_chunk(id).await?);
        }

        let begin = (start - first * self.opts.chunk_len) as usize;
        if begin >= text.len() {
            return Ok(String::new());
        }
        let stop = text.len().min(begin + len as usize);
        Ok(text[begin..stop].to_owned())
    }

    /// Stop the flush timer and run one final flush. The store is still
    /// readable afterwards, but nothing keeps it durable anymore.
    pub async fn close(&self) -> StoreResult<()> {
        let flusher = self.flusher.lock().take();
        if let Some(flusher) = flusher {
            flusher.stop().await;
        }
        self.flush_dirty().await
    }
}
