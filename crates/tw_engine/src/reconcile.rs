use std::sync::Arc;

use tw_store::{ChunkStore, WordStore};
use tw_types::{WordHit, MAX_WORD_LEN};
use tw_words::{Dictionary, WordDetector};

use crate::EngineResult;

/// Recover the word index after a restart.
///
/// The cursor flush and the word flush run on different timers, so a crash
/// can leave characters that were durably stored but whose words were never
/// persisted. This re-runs a fresh detector over `[H, cursor)` — starting
/// `MAX_WORD_LEN - 1` characters earlier for left context, so a word
/// *ending* at or after the high-water mark `H` is still recognized —
/// persists every recovered hit, and returns the complete hit list
/// (persisted + recovered) sorted by start.
///
/// After this, the persisted set equals what a single uninterrupted run up
/// to `cursor` would have produced. Idempotent: recovered hits re-use the
/// `(start, len)` document identity, so running this twice changes nothing.
pub async fn reconcile(
    store: &ChunkStore,
    words: &WordStore,
    dictionary: &Arc<Dictionary>,
) -> EngineResult<Vec<WordHit>> {
    let mut hits = words.load_all().await?;
    let high_water = words.high_water();
    let cursor = store.cursor();

    let scan_from = high_water.saturating_sub(MAX_WORD_LEN as u64 - 1);
    if cursor > scan_from {
        log::info!(
            "scanning [{scan_from}, {cursor}) for words missed before the last shutdown"
        );

        let mut detector = WordDetector::new(dictionary.clone());
        let mut recovered = Vec::new();
        let mut position = scan_from;

        while position < cursor {
            let want = (cursor - position).min(store.chunk_len());
            let slice = store.read_slice(position, want).await?;
            if slice.is_empty() {
                log::warn!("stream read at {position} came up empty; stopping the scan early");
                break;
            }

            for ch in slice.chars() {
                if let Some(hit) = detector.push(ch, position) {
                    // Word flushes are FIFO and hits are detected in end
                    // order, so the persisted set is exactly the hits ending
                    // by `H`. Anything ending later was lost — even a hit
                    // that *starts* before `H`. Hits ending by `H` only
                    // fired again because of the replayed left context.
                    if hit.end() > high_water {
                        recovered.push(hit);
                    }
                }
                position += 1;
            }

            if (slice.len() as u64) < want {
                break;
            }
        }

        if !recovered.is_empty() {
            log::info!("recovered {} word hits from the scan", recovered.len());
            for hit in &recovered {
                words.add(hit.clone()).await?;
            }
            words.flush().await?;

            hits.extend(recovered);
            hits.sort();
        }
    }

    Ok(hits)
}
