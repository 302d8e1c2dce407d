use std::sync::Arc;
use std::time::Duration;

use tw_backend::MemoryBackend;
use tw_engine::reconcile;
use tw_monkey::Monkey;
use tw_store::{ChunkStore, ChunkStoreOptions, WordStore, WordStoreOptions};
use tw_types::WordHit;
use tw_words::{Dictionary, WordDetector};

fn hit(start: u64, word: &str) -> WordHit {
    WordHit {
        start,
        len: word.len() as u32,
        word: word.to_owned(),
    }
}

fn store_opts(chunk_len: u64) -> ChunkStoreOptions {
    ChunkStoreOptions {
        chunk_len,
        lru_capacity: 32,
        flush_interval: Duration::from_secs(3600),
    }
}

fn word_opts() -> WordStoreOptions {
    WordStoreOptions {
        batch_size: 16,
        flush_interval: Duration::from_secs(3600),
    }
}

async fn append_str(store: &ChunkStore, text: &str) {
    for ch in text.chars() {
        store.append(ch).await.unwrap();
    }
}

#[tokio::test]
async fn scan_recovers_unpersisted_words() {
    let backend = Arc::new(MemoryBackend::new());
    let store = ChunkStore::create(backend.clone(), store_opts(8))
        .await
        .unwrap();
    let words = WordStore::create(backend.clone(), word_opts());
    let dictionary = Arc::new(Dictionary::from_words(["cat"]));

    append_str(&store, "zzzcatzz").await;

    // Nothing was ever persisted to the word store; the scan finds the hit.
    let hits = reconcile(&store, &words, &dictionary).await.unwrap();
    assert_eq!(hits, vec![hit(3, "cat")]);
    assert_eq!(backend.document_count("words"), 1);
}

#[tokio::test]
async fn scan_starts_with_left_context_but_keeps_only_new_hits() {
    let backend = Arc::new(MemoryBackend::new());
    let store = ChunkStore::create(backend.clone(), store_opts(8))
        .await
        .unwrap();
    let words = WordStore::create(backend.clone(), word_opts());
    let dictionary = Arc::new(Dictionary::from_words(["cat"]));

    append_str(&store, "catcat").await;

    // The first hit made it to disk before the "crash"; the second did not.
    words.add(hit(0, "cat")).await.unwrap();
    words.flush().await.unwrap();
    assert_eq!(words.high_water(), 3);

    let hits = reconcile(&store, &words, &dictionary).await.unwrap();
    assert_eq!(hits, vec![hit(0, "cat"), hit(3, "cat")]);
    assert_eq!(backend.document_count("words"), 2);
}

#[tokio::test]
async fn scan_sees_words_across_chunk_boundaries() {
    let backend = Arc::new(MemoryBackend::new());
    let store = ChunkStore::create(backend.clone(), store_opts(4))
        .await
        .unwrap();
    let words = WordStore::create(backend, word_opts());
    let dictionary = Arc::new(Dictionary::from_words(["cats"]));

    // "cats" occupies positions 2..6: it straddles the chunk 0 / chunk 1
    // boundary at 4.
    append_str(&store, "zzcatszz").await;

    let hits = reconcile(&store, &words, &dictionary).await.unwrap();
    assert_eq!(hits, vec![hit(2, "cats")]);
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let backend = Arc::new(MemoryBackend::new());
    let store = ChunkStore::create(backend.clone(), store_opts(8))
        .await
        .unwrap();
    let words = WordStore::create(backend.clone(), word_opts());
    let dictionary = Arc::new(Dictionary::from_words(["dog", "cat"]));

    append_str(&store, "xdogxcatx").await;

    let first = reconcile(&store, &words, &dictionary).await.unwrap();
    let second = reconcile(&store, &words, &dictionary).await.unwrap();
    similar_asserts::assert_eq!(first, second);
    assert_eq!(backend.document_count("words"), 2);
}

/// The crash/restart scenario: a run is cut short with the word index
/// lagging the stream, and reconciliation must restore exactly what an
/// uninterrupted run would have recorded.
#[tokio::test]
async fn crash_recovery_matches_an_uninterrupted_run() {
    let seed = 0x5EED_0F_5EED_u64;
    let dictionary = Arc::new(Dictionary::from_words([
        "cat", "dog", "rat", "ape", "owl", "bee", "fox", "hen", "sow", "ewe",
    ]));

    // Ground truth: one uninterrupted pass over 1000 generated characters.
    let mut monkey = Monkey::new(seed);
    let mut detector = WordDetector::new(dictionary.clone());
    let mut stream = String::new();
    let mut all_hits = Vec::new();
    for i in 0..1000_u64 {
        let ch = monkey.next_letter();
        stream.push(ch);
        if let Some(hit) = detector.push(ch, i) {
            all_hits.push(hit);
        }
    }

    // The "crashed" run: all 1000 characters became durable, but only word
    // hits ending by position 600 were flushed before the crash.
    let backend = Arc::new(MemoryBackend::new());
    {
        let store = ChunkStore::create(backend.clone(), store_opts(256))
            .await
            .unwrap();
        append_str(&store, &stream).await;
        store.close().await.unwrap();

        let words = WordStore::create(backend.clone(), word_opts());
        for hit in all_hits.iter().filter(|hit| hit.end() <= 600) {
            words.add(hit.clone()).await.unwrap();
        }
        words.close().await.unwrap();
    }

    // Restart + reconcile.
    let store = ChunkStore::create(backend.clone(), store_opts(256))
        .await
        .unwrap();
    assert_eq!(store.cursor(), 1000);
    let words = WordStore::create(backend.clone(), word_opts());
    let recovered = reconcile(&store, &words, &dictionary).await.unwrap();

    let mut expected = all_hits.clone();
    expected.sort();
    similar_asserts::assert_eq!(recovered, expected);

    // And the persisted set now matches the uninterrupted run too.
    let reloaded = WordStore::create(backend, word_opts());
    similar_asserts::assert_eq!(reloaded.load_all().await.unwrap(), expected);
}
