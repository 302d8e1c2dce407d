use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::{Rng as _, SeedableRng as _};
use tokio::sync::{broadcast, watch};

use tw_monkey::Monkey;
use tw_store::{ChunkStore, WordStore};
use tw_types::{StreamEvent, WordHit, MAX_WORD_LEN};
use tw_words::{Dictionary, WordDetector};

use crate::{reconcile, EngineResult, Pacer};

// ---

#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Seed of the one true stream.
    pub seed: u64,

    /// Phantom viewers added to the live subscriber count.
    pub baseline_users: u64,

    /// Each viewer's contribution to the typing rate, in chars per minute.
    pub cpm_per_user: u64,

    /// Generation loop frequency.
    pub ticks_per_second: u32,

    /// Re-roll the audience jitter about once a second. Off means the rate
    /// is exactly `(subscribers + baseline) × cpm`.
    pub simulate_audience: bool,

    /// Broadcast channel depth per subscriber before they start lagging.
    pub event_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            seed: tw_types::STREAM_SEED,
            baseline_users: tw_types::BASELINE_USERS,
            cpm_per_user: tw_types::CPM_PER_USER,
            ticks_per_second: tw_types::TICKS_PER_SECOND,
            simulate_audience: true,
            event_capacity: 1024,
        }
    }
}

/// What a new subscriber gets: a consistent view of the stream at one
/// instant, plus the live feed from exactly that instant on.
pub struct Snapshot {
    /// Index of the next character the live feed will deliver.
    pub cursor: u64,

    /// Every word hit so far, sorted by start.
    pub hits: Vec<WordHit>,

    pub events: broadcast::Receiver<StreamEvent>,
}

/// Writer-side state: mutated only under the lock, and the writer publishes
/// to the broadcast channel while holding it, which is what makes
/// [`Engine::subscribe`] snapshots exact.
struct Shared {
    hits: Vec<WordHit>,

    /// Index of the next character the broadcast channel will carry.
    announced_cursor: u64,
}

struct Ticker {
    stop: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

/// The coupled streaming core: generator → store → detector → fan-out.
pub struct Engine {
    store: Arc<ChunkStore>,
    words: Arc<WordStore>,
    dictionary: Arc<Dictionary>,
    opts: EngineOptions,

    shared: Mutex<Shared>,
    events: broadcast::Sender<StreamEvent>,

    /// Cleared when generation halts on a fatal storage failure.
    healthy: AtomicBool,

    /// Current audience jitter, mirrored here so `/status` agrees with the
    /// tick loop.
    jitter: AtomicI64,

    started_at: Instant,
    ticker: Mutex<Option<Ticker>>,
}

impl Engine {
    /// Reconcile the word index with the stored stream, then start the
    /// generation loop. No subscriber is accepted before reconciliation has
    /// finished — `subscribe` only exists on the returned engine.
    pub async fn start(
        store: Arc<ChunkStore>,
        words: Arc<WordStore>,
        dictionary: Arc<Dictionary>,
        opts: EngineOptions,
    ) -> EngineResult<Arc<Self>> {
        let hits = reconcile(&store, &words, &dictionary).await?;
        let cursor = store.cursor();

        // Warm the live detector with the tail of the stored stream so a
        // word spanning the restart boundary is still detected. The warm-up
        // hits themselves are already known, so they are discarded.
        let mut detector = WordDetector::new(dictionary.clone());
        let context_len = (MAX_WORD_LEN as u64 - 1).min(cursor);
        let context_start = cursor - context_len;
        let context = store.read_slice(context_start, context_len).await?;
        for (i, ch) in context.chars().enumerate() {
            let _ = detector.push(ch, context_start + i as u64);
        }

        let (events, _) = broadcast::channel(opts.event_capacity);
        let engine = Arc::new(Self {
            store,
            words,
            dictionary,
            opts,
            shared: Mutex::new(Shared {
                hits,
                announced_cursor: cursor,
            }),
            events,
            healthy: AtomicBool::new(true),
            jitter: AtomicI64::new(0),
            started_at: Instant::now(),
            ticker: Mutex::new(None),
        });

        engine.spawn_ticker(detector);
        log::info!(
            "engine started at cursor {cursor} with {} known words",
            engine.shared.lock().hits.len()
        );
        Ok(engine)
    }

    fn spawn_ticker(self: &Arc<Self>, detector: WordDetector) {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_ticks(self.clone(), detector, stop_rx));
        *self.ticker.lock() = Some(Ticker { stop, handle });
    }

    /// Join the stream: a consistent `(cursor, hits)` snapshot and a live
    /// receiver whose first `char` event has exactly `index == cursor`.
    pub fn subscribe(&self) -> Snapshot {
        let shared = self.shared.lock();
        Snapshot {
            cursor: shared.announced_cursor,
            hits: shared.hits.clone(),
            events: self.events.subscribe(),
        }
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    /// Live subscribers right now.
    pub fn subscriber_count(&self) -> u64 {
        self.events.receiver_count() as u64
    }

    /// Subscribers plus the simulated audience; what the typing rate is
    /// derived from.
    pub fn users_online(&self) -> u64 {
        let users = self.subscriber_count() as i64
            + self.opts.baseline_users as i64
            + self.jitter.load(Ordering::Relaxed);
        users.max(0) as u64
    }

    pub fn chars_per_minute(&self) -> u64 {
        self.users_online() * self.opts.cpm_per_user
    }

    /// False once generation has halted on a fatal storage failure.
    pub fn healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stop generating, then flush and close both stores, in that order.
    pub async fn shutdown(&self) -> EngineResult<()> {
        let ticker = self.ticker.lock().take();
        if let Some(Ticker { stop, handle }) = ticker {
            stop.send(true).ok();
            handle.await.ok();
        }

        self.words.close().await?;
        self.store.close().await?;
        log::info!("engine shut down at cursor {}", self.store.cursor());
        Ok(())
    }
}

// ---

/// The single writer. Everything that mutates the stream happens here, in
/// order: generate, append durably, broadcast the character, detect, record
/// and broadcast the word, enqueue it for persistence.
async fn run_ticks(
    engine: Arc<Engine>,
    mut detector: WordDetector,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut monkey = Monkey::at(engine.opts.seed, engine.store.cursor());
    let mut pacer = Pacer::new();
    // ThreadRng isn't Send; this task is.
    let mut rng = rand::rngs::StdRng::from_os_rng();

    let dt = Duration::from_secs_f64(1.0 / engine.opts.ticks_per_second as f64);
    let mut interval = tokio::time::interval(dt);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop_rx.changed() => break,
        }

        if engine.opts.simulate_audience && tick % engine.opts.ticks_per_second as u64 == 0 {
            let jitter = rng.random_range(-tw_types::AUDIENCE_JITTER..=tw_types::AUDIENCE_JITTER);
            engine.jitter.store(jitter, Ordering::Relaxed);
        }
        tick += 1;

        let cps = (engine.users_online() * engine.opts.cpm_per_user) as f64 / 60.0;
        let due = pacer.tick(cps, dt);

        for _ in 0..due {
            let ch = monkey.next_letter();
            let idx = match engine.store.append(ch).await {
                Ok(idx) => idx,
                Err(err) => {
                    log::error!("durable append failed; halting generation: {err}");
                    engine.healthy.store(false, Ordering::Relaxed);
                    return;
                }
            };

            // Publish under the shared lock: subscription snapshots are taken
            // under the same lock, so nobody can miss or double-see an event.
            let hit = {
                let mut shared = engine.shared.lock();
                shared.announced_cursor = idx + 1;
                let _ = engine.events.send(StreamEvent::Char { index: idx, ch });

                detector.push(ch, idx).map(|hit| {
                    shared.hits.push(hit.clone());
                    let _ = engine.events.send(StreamEvent::Word { hit: hit.clone() });
                    hit
                })
            };

            if let Some(hit) = hit {
                log::debug!("the monkey typed {hit}");
                if let Err(err) = engine.words.add(hit).await {
                    log::warn!("failed to enqueue word hit (timer will retry): {err}");
                }
            }
        }
    }
}
