//! The transport facade: REST under `/v1`, the live WebSocket at `/ws`, and
//! the wiring that turns a config into a running service.

mod config;
mod http;
mod ws;

pub use self::config::ServerConfig;
pub use self::http::handle;

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};

use tw_backend::{DocumentBackend, FileBackend, MemoryBackend};
use tw_engine::{Engine, EngineOptions};
use tw_store::{ChunkStore, ChunkStoreOptions, WordStore, WordStoreOptions};
use tw_words::Dictionary;

/// Bring the whole service up, serve until a shutdown signal, then wind the
/// engine down cleanly.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let engine = start_engine(&config).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let make_svc = make_service_fn({
        let engine = engine.clone();
        move |_conn| {
            let engine = engine.clone();
            async move {
                Ok::<_, std::convert::Infallible>(service_fn(move |req| {
                    let engine = engine.clone();
                    async move { Ok::<_, std::convert::Infallible>(handle(req, engine).await) }
                }))
            }
        }
    });

    let server = hyper::Server::try_bind(&addr)?.serve(make_svc);
    log::info!("listening on http://{}", server.local_addr());

    server.with_graceful_shutdown(shutdown_signal()).await?;

    engine.shutdown().await?;
    Ok(())
}

async fn start_engine(config: &ServerConfig) -> anyhow::Result<Arc<Engine>> {
    let backend: Arc<dyn DocumentBackend> = if config.ephemeral {
        log::info!("using the in-memory backend; nothing will be persisted");
        Arc::new(MemoryBackend::new())
    } else {
        let path = config.data_dir.join("typewriter.json");
        Arc::new(FileBackend::open(path).await?)
    };

    let dictionary = Arc::new(Dictionary::load(&config.dict_path)?);
    log::info!(
        "dictionary ready: {} words from {:?}",
        dictionary.len(),
        config.dict_path
    );

    let store = ChunkStore::create(backend.clone(), ChunkStoreOptions::default()).await?;
    let words = WordStore::create(backend, WordStoreOptions::default());

    let engine = Engine::start(
        store,
        words,
        dictionary,
        EngineOptions {
            simulate_audience: config.test_mode,
            ..Default::default()
        },
    )
    .await?;
    Ok(engine)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                log::warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    log::info!("shutdown signal received");
}
