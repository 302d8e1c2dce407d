//! The streaming engine: the single writer that makes the monkey type.
//!
//! One task drives the whole pipeline in order — generator, durable append,
//! `char` broadcast, word detection, `word` broadcast + persistence — at a
//! rate derived from how many people are watching. Everything downstream
//! (WebSocket connections, REST reads) hangs off [`Engine::subscribe`] and
//! the stores.

mod engine;
mod pace;
mod reconcile;

pub use self::engine::{Engine, EngineOptions, Snapshot};
pub use self::pace::Pacer;
pub use self::reconcile::reconcile;

// ---

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] tw_store::StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;
