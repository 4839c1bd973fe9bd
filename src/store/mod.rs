pub mod file_store;
pub mod mem_store;
pub mod state;

pub use file_store::FileStore;
pub use mem_store::MemStore;
pub use state::EngineState;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a [`PersistentStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Atomic load/store of the engine's persisted aggregate.
///
/// Every write must be durable before the tick that issued it returns: a
/// crash between ticks is tolerated, a crash mid-write must never leave a
/// partially updated blob behind.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn load(&self) -> Result<EngineState, StoreError>;
    async fn store(&self, state: &EngineState) -> Result<(), StoreError>;
}
