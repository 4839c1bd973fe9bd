//! Typed errors an internal caller branches on. Call sites that only need
//! to propagate with context use `anyhow::Result` instead (see `main.rs`).
//!
//! Validation failures are not represented here: `Engine::tick` handles
//! them inline, logging an `ERROR(high)` event and returning a degraded
//! `Ok(Command)` rather than raising an error (see spec §7).

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
