//! In-memory `PersistentStore`, for unit and scenario tests.

use super::{EngineState, PersistentStore, StoreError};
use async_trait::async_trait;
use tokio::sync::Mutex;

pub struct MemStore {
    state: Mutex<EngineState>,
}

impl MemStore {
    pub fn new(initial: EngineState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(EngineState::default())
    }
}

#[async_trait]
impl PersistentStore for MemStore {
    async fn load(&self) -> Result<EngineState, StoreError> {
        Ok(self.state.lock().await.clone())
    }

    async fn store(&self, state: &EngineState) -> Result<(), StoreError> {
        *self.state.lock().await = state.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ControllerState;

    #[tokio::test]
    async fn round_trips_in_memory() {
        let store = MemStore::default();
        let mut state = store.load().await.unwrap();
        state.current_state = ControllerState::SelfConsume;
        store.store(&state).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.current_state, ControllerState::SelfConsume);
    }
}
