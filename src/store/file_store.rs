//! Filesystem-backed `PersistentStore`: one JSON blob, written atomically.

use super::{EngineState, PersistentStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join("engine_state.json"),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    async fn load(&self) -> Result<EngineState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(EngineState::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn store(&self, state: &EngineState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        // rename is atomic on the same filesystem: a crash between the write
        // above and the rename below leaves the previous durable state
        // untouched, never a half-written `engine_state.json`.
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        let tmp = self.tmp_path();
        if tmp.exists() {
            warn!(path = %tmp.display(), "leftover temp state file on shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ControllerState;

    #[tokio::test]
    async fn round_trips_state_across_store_and_load() {
        let dir = tempdir();
        let store = FileStore::new(&dir);

        let mut state = EngineState::default();
        state.current_state = ControllerState::BatteryStorage;
        state.hws_on = true;

        store.store(&state).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.current_state, ControllerState::BatteryStorage);
        assert!(loaded.hws_on);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn missing_file_loads_as_default_state() {
        let dir = tempdir();
        let store = FileStore::new(&dir);
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.current_state, ControllerState::ExportPriority);
    }

    fn tempdir() -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "export-trajectory-controller-test-{}-{n}",
            std::process::id()
        ));
        dir
    }
}
