//! In-process state store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::errors::BridgeError;
use crate::filesys::dir::Dir;
use crate::store::{ObjectSpec, StateChange, StateStore, StateValue};

const CHANGE_CAPACITY: usize = 64;

/// State store kept in memory. Blobs go to `files_dir` when one is given.
pub struct MemoryStore {
    states: RwLock<HashMap<String, StateValue>>,
    objects: RwLock<HashMap<String, ObjectSpec>>,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    files_dir: Option<Dir>,
    changes: broadcast::Sender<StateChange>,
}

impl MemoryStore {
    /// Store that keeps blobs in memory too
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            states: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            blobs: RwLock::new(HashMap::new()),
            files_dir: None,
            changes,
        }
    }

    /// Store that persists blobs below `files_dir`
    pub fn with_files_dir(files_dir: Dir) -> Self {
        Self {
            files_dir: Some(files_dir),
            ..Self::new()
        }
    }

    /// Declared object at `path`
    pub async fn object(&self, path: &str) -> Option<ObjectSpec> {
        self.objects.read().await.get(path).cloned()
    }

    /// Number of declared objects
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Blob most recently written in memory under `path`/`name`
    pub async fn blob(&self, path: &str, name: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(&blob_key(path, name)).cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn blob_key(path: &str, name: &str) -> String {
    format!("{}/{}", path, name)
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn set_state(&self, path: &str, val: Value, ack: bool) -> Result<(), BridgeError> {
        let value = StateValue {
            val,
            ack,
            ts: Utc::now(),
        };
        self.states
            .write()
            .await
            .insert(path.to_string(), value.clone());
        debug!("State {} = {} (ack={})", path, value.val, ack);

        // No subscribers is fine
        let _ = self.changes.send(StateChange {
            path: path.to_string(),
            value,
        });
        Ok(())
    }

    async fn get_state(&self, path: &str) -> Result<Option<StateValue>, BridgeError> {
        Ok(self.states.read().await.get(path).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    async fn ensure_object(&self, path: &str, spec: ObjectSpec) -> Result<bool, BridgeError> {
        let mut objects = self.objects.write().await;
        match objects.get(path) {
            Some(existing) if *existing == spec => Ok(false),
            Some(_) => {
                debug!("Object {} updated", path);
                objects.insert(path.to_string(), spec);
                Ok(true)
            }
            None => {
                debug!("Object {} created", path);
                objects.insert(path.to_string(), spec);
                Ok(true)
            }
        }
    }

    async fn write_blob(&self, path: &str, name: &str, data: &[u8]) -> Result<(), BridgeError> {
        match &self.files_dir {
            Some(dir) => dir.subdir(path).file(name).write_atomic(data).await,
            None => {
                self.blobs
                    .write()
                    .await
                    .insert(blob_key(path, name), data.to_vec());
                Ok(())
            }
        }
    }
}
