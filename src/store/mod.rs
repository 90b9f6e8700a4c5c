pub mod csv_file;
pub mod disk;
pub mod fallback;
pub mod memory;
pub mod sheets;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::warn;

/// A thread-safe key-value store that can hold multiple collections.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    /// Opens a store persisting under `cache_dir`. Without a directory, or if
    /// it cannot be opened, persisted collections are unavailable.
    pub fn new(cache_dir: Option<&Path>) -> Self {
        let keyspace = cache_dir.and_then(|path| match fjall::Config::new(path).open() {
            Ok(keyspace) => Some(keyspace),
            Err(e) => {
                warn!("Could not open cache at {}: {}", path.display(), e);
                None
            }
        });

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }
}

impl Store for KeyValueStore {
    fn get_collection(
        &self,
        name: &str,
        persist: bool,
        create_if_missing: bool,
    ) -> Option<Arc<dyn KeyValueCollection>> {
        let key = format!("{name}:{persist}");
        if let Some(existing) = self.collections.read().ok()?.get(&key) {
            return Some(Arc::clone(existing));
        }
        if !create_if_missing {
            return None;
        }

        let collection: Arc<dyn KeyValueCollection> = if persist {
            let partition = self
                .keyspace
                .as_ref()?
                .open_partition(name, PartitionCreateOptions::default())
                .map_err(|e| warn!("Could not open cache partition {name}: {e}"))
                .ok()?;
            Arc::new(DiskCollection::new(partition))
        } else {
            Arc::new(MemoryCollection::new())
        };

        let mut collections = self.collections.write().ok()?;
        Some(Arc::clone(collections.entry(key).or_insert(collection)))
    }

    fn remove_collection(&self, name: &str) -> bool {
        match self.collections.write() {
            Ok(mut collections) => {
                let persisted = collections.remove(&format!("{name}:true")).is_some();
                let in_memory = collections.remove(&format!("{name}:false")).is_some();
                persisted || in_memory
            }
            Err(_) => false,
        }
    }
}
