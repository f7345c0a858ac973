#[cfg(autotune_persistent_cache)]
mod std_imports {
    pub use std::fs;
    pub use std::io;
    pub use std::path::PathBuf;
}

#[cfg(autotune_persistent_cache)]
use std_imports::*;

#[cfg(autotune_persistent_cache)]
use serde::{Deserialize, Serialize};

use super::AutotuneKey;
use hashbrown::HashMap;

/// In-memory cache entry
#[derive(Debug)]
pub(crate) struct CacheEntry {
    #[cfg(autotune_persistent_cache)]
    checksum_checked: bool,
    fastest_index: usize,
}

/// Persistent cache entry
#[cfg(autotune_persistent_cache)]
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PersistentCacheEntry {
    checksum: String,
    fastest_index: usize,
}

/// Use to find and reuse the best kernel for some input
#[derive(Debug)]
pub(crate) struct TuneCache<K> {
    in_memory_cache: HashMap<K, CacheEntry>,
    #[cfg(autotune_persistent_cache)]
    persistent_cache: HashMap<K, PersistentCacheEntry>,
    #[cfg(autotune_persistent_cache)]
    file_path: PathBuf,
}

/// Result of the cache try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneCacheResult {
    /// An operation is found.
    Hit {
        /// The index of the fastest operation to execute.
        fastest_index: usize,
    },
    /// No operation is found yet.
    Miss,
    /// An operation is found in the persistent cache, but its checksum wasn't validated yet.
    #[cfg(autotune_persistent_cache)]
    Unchecked,
}

impl<K: AutotuneKey> TuneCache<K> {
    pub(crate) fn new(
        #[cfg_attr(not(autotune_persistent_cache), allow(unused_variables))] name: &str,
        #[cfg_attr(not(autotune_persistent_cache), allow(unused_variables))] device_id: &str,
    ) -> Self {
        #[cfg(autotune_persistent_cache)]
        {
            let root = crate::config::GlobalConfig::get().autotune.cache.root();
            let file_path = persistent_cache_file_path(root, name, device_id);
            Self::with_file(file_path)
        }

        #[cfg(not(autotune_persistent_cache))]
        {
            TuneCache {
                in_memory_cache: HashMap::new(),
            }
        }
    }

    /// Create a cache persisted at the given path, loading the entries already saved there.
    #[cfg(autotune_persistent_cache)]
    pub(crate) fn with_file(file_path: PathBuf) -> Self {
        let mut cache = TuneCache {
            in_memory_cache: HashMap::new(),
            persistent_cache: HashMap::new(),
            file_path,
        };
        if let Err(e) = cache.load() {
            log::warn!(
                "Unable to load autotune cache {}. Cache will be ignored ({}).",
                cache.file_path.display(),
                e
            );
        }
        cache
    }

    pub(crate) fn fastest(&self, key: &K) -> TuneCacheResult {
        let val = match self.in_memory_cache.get(key) {
            Some(val) => val,
            None => return TuneCacheResult::Miss,
        };

        #[cfg(autotune_persistent_cache)]
        if !val.checksum_checked {
            return TuneCacheResult::Unchecked;
        }

        TuneCacheResult::Hit {
            fastest_index: val.fastest_index,
        }
    }

    /// Validate a persisted entry against the checksum of the current tunable set.
    ///
    /// Entries saved for a different set of tunables are discarded.
    #[cfg(autotune_persistent_cache)]
    pub(crate) fn validate_checksum(&mut self, key: &K, checksum: &str) -> TuneCacheResult {
        let entry = match self.in_memory_cache.get_mut(key) {
            Some(entry) => entry,
            None => return TuneCacheResult::Miss,
        };

        if !entry.checksum_checked {
            let valid = self
                .persistent_cache
                .get(key)
                .is_some_and(|persisted| persisted.checksum == checksum);

            if !valid {
                self.in_memory_cache.remove(key);
                self.persistent_cache.remove(key);
                return TuneCacheResult::Miss;
            }
            entry.checksum_checked = true;
        }

        TuneCacheResult::Hit {
            fastest_index: entry.fastest_index,
        }
    }

    pub(crate) fn cache_insert(&mut self, key: K, fastest_index: usize) {
        self.in_memory_cache.insert(
            key,
            CacheEntry {
                #[cfg(autotune_persistent_cache)]
                checksum_checked: true,
                fastest_index,
            },
        );
    }
}

/// Return the file path for the persistent cache on disk.
#[cfg(autotune_persistent_cache)]
pub(crate) fn persistent_cache_file_path(root: PathBuf, name: &str, device_id: &str) -> PathBuf {
    // Replace rather than strip, so `0:1` and `01` stay distinct files.
    let sanitize = |value: &str| {
        sanitize_filename::sanitize_with_options(
            value,
            sanitize_filename::Options {
                replacement: "_",
                ..Default::default()
            },
        )
    };
    let name = sanitize(name);
    let device_id = sanitize(device_id);
    root.join("gemmtune")
        .join("autotune")
        .join(name)
        .join(format!("{device_id}.json"))
}

#[cfg(autotune_persistent_cache)]
impl<K: AutotuneKey> TuneCache<K> {
    pub(crate) fn persistent_cache_insert(
        &mut self,
        key: K,
        checksum: String,
        fastest_index: usize,
    ) {
        self.persistent_cache.insert(
            key,
            PersistentCacheEntry {
                checksum,
                fastest_index,
            },
        );
    }

    /// Load the persistent cache data from disk
    pub(crate) fn load(&mut self) -> Result<(), io::Error> {
        // Reading the whole file then parsing is faster than serde_json::from_reader.
        let data = match fs::read_to_string(&self.file_path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let data: Vec<(K, PersistentCacheEntry)> = serde_json::from_str(&data)?;
        for (key, value) in data.into_iter() {
            self.in_memory_cache.insert(
                key.clone(),
                CacheEntry {
                    checksum_checked: false,
                    fastest_index: value.fastest_index,
                },
            );
            self.persistent_cache.insert(key, value);
        }

        Ok(())
    }

    /// Save the persistent cache on disk
    pub(crate) fn save(&self) -> Result<(), io::Error> {
        if let Some(parent_dir) = self.file_path.parent() {
            fs::create_dir_all(parent_dir)?;
        }

        let data = self.persistent_cache.iter().collect::<Vec<_>>();
        let content = serde_json::to_string_pretty(&data)?;
        fs::write(&self.file_path, content)
    }

    /// The file path of the persistent cache on disk.
    pub(crate) fn file_path(&self) -> &PathBuf {
        &self.file_path
    }
}
