//! Typed, disk-backed JSON maps with atomic (temp-file + rename) writes.
//!
//! Every on-disk cache in the pipeline (AO's availability map, NR's
//! name->key map, EA's synonym maps, the LLM response cache) shares this
//! shape: a single JSON object, loaded once, mutated in memory, and
//! flushed synchronously after each insertion so a reader never observes
//! a torn write.
use crate::error::{RetroSynError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonCache<V> {
    path: PathBuf,
    map: HashMap<String, V>,
}

impl<V> JsonCache<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    /// Loads the cache from `path` if it exists, otherwise starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let map = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|source| RetroSynError::CacheCorrupt {
                    path: path.display().to_string(),
                    source,
                })?
            }
        } else {
            HashMap::new()
        };
        Ok(Self { path, map })
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts `value` under `key` and synchronously persists the whole
    /// map via a temp-file + rename, so a crash mid-write never leaves a
    /// corrupt cache on disk (spec §6 atomic write semantics).
    pub fn insert(&mut self, key: String, value: V) -> Result<()> {
        self.map.insert(key, value);
        self.flush()
    }

    pub fn flush(&self) -> Result<()> {
        atomic_write_json(&self.path, &self.map)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Serializes `value` to `path` via a sibling temp file followed by a
/// rename, so readers never see a partially written file.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("json")
    ));
    let serialized =
        serde_json::to_string_pretty(value).map_err(RetroSynError::TreeSerializationError)?;
    fs::write(&tmp_path, serialized)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
