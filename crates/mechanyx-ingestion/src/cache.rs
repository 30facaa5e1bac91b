//! On-disk JSON cache of variant scores keyed by `genome:chrN:pos:REF:ALT`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mechanyx_common::Result;
use tracing::{debug, warn};

use crate::scorer::VariantScore;

pub const CACHE_FILE: &str = "variant_scores.json";

/// Default cache location under the user cache directory.
pub fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("mechanyx")
        .join(CACHE_FILE)
}

#[derive(Debug, Default)]
pub struct VariantCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, VariantScore>,
    dirty: bool,
}

impl VariantCache {
    /// In-memory only; `flush` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open `path`, starting empty when it is absent or unreadable.
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Variant cache unreadable; starting empty");
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        debug!(path = %path.display(), n = entries.len(), "Opened variant cache");
        Self { path: Some(path.to_path_buf()), entries, dirty: false }
    }

    pub fn get(&self, key: &str) -> Option<&VariantScore> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, score: VariantScore) {
        self.entries.insert(key, score);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the whole cache when it has unsaved entries.
    pub fn flush(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string(&self.entries)?)?;
        self.dirty = false;
        debug!(path = %path.display(), n = self.entries.len(), "Flushed variant cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    #[test]
    fn test_flush_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CACHE_FILE);
        let mut cache = VariantCache::open(&path);
        assert!(cache.is_empty());
        cache.insert("hg38:chr1:1:A:G".into(), VariantScore::from_deltas(Some(-0.5), None, Value::Null));
        cache.flush().unwrap();

        let back = VariantCache::open(&path);
        assert_eq!(back.len(), 1);
        assert_eq!(back.get("hg38:chr1:1:A:G").unwrap().disruption, 0.5);
    }

    #[test]
    fn test_corrupt_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CACHE_FILE);
        std::fs::write(&path, "{not json").unwrap();
        assert!(VariantCache::open(&path).is_empty());
    }

    #[test]
    fn test_in_memory_flush_is_noop() {
        let mut cache = VariantCache::in_memory();
        cache.insert("k".into(), VariantScore::from_deltas(None, None, Value::Null));
        cache.flush().unwrap();
        assert_eq!(cache.path(), None);
    }
}
