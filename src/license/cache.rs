use std::sync::Arc;

use dashmap::DashMap;

/// Run-scoped store of normalized license texts.
///
/// Keys are package ids, URLs or filesystem paths; several keys may share the
/// same text. Safe to use from concurrent resolutions. The first value stored
/// under a key is kept; later writes to that key are ignored.
#[derive(Debug, Default)]
pub struct LicenseCache {
    entries: DashMap<String, Arc<str>>,
}

impl LicenseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        if key.is_empty() {
            return None;
        }
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `license` under every non-empty key that is still vacant.
    pub fn insert_all<I, K>(&self, keys: I, license: &Arc<str>)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        for key in keys {
            let key = key.into();
            if key.is_empty() {
                continue;
            }
            self.entries
                .entry(key)
                .or_insert_with(|| Arc::clone(license));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
