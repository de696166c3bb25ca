use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// String-keyed get/set/remove over a single JSON file. Every mutation
/// rewrites the file. Storage failures are logged and swallowed; the
/// in-memory view keeps serving reads either way.
pub struct KvStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("Local store at {} is unreadable, starting empty: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(), // first run
        };
        Self { path, entries }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
        self.persist();
    }

    pub fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.persist();
        }
    }

    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::error!("Failed to create data directory {}: {}", parent.display(), e);
                return;
            }
        }
        match serde_json::to_string_pretty(&self.entries) {
            Ok(raw) => {
                if let Err(e) = fs::write(&self.path, raw) {
                    log::error!("Failed to write local store {}: {}", self.path.display(), e);
                }
            }
            Err(e) => log::error!("Failed to serialize local store: {}", e),
        }
    }
}
