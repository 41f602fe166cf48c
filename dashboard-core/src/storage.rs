use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    fmt::Write as _,
    fs, io,
    path::PathBuf,
    sync::Mutex,
};

/// Durable string-keyed store behind the cache.
///
/// The cache is the only component that touches storage; everything else
/// goes through [`crate::cache::Cache`]. Errors are surfaced here so the
/// cache can log and swallow them.
pub trait Storage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// One file per cache key under a dedicated directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage rooted at the platform cache directory for this app.
    pub fn in_project_cache_dir() -> Result<Self> {
        let dirs = crate::config::project_dirs()?;
        Ok(Self::new(dirs.cache_dir().join("entries")))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key))
    }
}

/// Keys are opaque and may contain separators like `:`; encode anything
/// outside a filename-safe alphabet as `%XX`.
fn file_name_for(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 5);
    for b in key.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => name.push(b as char),
            _ => {
                let _ = write!(name, "%{b:02X}");
            }
        }
    }
    name.push_str(".json");
    name
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read cache file: {}", path.display())),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;

        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove cache file: {}", path.display()))
            }
        }
    }
}

/// In-memory store, used by tests and as a degraded fallback when no cache
/// directory is available.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries.lock().map_err(|_| anyhow!("storage mutex poisoned"))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().map(|map| map.contains_key(key)).unwrap_or(false)
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
