//! Blob backends.
//!
//! A backend stores one opaque string per carrier name. It is the only
//! place the engine touches storage. Methods take `&self` so one backend can
//! be shared (for example through an `Arc`) by carriers with different
//! names.

use crate::{error::Result, Error};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Synchronous blob storage keyed by carrier name.
pub trait Backend {
    /// Read the blob stored under `name`, if any.
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Store `blob` under `name`, replacing any previous blob.
    fn set(&self, name: &str, blob: &str) -> Result<()>;

    /// Delete the blob stored under `name`. Missing blobs are not an error.
    fn remove(&self, name: &str) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for &B {
    fn get(&self, name: &str) -> Result<Option<String>> {
        (**self).get(name)
    }

    fn set(&self, name: &str, blob: &str) -> Result<()> {
        (**self).set(name, blob)
    }

    fn remove(&self, name: &str) -> Result<()> {
        (**self).remove(name)
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn get(&self, name: &str) -> Result<Option<String>> {
        (**self).get(name)
    }

    fn set(&self, name: &str, blob: &str) -> Result<()> {
        (**self).set(name, blob)
    }

    fn remove(&self, name: &str) -> Result<()> {
        (**self).remove(name)
    }
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn get(&self, name: &str) -> Result<Option<String>> {
        (**self).get(name)
    }

    fn set(&self, name: &str, blob: &str) -> Result<()> {
        (**self).set(name, blob)
    }

    fn remove(&self, name: &str) -> Result<()> {
        (**self).remove(name)
    }
}

// ============================================================================
// Memory Backend
// ============================================================================

/// In-process backend, optionally limited to a byte quota.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Create an unbounded memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory backend that holds at most `bytes` of blob data.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Total bytes currently stored.
    pub fn used_bytes(&self) -> usize {
        self.lock()
            .map(|blobs| blobs.values().map(String::len).sum())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.blobs
            .lock()
            .map_err(|e| Error::persistence("<memory>", format!("lock poisoned: {}", e)))
    }
}

impl Backend for MemoryBackend {
    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set(&self, name: &str, blob: &str) -> Result<()> {
        let mut blobs = self.lock()?;
        if let Some(quota) = self.quota {
            let others: usize = blobs
                .iter()
                .filter(|(k, _)| k.as_str() != name)
                .map(|(_, v)| v.len())
                .sum();
            let available = quota.saturating_sub(others);
            if blob.len() > available {
                return Err(Error::QuotaExceeded {
                    name: name.to_string(),
                    needed: blob.len(),
                    available,
                });
            }
        }
        blobs.insert(name.to_string(), blob.to_string());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

// ============================================================================
// File Backend
// ============================================================================

/// Directory-backed backend: one `<name>.json` file per carrier.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// target, so readers never observe a half-written blob.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    const EXTENSION: &'static str = "json";

    /// Open (and create if needed) a backend rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| Error::persistence(&root.display().to_string(), e))?;
        Ok(Self { root })
    }

    /// The backend's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `name`'s blob.
    pub fn blob_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(format!("{}.{}", name, Self::EXTENSION)))
    }
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(&['/', '\\', '\0'][..]);
    if invalid {
        Err(Error::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

impl Backend for FileBackend {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let path = self.blob_path(name)?;
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::persistence(name, e)),
        }
    }

    fn set(&self, name: &str, blob: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        let tmp = path.with_extension("json.tmp");

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(blob.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::persistence(name, e)
        })
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.blob_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::persistence(name, e)),
        }
    }
}
