//! Durable client-side key-value storage.
//!
//! Only two values outlive a session: the bearer credential and the avatar
//! image. They are kept under fixed keys, see [`CREDENTIAL_KEY`] and
//! [`AVATAR_KEY`].

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;

/// Key of the persisted bearer credential.
pub const CREDENTIAL_KEY: &str = "token";
/// Key of the persisted avatar data URL.
pub const AVATAR_KEY: &str = "userAvatar";

/// A string key-value store that survives restarts.
pub trait DurableStore: Send + 'static {
    /// Reads the value under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes `value` under `key`.
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;

    /// Removes the value under `key`. Removing a missing key is not an
    /// error.
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// An in-memory store.
///
/// Clones share the same storage, which lets a test inspect what the
/// controller persisted.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates a store pre-filled with `values`.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Arc::new(Mutex::new(values)),
        }
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        let mut values =
            self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        let mut values =
            self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        Ok(())
    }
}

/// A store backed by a JSON file.
///
/// The whole file is rewritten on every change. Writes go to a temporary
/// file in the same directory which then replaces the original, so a crash
/// never leaves a truncated file behind.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open<P: Into<PathBuf>>(path: P) -> io::Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|err| io::Error::new(ErrorKind::InvalidData, err))?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        debug!("opened store at {path:?} with {} values", values.len());
        Ok(Self { path, values })
    }

    /// Returns the path of the backing file.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let file = NamedTempFile::new_in(dir)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.values)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|err| err.into_error())?;
        file.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl DurableStore for FileStore {
    #[inline]
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_owned(), value.to_owned());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}
