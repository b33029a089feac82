//! File-backed store
//!
//! Keeps the whole record map in memory and writes it as a single JSON
//! image on sync. Writes go to a sibling temp file that is flushed to disk
//! and then renamed over the target, so a crash mid-sync leaves either the
//! previous image or the new one.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};
use crate::store::Store;

const IMAGE_VERSION: u32 = 1;

// == Open Flag ==
/// How a shelf file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenFlag {
    /// `r`: existing file, read-only
    Read,
    /// `w`: existing file, read/write
    Write,
    /// `c`: read/write, created if missing
    #[default]
    Create,
    /// `n`: read/write, always starts empty
    New,
}

impl OpenFlag {
    fn is_read_only(self) -> bool {
        self == OpenFlag::Read
    }
}

impl FromStr for OpenFlag {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "r" => Ok(OpenFlag::Read),
            "w" => Ok(OpenFlag::Write),
            "c" => Ok(OpenFlag::Create),
            "n" => Ok(OpenFlag::New),
            other => Err(CacheError::InvalidConfig(format!(
                "unknown open flag '{}', expected one of r, w, c, n",
                other
            ))),
        }
    }
}

impl fmt::Display for OpenFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = match self {
            OpenFlag::Read => "r",
            OpenFlag::Write => "w",
            OpenFlag::Create => "c",
            OpenFlag::New => "n",
        };
        f.write_str(flag)
    }
}

#[derive(Serialize, Deserialize)]
struct Image {
    version: u32,
    records: BTreeMap<String, Vec<u8>>,
}

// == File Store ==
/// A persistent store saved to a single file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    records: BTreeMap<String, Vec<u8>>,
    read_only: bool,
    dirty: bool,
    closed: bool,
}

impl FileStore {
    /// Opens the shelf file at `path` according to `flag`.
    ///
    /// `r` and `w` fail with an I/O error if the file does not exist.
    pub fn open(path: impl AsRef<Path>, flag: OpenFlag) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let (records, dirty) = match flag {
            OpenFlag::New => (BTreeMap::new(), true),
            OpenFlag::Read | OpenFlag::Write => (Self::load(&path)?, false),
            OpenFlag::Create => match Self::load(&path) {
                Ok(records) => (records, false),
                Err(CacheError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                    (BTreeMap::new(), true)
                }
                Err(e) => return Err(e),
            },
        };

        info!(
            path = %path.display(),
            flag = %flag,
            records = records.len(),
            "Opened shelf file"
        );

        let mut store = Self {
            path,
            records,
            read_only: flag.is_read_only(),
            dirty,
            closed: false,
        };
        // Materialize new files right away, like a dbm open would.
        store.sync()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
        let bytes = fs::read(path)?;
        let image: Image = serde_json::from_slice(&bytes)?;
        if image.version != IMAGE_VERSION {
            return Err(CacheError::InvalidConfig(format!(
                "unsupported shelf image version {}",
                image.version
            )));
        }
        Ok(image.records)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CacheError::Closed);
        }
        Ok(())
    }

    fn ensure_writable(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(CacheError::ReadOnly(key.to_string()));
        }
        Ok(())
    }

    fn write_image(&self) -> Result<()> {
        let image = Image {
            version: IMAGE_VERSION,
            records: self.records.clone(),
        };
        let bytes = serde_json::to_vec(&image)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Store for FileStore {
    fn get(&mut self, key: &str) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.records
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.ensure_writable(key)?;
        self.records.insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.ensure_writable(key)?;
        if self.records.remove(key).is_none() {
            return Err(CacheError::NotFound(key.to_string()));
        }
        self.dirty = true;
        Ok(())
    }

    fn contains(&mut self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.records.contains_key(key))
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn key_snapshot(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    fn sync(&mut self) -> Result<()> {
        self.ensure_open()?;
        if !self.dirty || self.read_only {
            return Ok(());
        }
        self.write_image()?;
        self.dirty = false;
        debug!(path = %self.path.display(), records = self.records.len(), "Synced shelf file");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.sync()?;
        self.closed = true;
        info!(path = %self.path.display(), "Closed shelf file");
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to close shelf file on drop");
        }
    }
}
