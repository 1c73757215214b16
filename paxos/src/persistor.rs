use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use serde::{de::DeserializeOwned, Serialize};

/// A directory of bincode encoded values, one file per key.
///
/// Every write replaces its file atomically, so a crash leaves either the old
/// or the new value behind.
#[derive(Debug, Clone)]
pub struct Persistor {
    dir: PathBuf,
}

impl Persistor {
    /// Open the store at `dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_owned(),
        })
    }

    /// Get a value by given key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match fs::read(self.dir.join(key)) {
            Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set value associated to given key.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)?;
        AtomicFile::new(self.dir.join(key), OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&bytes))?;
        Ok(())
    }
}
