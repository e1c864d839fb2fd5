// File-backed slots: one JSON file per slot in a directory

use crate::backend::{Backend, validate_slot_name};
use eyre::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOCK_FILE_NAME: &str = ".lock";

/// Stores each slot as `<dir>/<slot>.json`
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open or create the slot directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create store directory {}", dir.display()))?;
        info!(dir = ?dir, "Opened file backend");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `slot`
    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot))
    }

    fn lock(&self) -> Result<File> {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE_NAME))
            .context("Failed to open lock file")?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;
        Ok(lock)
    }

    fn read_unlocked(&self, slot: &str) -> Result<Option<String>> {
        let path = self.slot_path(slot);

        if !path.exists() {
            debug!(slot, "Slot file does not exist yet");
            return Ok(None);
        }

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(content))
    }

    /// Write to a temporary file, then rename over the slot file
    fn write_unlocked(&self, slot: &str, blob: &str) -> Result<()> {
        let path = self.slot_path(slot);
        let tmp_path = self.dir.join(format!("{}.json.tmp", slot));

        let mut tmp = File::create(&tmp_path).context("Failed to create temporary slot file")?;
        tmp.write_all(blob.as_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        debug!(slot, bytes = blob.len(), path = ?path, "Replaced slot file");
        Ok(())
    }
}

impl Backend for FileBackend {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        validate_slot_name(slot)?;
        self.read_unlocked(slot)
    }

    fn replace(&mut self, slot: &str, blob: &str) -> Result<()> {
        validate_slot_name(slot)?;

        // Held until dropped at the end of this call
        let _lock = self.lock()?;
        self.write_unlocked(slot, blob)
    }

    fn update(&mut self, slot: &str, f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>) -> Result<()> {
        validate_slot_name(slot)?;

        // Another process cannot write between our read and our rename
        let _lock = self.lock()?;
        let current = self.read_unlocked(slot)?;
        match f(current)? {
            Some(blob) => self.write_unlocked(slot, &blob),
            None => Ok(()),
        }
    }
}
