// Key-value persistence backends

use eyre::{Result, eyre};
use std::collections::HashMap;
use tracing::debug;

/// A store of named slots, each holding one text blob
///
/// Slots are read and written whole. `replace` must be atomic: a reader sees
/// either the old blob or the new one, never a mix.
pub trait Backend {
    /// Read a slot, `None` if it was never written
    fn read(&self, slot: &str) -> Result<Option<String>>;

    /// Replace the whole contents of a slot
    fn replace(&mut self, slot: &str, blob: &str) -> Result<()>;

    /// Read-modify-write a slot with no other writer in between
    ///
    /// `f` gets the current blob and returns the new one, or `None` to leave
    /// the slot untouched. Backends shared between processes must hold their
    /// lock (or transaction) across the read and the write.
    fn update(&mut self, slot: &str, f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>) -> Result<()> {
        let current = self.read(slot)?;
        if let Some(blob) = f(current)? {
            self.replace(slot, &blob)?;
        }
        Ok(())
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        (**self).read(slot)
    }

    fn replace(&mut self, slot: &str, blob: &str) -> Result<()> {
        (**self).replace(slot, blob)
    }

    fn update(&mut self, slot: &str, f: &mut dyn FnMut(Option<String>) -> Result<Option<String>>) -> Result<()> {
        (**self).update(slot, f)
    }
}

/// Volatile backend, for tests and throwaway sessions
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    slots: HashMap<String, String>,
    writes: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a slot without counting it as a write
    pub fn with_slot(mut self, slot: &str, blob: &str) -> Self {
        self.slots.insert(slot.to_string(), blob.to_string());
        self
    }

    /// Number of `replace` calls so far
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Backend for MemoryBackend {
    fn read(&self, slot: &str) -> Result<Option<String>> {
        Ok(self.slots.get(slot).cloned())
    }

    fn replace(&mut self, slot: &str, blob: &str) -> Result<()> {
        validate_slot_name(slot)?;
        debug!(slot, bytes = blob.len(), "MemoryBackend::replace");
        self.slots.insert(slot.to_string(), blob.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// Slot names double as file names, so keep them to a safe alphabet
pub fn validate_slot_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(eyre!("Slot name cannot be empty"));
    }
    if name.len() > 64 {
        return Err(eyre!("Slot name too long: {} (max 64 chars)", name));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid slot name: {} (must be alphanumeric with _/-)", name));
    }
    Ok(())
}
