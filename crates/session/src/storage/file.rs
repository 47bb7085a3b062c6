// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One file per slot, written atomically (write tmp + rename).

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use super::{SessionStorage, Slot};

pub struct FileStorage {
    dir: PathBuf,
    seq: AtomicU32,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), seq: AtomicU32::new(0) }
    }

    fn path(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.key())
    }
}

impl SessionStorage for FileStorage {
    fn read(&self, slot: Slot) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(self.path(slot)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Unique temp names (PID + counter) keep concurrent writers of the same
    /// slot from interleaving bytes in a shared `.tmp` file.
    fn write(&self, slot: Slot, value: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let tmp = self.dir.join(format!(".{}.{}.{}.tmp", slot.key(), std::process::id(), seq));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, self.path(slot))?;
        Ok(())
    }

    fn remove(&self, slot: Slot) -> anyhow::Result<()> {
        match std::fs::remove_file(self.path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
