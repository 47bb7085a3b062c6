// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{SessionStorage, Slot};

/// In-memory storage for tests and `--ephemeral` runs.
#[derive(Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<Slot, String>>,
    fail_writes: std::sync::atomic::AtomicBool,
    stuck: Mutex<HashSet<Slot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, std::sync::atomic::Ordering::Relaxed);
    }

    /// Make removals of `slot` fail.
    pub fn fail_remove(&self, slot: Slot) {
        self.stuck.lock().insert(slot);
    }

    pub fn get(&self, slot: Slot) -> Option<String> {
        self.slots.lock().get(&slot).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn read(&self, slot: Slot) -> anyhow::Result<Option<String>> {
        Ok(self.get(slot))
    }

    fn write(&self, slot: Slot, value: &str) -> anyhow::Result<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::Relaxed) {
            anyhow::bail!("write to {} refused", slot.key());
        }
        self.slots.lock().insert(slot, value.to_owned());
        Ok(())
    }

    fn remove(&self, slot: Slot) -> anyhow::Result<()> {
        if self.stuck.lock().contains(&slot) {
            anyhow::bail!("remove of {} refused", slot.key());
        }
        self.slots.lock().remove(&slot);
        Ok(())
    }
}
