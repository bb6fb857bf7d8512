use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::death_record::DeathRecord;
use crate::model::raid_config::RaidConfig;
use crate::model::raid_window::RaidWindow;

#[derive(Debug, Default)]
pub(crate) struct MemorySnapshot {
    pub(crate) death_records: Vec<DeathRecord>,
    pub(crate) raid_windows: Vec<RaidWindow>,
    pub(crate) config: Option<RaidConfig>,
    pub(crate) unavailable: bool,
}

/// In-process store. Clones share the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemorySnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent load and save fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    pub(crate) fn with<R>(
        &self,
        f: impl FnOnce(&mut MemorySnapshot) -> R,
    ) -> anyhow::Result<R> {
        let mut guard = self.lock();
        if guard.unavailable {
            anyhow::bail!("memory store is unavailable");
        }
        Ok(f(&mut guard))
    }

    fn lock(&self) -> MutexGuard<'_, MemorySnapshot> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
