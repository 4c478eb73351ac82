//! In-memory settings store.

use std::sync::{Mutex, PoisonError};

use super::{PersistedSettings, SettingsStore};
use crate::error::SyncError;

/// Settings kept in process memory only.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<PersistedSettings>,
}

impl MemorySettingsStore {
    /// Creates a store pre-populated with `settings`.
    #[must_use]
    pub fn new(settings: PersistedSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<PersistedSettings, SyncError> {
        Ok(self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, settings: &PersistedSettings) -> Result<(), SyncError> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), SyncError> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) =
            PersistedSettings::default();
        Ok(())
    }
}
