//! Persisted client settings: token, user record, selected headquarter.
//!
//! Settings are reached through the [`SettingsStore`] trait and injected
//! via [`crate::app_state::AppState`]; nothing reads global storage ad hoc.

pub mod file;
pub mod memory;
pub mod models;

use crate::domain::HeadquarterId;
use crate::error::SyncError;

pub use file::FileSettingsStore;
pub use memory::MemorySettingsStore;
pub use models::{PersistedSettings, StoredUser};

/// Load/save/clear access to persisted settings.
pub trait SettingsStore: Send + Sync + std::fmt::Debug {
    /// Reads the persisted settings; missing storage yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the storage exists but cannot be read.
    fn load(&self) -> Result<PersistedSettings, SyncError>;

    /// Replaces the persisted settings.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the storage cannot be written.
    fn save(&self, settings: &PersistedSettings) -> Result<(), SyncError>;

    /// Removes all persisted settings (logout).
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the storage cannot be removed.
    fn clear(&self) -> Result<(), SyncError>;
}

/// Persists a headquarter selection, leaving the other settings untouched.
///
/// `None` clears the selection.
///
/// # Errors
///
/// Returns a [`SyncError`] if loading or saving fails.
pub fn select_headquarter(
    store: &dyn SettingsStore,
    headquarter: Option<HeadquarterId>,
) -> Result<PersistedSettings, SyncError> {
    let mut settings = store.load()?;
    settings.headquarter_id = headquarter;
    store.save(&settings)?;
    tracing::debug!(headquarter = ?settings.headquarter_id, "headquarter selection saved");
    Ok(settings)
}
