//! Persisted client state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{HeadquarterId, ModuleId, UserId};

/// Key under which the bearer token is stored.
pub const TOKEN_KEY: &str = "token";
/// Key under which the serialized user record is stored.
pub const USER_KEY: &str = "user";
/// Key under which the selected headquarter id is stored.
pub const HEADQUARTER_KEY: &str = "selectedHeadquarter";

/// Signed-in user, as persisted after login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    /// User id.
    pub id: UserId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Role string as issued by the backend (e.g. `"ADVISER"`).
    #[serde(default)]
    pub role: String,
    /// Module assigned to an adviser, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_id: Option<ModuleId>,
}

/// Everything the client keeps between runs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    /// Bearer token for authenticated requests.
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Serialized user record.
    #[serde(rename = "user", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<StoredUser>,
    /// Currently selected headquarter.
    #[serde(
        rename = "selectedHeadquarter",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub headquarter_id: Option<HeadquarterId>,
}

impl PersistedSettings {
    /// Returns `true` when a non-empty token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

impl fmt::Debug for PersistedSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PersistedSettings")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .field("headquarter_id", &self.headquarter_id)
            .finish()
    }
}
