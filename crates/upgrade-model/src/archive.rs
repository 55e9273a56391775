//! Legacy org payload and its decrypted migration archive

use crate::ids::{AccountId, AppId};
use serde::{Deserialize, Serialize};

/// Legacy org data handed over by the legacy product when an upgrade is offered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyUpgrade {
    /// Users in the legacy org
    pub num_users: u32,
    /// Encrypted org archive
    pub encrypted_archive: String,
    /// Key needed to decrypt `encrypted_archive`
    pub encryption_key: String,
    /// Billing was pre-arranged and signed on the legacy side
    pub signed_preset_billing: bool,
}

impl LegacyUpgrade {
    /// Create a payload without preset billing
    #[inline]
    #[must_use]
    pub fn new(
        num_users: u32,
        encrypted_archive: impl Into<String>,
        encryption_key: impl Into<String>,
    ) -> Self {
        Self {
            num_users,
            encrypted_archive: encrypted_archive.into(),
            encryption_key: encryption_key.into(),
            signed_preset_billing: false,
        }
    }

    /// Mark billing as preset
    #[inline]
    #[must_use]
    pub fn with_preset_billing(mut self) -> Self {
        self.signed_preset_billing = true;
        self
    }
}

/// App carried in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveApp {
    pub id: AppId,
    pub name: String,
}

/// User carried in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveUser {
    pub email: String,
}

/// Decrypted legacy org snapshot scoped to one destination account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationArchive {
    /// Destination account the archive was decrypted against
    pub account_id: AccountId,
    /// Users that will be imported (after filtering against the destination org)
    pub org_users: Vec<ArchiveUser>,
    pub apps: Vec<ArchiveApp>,
    pub signed_preset_billing: bool,
}

impl MigrationArchive {
    #[inline]
    #[must_use]
    pub fn user_count(&self) -> u32 {
        u32::try_from(self.org_users.len()).unwrap_or(u32::MAX)
    }

    /// Whether the user should be asked which apps to bring over
    #[inline]
    #[must_use]
    pub fn offers_app_selection(&self) -> bool {
        self.apps.len() > 1
    }

    #[must_use]
    pub fn contains_app(&self, id: &AppId) -> bool {
        self.apps.iter().any(|app| &app.id == id)
    }
}
