//! Interface to the background process
//!
//! The background process owns sessions, archive decryption, the billing
//! catalog and remote upgrade execution. The controller only issues requests
//! and observes status snapshots, either pushed through [`BackgroundProcess::subscribe`]
//! or pulled through [`BackgroundProcess::snapshot`].

use crate::error::BackgroundError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use upgrade_model::{
    AccountId, BillingCatalog, LegacyUpgrade, MigrationArchive, SessionGraph, UpgradeRequest,
};

/// Requests the controller issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ResetImportPreparation,
    FetchSession,
    LoadBillingCatalog,
    DecryptMigrationArchive,
    StartUpgrade,
    CancelOrResetUpgrade,
    Snapshot,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::ResetImportPreparation => "reset import preparation",
            Operation::FetchSession => "fetch session",
            Operation::LoadBillingCatalog => "load billing catalog",
            Operation::DecryptMigrationArchive => "decrypt migration archive",
            Operation::StartUpgrade => "start upgrade",
            Operation::CancelOrResetUpgrade => "cancel or reset upgrade",
            Operation::Snapshot => "status snapshot",
        };
        f.write_str(name)
    }
}

/// Structured error as reported by the background process
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// `None` when the failure carried no message
    pub message: Option<String>,
    pub code: Option<String>,
}

impl ErrorPayload {
    /// Payload with a message
    #[inline]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            code: None,
        }
    }

    /// Payload without any message
    #[inline]
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) if !message.is_empty() => f.write_str(message),
            _ => f.write_str("unknown error"),
        }
    }
}

/// Status fields of the background process's state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub upgrade_in_progress: bool,
    pub upgrade_finished: bool,
    pub import_in_progress: bool,
    pub import_status: Option<String>,
    pub catalog_error: Option<ErrorPayload>,
    pub import_error: Option<ErrorPayload>,
    pub upgrade_error: Option<ErrorPayload>,
    /// Legacy side dropped its in-progress upgrade lock
    pub legacy_released: bool,
    /// New cloud org is being registered
    pub registering: bool,
    pub registration_error: Option<ErrorPayload>,
}

/// Requests issued to the background process
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BackgroundProcess: Send + Sync {
    /// Clear decrypt/import state, globally or for one candidate account
    async fn reset_import_preparation(
        &self,
        account: Option<AccountId>,
    ) -> Result<(), BackgroundError>;

    /// Access graph already held for an account, without any request
    async fn cached_session(&self, account: &AccountId) -> Option<SessionGraph>;

    /// Retrieve or refresh an account's access graph
    async fn fetch_session(&self, account: &AccountId) -> Result<SessionGraph, BackgroundError>;

    async fn load_billing_catalog(&self) -> Result<BillingCatalog, BackgroundError>;

    /// Produce the migration archive scoped to `account`
    async fn decrypt_migration_archive(
        &self,
        account: &AccountId,
        payload: &LegacyUpgrade,
        is_legacy_upgrade: bool,
    ) -> Result<MigrationArchive, BackgroundError>;

    /// Begin the remote migration; progress is observed through status snapshots
    async fn start_upgrade(&self, request: &UpgradeRequest) -> Result<(), BackgroundError>;

    /// Abort (`cancel = true`) or just reset an in-progress or reserved upgrade
    async fn cancel_or_reset_upgrade(&self, cancel: bool) -> Result<(), BackgroundError>;

    /// Current status
    async fn snapshot(&self) -> Result<StatusSnapshot, BackgroundError>;

    /// Push feed of status changes
    fn subscribe(&self) -> watch::Receiver<StatusSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_display_falls_back_to_unknown() {
        assert_eq!(ErrorPayload::unknown().to_string(), "unknown error");
        assert_eq!(ErrorPayload::message("").to_string(), "unknown error");
        assert_eq!(ErrorPayload::message("boom").to_string(), "boom");
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let snapshot = StatusSnapshot {
            import_in_progress: true,
            import_status: Some("Importing apps".into()),
            ..StatusSnapshot::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: StatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
