//! Eligibility Scanner
//!
//! Decides which known accounts may receive the upgraded org. An account is
//! eligible when it has stored credentials, its session graph can be loaded,
//! and the holder carries the org import/export permission.
//!
//! A failed session fetch excludes the account and is kept as a diagnostic;
//! it never aborts the scan.

use crate::background::BackgroundProcess;
use crate::error::BackgroundError;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};
use upgrade_model::{AccountId, DestinationAccount, KnownAccount, OrgId, OrgPermission};

/// Session fetch that failed during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub account_id: AccountId,
    pub org_id: OrgId,
    pub error: BackgroundError,
}

/// Result of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityScan {
    /// Eligible destinations, in the order the accounts were given
    pub eligible: Vec<DestinationAccount>,
    pub failures: Vec<ScanFailure>,
    /// Accounts without stored credentials
    pub skipped_without_credentials: usize,
}

impl EligibilityScan {
    /// Whether `account` is an eligible destination
    #[must_use]
    pub fn is_eligible(&self, account: &AccountId) -> bool {
        self.eligible.iter().any(|d| &d.account_id == account)
    }
}

enum Checked {
    Eligible(DestinationAccount),
    MissingPermission,
    Failed(ScanFailure),
}

/// Scans known accounts against the background process
pub struct EligibilityScanner {
    background: Arc<dyn BackgroundProcess>,
}

impl EligibilityScanner {
    #[inline]
    #[must_use]
    pub fn new(background: Arc<dyn BackgroundProcess>) -> Self {
        Self { background }
    }

    /// Scan every account with stored credentials
    pub async fn scan(&self, accounts: &[KnownAccount]) -> EligibilityScan {
        let (with_credentials, without): (Vec<_>, Vec<_>) =
            accounts.iter().partition(|a| a.has_credentials());

        let checks = join_all(with_credentials.into_iter().map(|a| self.check(a))).await;

        let mut scan = EligibilityScan {
            skipped_without_credentials: without.len(),
            ..EligibilityScan::default()
        };
        for checked in checks {
            match checked {
                Checked::Eligible(destination) => scan.eligible.push(destination),
                Checked::MissingPermission => {}
                Checked::Failed(failure) => scan.failures.push(failure),
            }
        }

        debug!(
            eligible = scan.eligible.len(),
            failed = scan.failures.len(),
            skipped = scan.skipped_without_credentials,
            "Eligibility scan finished"
        );
        scan
    }

    async fn check(&self, account: &KnownAccount) -> Checked {
        let session = match self.background.cached_session(&account.account_id).await {
            Some(session) => session,
            None => match self.background.fetch_session(&account.account_id).await {
                Ok(session) => session,
                Err(error) => {
                    warn!(account = %account.account_id, %error, "Session fetch failed during scan");
                    return Checked::Failed(ScanFailure {
                        account_id: account.account_id.clone(),
                        org_id: account.org_id.clone(),
                        error,
                    });
                }
            },
        };

        if session.has_permission(OrgPermission::OrgArchiveImportExport) {
            Checked::Eligible(DestinationAccount::from_known(account, true))
        } else {
            debug!(account = %account.account_id, "Account lacks archive import permission");
            Checked::MissingPermission
        }
    }
}
