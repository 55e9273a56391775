//! Cloud accounts known to this device

use crate::ids::{AccountId, OrgId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account this device has signed into, with or without stored credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownAccount {
    /// Account (user) id
    pub account_id: AccountId,
    /// Org the account belongs to
    pub org_id: OrgId,
    /// Display name of the org
    pub org_name: String,
    /// Last time the account authenticated on this device
    pub last_auth_at: DateTime<Utc>,
    /// Stored session token, absent when the account was signed out
    pub token: Option<String>,
}

impl KnownAccount {
    /// Create an account with stored credentials
    #[inline]
    #[must_use]
    pub fn new(
        account_id: impl Into<AccountId>,
        org_id: impl Into<OrgId>,
        org_name: impl Into<String>,
        last_auth_at: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            org_id: org_id.into(),
            org_name: org_name.into(),
            last_auth_at,
            token: Some(String::new()),
        }
    }

    /// With an explicit token (or none)
    #[inline]
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Whether the account can be used without signing in again
    #[inline]
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    /// Pick the most recently authenticated account
    #[must_use]
    pub fn most_recent(accounts: &[KnownAccount]) -> Option<&KnownAccount> {
        accounts.iter().max_by_key(|a| a.last_auth_at)
    }
}

/// A known account that passed the eligibility scan
///
/// Immutable once produced; rebuilt only when the scan runs again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationAccount {
    pub account_id: AccountId,
    pub org_id: OrgId,
    pub display_name: String,
    pub last_auth_at: DateTime<Utc>,
    /// Holder may import an org archive into this account
    pub can_import: bool,
}

impl DestinationAccount {
    /// Build from a known account and the result of the permission check
    #[must_use]
    pub fn from_known(account: &KnownAccount, can_import: bool) -> Self {
        Self {
            account_id: account.account_id.clone(),
            org_id: account.org_id.clone(),
            display_name: account.org_name.clone(),
            last_auth_at: account.last_auth_at,
            can_import,
        }
    }
}
