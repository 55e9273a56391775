//! Access graph snapshot of a destination account

use crate::ids::{AccountId, PriceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Org-level permissions relevant to the upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgPermission {
    /// May import or export org archives
    OrgArchiveImportExport,
    /// May manage billing
    OrgManageBilling,
    /// May invite users
    OrgManageUsers,
}

/// Org summary carried by the graph
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrgSummary {
    pub name: String,
    /// Active users plus pending invites
    pub active_user_or_invite_count: u32,
    /// Org is on a negotiated (fixed) license
    pub custom_license: bool,
}

/// License attached to the org
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct License {
    /// `None` or `-1` means unlimited
    pub max_users: Option<i64>,
    /// Entry tier without SSO
    pub is_cloud_basics: bool,
}

impl License {
    /// Finite user limit, if any
    #[inline]
    #[must_use]
    pub fn user_limit(&self) -> Option<u32> {
        match self.max_users {
            Some(max) if max >= 0 => Some(u32::try_from(max).unwrap_or(u32::MAX)),
            _ => None,
        }
    }

    /// Whether upgrading `num_users` (optionally with SSO) would outgrow this license
    #[must_use]
    pub fn is_exceeded_by(&self, num_users: u32, sso_enabled: bool) -> bool {
        let over_limit = self.user_limit().is_some_and(|limit| num_users > limit);
        over_limit || (self.is_cloud_basics && sso_enabled)
    }
}

/// Current paid subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub price_id: PriceId,
}

/// Snapshot of one account's access graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGraph {
    pub account_id: AccountId,
    pub org: OrgSummary,
    /// Permissions the account holder carries in the org
    pub permissions: BTreeSet<OrgPermission>,
    pub license: Option<License>,
    pub subscription: Option<Subscription>,
}

impl SessionGraph {
    /// Create an empty graph for `account_id`
    #[inline]
    #[must_use]
    pub fn new(account_id: impl Into<AccountId>, org: OrgSummary) -> Self {
        Self {
            account_id: account_id.into(),
            org,
            permissions: BTreeSet::new(),
            license: None,
            subscription: None,
        }
    }

    /// With a permission granted
    #[inline]
    #[must_use]
    pub fn with_permission(mut self, permission: OrgPermission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// With a license
    #[inline]
    #[must_use]
    pub fn with_license(mut self, license: License) -> Self {
        self.license = Some(license);
        self
    }

    /// Check an org permission
    #[inline]
    #[must_use]
    pub fn has_permission(&self, permission: OrgPermission) -> bool {
        self.permissions.contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_license_is_never_exceeded_by_count() {
        let license = License {
            max_users: Some(-1),
            is_cloud_basics: false,
        };
        assert_eq!(license.user_limit(), None);
        assert!(!license.is_exceeded_by(10_000, true));
    }

    #[test]
    fn finite_license_is_exceeded_above_limit() {
        let license = License {
            max_users: Some(5),
            is_cloud_basics: false,
        };
        assert!(!license.is_exceeded_by(5, false));
        assert!(license.is_exceeded_by(6, false));
    }

    #[test]
    fn basics_license_is_exceeded_by_sso() {
        let license = License {
            max_users: None,
            is_cloud_basics: true,
        };
        assert!(!license.is_exceeded_by(2, false));
        assert!(license.is_exceeded_by(2, true));
    }

    #[test]
    fn permission_lookup() {
        let graph = SessionGraph::new("u1", OrgSummary::default())
            .with_permission(OrgPermission::OrgArchiveImportExport);
        assert!(graph.has_permission(OrgPermission::OrgArchiveImportExport));
        assert!(!graph.has_permission(OrgPermission::OrgManageBilling));
    }
}
