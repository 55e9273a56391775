//! Upgrade request and its validating builder
//!
//! An [`UpgradeRequest`] can only be produced by [`UpgradeRequestBuilder::build`],
//! which rejects field combinations the remote side cannot act on instead of
//! silently dropping fields.

use crate::billing::BillingInterval;
use crate::ids::{AccountId, AppId, AttemptId, ProductId};
use serde::{Deserialize, Serialize};

/// Invalid request field combination
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// A device name only applies when a new account is created
    #[error("device name given while upgrading into an existing account")]
    DeviceNameWithAccount,

    /// New account needs a device name
    #[error("device name is required when creating a new account")]
    MissingDeviceName,

    /// Free tier and a paid product are exclusive
    #[error("a paid product was chosen together with the free tier")]
    ProductWithFreeTier,

    /// Free tier has no SSO
    #[error("the free tier cannot be combined with SSO")]
    FreeTierWithSso,

    /// New paid account needs a product
    #[error("a product is required when creating a new paid account")]
    MissingProduct,

    /// Chosen app subset is empty
    #[error("app selection is empty")]
    EmptyAppSelection,

    /// App subsets only apply to an existing account's archive
    #[error("app selection given without a destination account")]
    AppSelectionWithoutAccount,
}

/// Which legacy apps to bring over
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppSelection {
    #[default]
    All,
    Chosen(Vec<AppId>),
}

/// Parameters submitted to start the remote upgrade
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    attempt_id: AttemptId,
    account_id: Option<AccountId>,
    device_name: Option<String>,
    sso_enabled: bool,
    import_org_users: bool,
    import_local_keys: bool,
    import_servers: bool,
    import_app_ids: Option<Vec<AppId>>,
    billing_interval: Option<BillingInterval>,
    product_id: Option<ProductId>,
    free_tier: bool,
}

impl UpgradeRequest {
    /// Start building a request
    #[inline]
    #[must_use]
    pub fn builder() -> UpgradeRequestBuilder {
        UpgradeRequestBuilder::default()
    }

    #[inline]
    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[inline]
    #[must_use]
    pub fn account_id(&self) -> Option<&AccountId> {
        self.account_id.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn sso_enabled(&self) -> bool {
        self.sso_enabled
    }

    /// Legacy users are imported only when they will sign in by email
    #[inline]
    #[must_use]
    pub fn import_org_users(&self) -> bool {
        self.import_org_users
    }

    #[inline]
    #[must_use]
    pub fn import_local_keys(&self) -> bool {
        self.import_local_keys
    }

    #[inline]
    #[must_use]
    pub fn import_servers(&self) -> bool {
        self.import_servers
    }

    /// `None` means every app
    #[inline]
    #[must_use]
    pub fn import_app_ids(&self) -> Option<&[AppId]> {
        self.import_app_ids.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn billing_interval(&self) -> Option<BillingInterval> {
        self.billing_interval
    }

    #[inline]
    #[must_use]
    pub fn product_id(&self) -> Option<&ProductId> {
        self.product_id.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn free_tier(&self) -> bool {
        self.free_tier
    }
}

/// Builder for [`UpgradeRequest`]
///
/// Usage:
/// ```rust,ignore
/// let request = UpgradeRequest::builder()
///     .account(AccountId::new("user-1"))
///     .sso(true)
///     .apps(AppSelection::Chosen(vec![AppId::new("app-1")]))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct UpgradeRequestBuilder {
    account_id: Option<AccountId>,
    device_name: Option<String>,
    sso_enabled: bool,
    import_local_keys: bool,
    apps: AppSelection,
    product: Option<(ProductId, BillingInterval)>,
    free_tier: bool,
}

impl Default for UpgradeRequestBuilder {
    fn default() -> Self {
        Self {
            account_id: None,
            device_name: None,
            sso_enabled: false,
            import_local_keys: true,
            apps: AppSelection::All,
            product: None,
            free_tier: false,
        }
    }
}

impl UpgradeRequestBuilder {
    /// Upgrade into an existing account
    #[inline]
    #[must_use]
    pub fn account(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Name of this device in the new account
    #[inline]
    #[must_use]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn sso(mut self, enabled: bool) -> Self {
        self.sso_enabled = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn import_local_keys(mut self, import: bool) -> Self {
        self.import_local_keys = import;
        self
    }

    #[inline]
    #[must_use]
    pub fn apps(mut self, apps: AppSelection) -> Self {
        self.apps = apps;
        self
    }

    /// Paid product and the interval it is billed at
    #[inline]
    #[must_use]
    pub fn product(mut self, product_id: ProductId, interval: BillingInterval) -> Self {
        self.product = Some((product_id, interval));
        self
    }

    #[inline]
    #[must_use]
    pub fn free_tier(mut self, free_tier: bool) -> Self {
        self.free_tier = free_tier;
        self
    }

    /// Validate the combination and produce the request
    ///
    /// # Errors
    /// Returns the first [`RequestError`] the combination violates.
    pub fn build(self) -> Result<UpgradeRequest, RequestError> {
        let has_account = self.account_id.is_some();

        match (&self.account_id, &self.device_name) {
            (Some(_), Some(_)) => return Err(RequestError::DeviceNameWithAccount),
            (None, None) => return Err(RequestError::MissingDeviceName),
            (None, Some(name)) if name.trim().is_empty() => {
                return Err(RequestError::MissingDeviceName)
            }
            _ => {}
        }

        if self.free_tier {
            if self.product.is_some() {
                return Err(RequestError::ProductWithFreeTier);
            }
            if self.sso_enabled {
                return Err(RequestError::FreeTierWithSso);
            }
        } else if !has_account && self.product.is_none() {
            return Err(RequestError::MissingProduct);
        }

        let import_app_ids = match self.apps {
            AppSelection::All => None,
            AppSelection::Chosen(_) if !has_account => {
                return Err(RequestError::AppSelectionWithoutAccount)
            }
            AppSelection::Chosen(ids) if ids.is_empty() => {
                return Err(RequestError::EmptyAppSelection)
            }
            AppSelection::Chosen(ids) => Some(ids),
        };

        let (product_id, billing_interval) = match self.product {
            Some((id, interval)) => (Some(id), Some(interval)),
            None => (None, None),
        };

        Ok(UpgradeRequest {
            attempt_id: AttemptId::new(),
            account_id: self.account_id,
            device_name: self.device_name.map(|n| n.trim().to_string()),
            sso_enabled: self.sso_enabled,
            import_org_users: !self.sso_enabled,
            import_local_keys: self.import_local_keys,
            import_servers: true,
            import_app_ids,
            billing_interval,
            product_id,
            free_tier: self.free_tier,
        })
    }
}
