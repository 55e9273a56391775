//! Controller configuration
//!
//! Defaults match the production upgrade flow; a TOML file may override any
//! field.

use crate::plan::PricingPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use upgrade_model::DiscountRate;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("invalid value for field {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Workflow configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Status refresh period while the remote import runs
    pub refresh_interval_ms: u64,
    /// Largest org offered the free tier
    pub free_tier_max_users: u32,
    /// Percentage of list price paid by free-tier-eligible orgs
    pub free_tier_discount_percent: u8,
    /// Percentage of list price paid by everyone else
    pub loyalty_discount_percent: u8,
    /// Prefix stripped from background error messages
    pub error_prefix: String,
    /// Shown with every fatal error
    pub support_contact: String,
    /// Shown with the custom-license notice
    pub sales_contact: String,
    /// Pre-filled device name for new accounts
    pub default_device_name: Option<String>,
}

impl WorkflowConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With refresh interval
    #[inline]
    #[must_use]
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With default device name
    #[inline]
    #[must_use]
    pub fn with_default_device_name(mut self, name: impl Into<String>) -> Self {
        self.default_device_name = Some(name.into());
        self
    }

    /// Refresh interval as a duration
    #[inline]
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Pricing rules derived from this configuration
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` when a discount exceeds 100%.
    pub fn pricing(&self) -> Result<PricingPolicy, ConfigError> {
        let free_tier_discount = DiscountRate::new(self.free_tier_discount_percent).ok_or(
            ConfigError::InvalidValue {
                field: "free_tier_discount_percent",
                reason: "must be at most 100".to_string(),
            },
        )?;
        let loyalty_discount = DiscountRate::new(self.loyalty_discount_percent).ok_or(
            ConfigError::InvalidValue {
                field: "loyalty_discount_percent",
                reason: "must be at most 100".to_string(),
            },
        )?;

        Ok(PricingPolicy {
            free_tier_max_users: self.free_tier_max_users,
            free_tier_discount,
            loyalty_discount,
        })
    }

    /// Check field values
    ///
    /// # Errors
    /// The first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.pricing().map(|_| ())
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// `ConfigError::TomlParse` or `ConfigError::InvalidValue`.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` when the file cannot be read, otherwise as
    /// [`WorkflowConfig::from_toml_str`].
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
            free_tier_max_users: 3,
            free_tier_discount_percent: 85,
            loyalty_discount_percent: 90,
            error_prefix: "v1 upgrade - ".to_string(),
            support_contact: "support@envkey.com".to_string(),
            sales_contact: "sales@envkey.com".to_string(),
            default_device_name: None,
        }
    }
}
