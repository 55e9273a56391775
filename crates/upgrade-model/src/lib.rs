//! Upgrade Model
//!
//! Plain data shared by the upgrade controller and its collaborators.
//!
//! # Core Concepts
//!
//! - [`KnownAccount`] / [`DestinationAccount`]: cloud accounts the legacy org
//!   may be upgraded into
//! - [`SessionGraph`]: access graph snapshot for one destination account
//! - [`BillingCatalog`]: products and prices, loaded once per workflow
//! - [`LegacyUpgrade`] / [`MigrationArchive`]: the legacy org before and
//!   after decryption
//! - [`UpgradeRequest`]: the parameters submitted to start the remote upgrade,
//!   only obtainable through [`UpgradeRequestBuilder`]
//!
//! # Example
//!
//! ```rust,ignore
//! use upgrade_model::{BillingInterval, ProductId, UpgradeRequest};
//!
//! let request = UpgradeRequest::builder()
//!     .device_name("laptop")
//!     .product(ProductId::new("basics"), BillingInterval::Month)
//!     .build()?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
mod account;
mod archive;
mod billing;
mod ids;
mod request;
mod session;

// Re-exports
pub use account::{DestinationAccount, KnownAccount};
pub use archive::{ArchiveApp, ArchiveUser, LegacyUpgrade, MigrationArchive};
pub use billing::{BillingCatalog, BillingInterval, DiscountRate, Money, Price, Product};
pub use ids::{AccountId, AppId, AttemptId, OrgId, PriceId, ProductId};
pub use request::{AppSelection, RequestError, UpgradeRequest, UpgradeRequestBuilder};
pub use session::{License, OrgPermission, OrgSummary, SessionGraph, Subscription};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
