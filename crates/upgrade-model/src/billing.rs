//! Billing catalog: products, prices and money
//!
//! Amounts are integer cents so that plan pricing stays deterministic.

use crate::ids::{PriceId, ProductId};
use serde::{Deserialize, Serialize};

/// Billing interval of a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    #[default]
    Month,
    Year,
}

impl BillingInterval {
    /// Suffix used when displaying a price
    #[inline]
    #[must_use]
    pub fn per_label(&self) -> &'static str {
        match self {
            BillingInterval::Month => "per month",
            BillingInterval::Year => "per year",
        }
    }
}

impl std::str::FromStr for BillingInterval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "month" | "monthly" => Ok(BillingInterval::Month),
            "year" | "yearly" | "annual" => Ok(BillingInterval::Year),
            other => Err(format!("unknown billing interval: {other}")),
        }
    }
}

/// Amount of money in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub u64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// From whole dollars
    #[inline]
    #[must_use]
    pub const fn dollars(dollars: u64) -> Self {
        Self(dollars * 100)
    }

    #[inline]
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Apply a discount, rounding half up to the nearest cent
    #[inline]
    #[must_use]
    pub fn discounted(self, rate: DiscountRate) -> Self {
        Self((self.0 * u64::from(rate.percent()) + 50) / 100)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Multiplier expressed as a whole percentage of the catalog price (90 = pay 90%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountRate(u8);

impl DiscountRate {
    /// Create a rate; `None` above 100%
    #[inline]
    #[must_use]
    pub fn new(percent: u8) -> Option<Self> {
        (percent <= 100).then_some(Self(percent))
    }

    #[inline]
    #[must_use]
    pub const fn percent(&self) -> u8 {
        self.0
    }
}

/// Catalog product (a plan tier)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    /// Tier name as stored in the catalog, e.g. "v2 Cloud Basics"
    pub name: String,
    /// Tier includes SSO
    pub sso_enabled: bool,
    /// Largest org the tier accommodates; `None` = unlimited
    pub max_users: Option<u32>,
}

impl Product {
    /// Whether the tier fits `num_users` and the SSO requirement
    #[inline]
    #[must_use]
    pub fn accommodates(&self, num_users: u32, sso_required: bool) -> bool {
        (!sso_required || self.sso_enabled) && self.max_users.map_or(true, |max| num_users <= max)
    }

    /// Tier name without the catalog generation prefix
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix("v2 ").unwrap_or(&self.name)
    }
}

/// Catalog price for one product and interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub id: PriceId,
    pub product_id: ProductId,
    pub interval: BillingInterval,
    pub amount: Money,
}

/// Products and prices available to upgraded orgs
///
/// Loaded once per workflow; read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BillingCatalog {
    /// Ordered as the billing service returned them
    pub products: Vec<Product>,
    pub prices: Vec<Price>,
}

impl BillingCatalog {
    /// Create catalog
    #[inline]
    #[must_use]
    pub fn new(products: Vec<Product>, prices: Vec<Price>) -> Self {
        Self { products, prices }
    }

    /// Look up a product
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    /// Price of a product for an interval
    #[must_use]
    pub fn price_for(&self, product: &ProductId, interval: BillingInterval) -> Option<&Price> {
        self.prices
            .iter()
            .find(|p| &p.product_id == product && p.interval == interval)
    }

    /// Parse a catalog from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
