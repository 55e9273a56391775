//! Plan Selector
//!
//! Derives the plans a legacy org may move onto from the billing catalog:
//! - the default plan (cheapest product fitting the user count and SSO requirement)
//! - an SSO-capable alternative when the default lacks SSO
//! - the free tier for small orgs without SSO
//!
//! Plans are never stored; [`PlanOptions`] is recomputed whenever the user
//! count, the SSO flag or the billing interval changes, and a [`PlanSelector`]
//! override is revalidated against the fresh options.

use crate::error::WorkflowError;
use serde::Serialize;
use upgrade_model::{
    BillingCatalog, BillingInterval, DiscountRate, Money, Price, Product, ProductId, SessionGraph,
};

/// Free-tier threshold and discount rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingPolicy {
    /// Largest org offered the free tier
    pub free_tier_max_users: u32,
    /// Rate applied when the org is free-tier eligible
    pub free_tier_discount: DiscountRate,
    /// Rate applied otherwise
    pub loyalty_discount: DiscountRate,
}

impl PricingPolicy {
    #[inline]
    #[must_use]
    pub fn free_tier_eligible(&self, num_users: u32, sso_required: bool) -> bool {
        !sso_required && num_users <= self.free_tier_max_users
    }

    /// Rate applied to catalog prices for this user count and SSO choice
    #[inline]
    #[must_use]
    pub fn discount(&self, num_users: u32, sso_required: bool) -> DiscountRate {
        if self.free_tier_eligible(num_users, sso_required) {
            self.free_tier_discount
        } else {
            self.loyalty_discount
        }
    }
}

/// A product paired with its price for one interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub product: Product,
    pub price: Price,
}

/// Cheapest plan accommodating `num_users` with the SSO requirement
///
/// Ties go to the product listed first in the catalog. Products without a
/// price for `interval` are not candidates.
#[must_use]
pub fn plan_for_users(
    catalog: &BillingCatalog,
    num_users: u32,
    sso_required: bool,
    interval: BillingInterval,
) -> Option<Plan> {
    catalog
        .products
        .iter()
        .filter(|product| product.accommodates(num_users, sso_required))
        .filter_map(|product| {
            catalog
                .price_for(&product.id, interval)
                .map(|price| (product, price))
        })
        .min_by_key(|(_, price)| price.amount)
        .map(|(product, price)| Plan {
            product: product.clone(),
            price: price.clone(),
        })
}

/// Plans offered for one user count, SSO choice and interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanOptions {
    pub num_users: u32,
    pub sso_required: bool,
    pub interval: BillingInterval,
    pub default: Option<Plan>,
    /// SSO-capable plan, offered when the default lacks SSO
    pub alternative: Option<Plan>,
    pub free_tier: bool,
    /// Rate applied to every paid plan in these options
    pub discount: DiscountRate,
}

impl PlanOptions {
    /// Compute the offered plans
    #[must_use]
    pub fn compute(
        catalog: &BillingCatalog,
        policy: &PricingPolicy,
        num_users: u32,
        sso_required: bool,
        interval: BillingInterval,
    ) -> Self {
        let default = plan_for_users(catalog, num_users, sso_required, interval);

        let alternative = match &default {
            Some(plan) if !sso_required && !plan.product.sso_enabled => {
                plan_for_users(catalog, num_users, true, interval)
                    .filter(|alt| alt.product.id != plan.product.id)
            }
            _ => None,
        };

        Self {
            num_users,
            sso_required,
            interval,
            default,
            alternative,
            free_tier: policy.free_tier_eligible(num_users, sso_required),
            discount: policy.discount(num_users, sso_required),
        }
    }

    /// Offered paid plan for a product
    #[must_use]
    pub fn plan(&self, product: &ProductId) -> Option<&Plan> {
        self.default
            .iter()
            .chain(self.alternative.iter())
            .find(|plan| &plan.product.id == product)
    }

    /// Whether a choice is among these options
    #[must_use]
    pub fn offers(&self, choice: &PlanChoice) -> bool {
        match choice {
            PlanChoice::FreeTier => self.free_tier,
            PlanChoice::Product(id) => self.plan(id).is_some(),
        }
    }

    /// Choice in effect when the user has not overridden it
    #[must_use]
    pub fn default_choice(&self) -> Option<PlanChoice> {
        match &self.default {
            Some(plan) => Some(PlanChoice::Product(plan.product.id.clone())),
            None if self.free_tier => Some(PlanChoice::FreeTier),
            None => None,
        }
    }
}

/// A user's plan choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanChoice {
    Product(ProductId),
    FreeTier,
}

/// Price shown for a choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Quote {
    Free,
    Paid {
        product_id: ProductId,
        product_name: String,
        interval: BillingInterval,
        list: Money,
        displayed: Money,
        discount: DiscountRate,
    },
}

impl Quote {
    /// Amount the org will be billed each interval
    #[inline]
    #[must_use]
    pub fn amount(&self) -> Money {
        match self {
            Quote::Free => Money::ZERO,
            Quote::Paid { displayed, .. } => *displayed,
        }
    }

    fn for_plan(plan: &Plan, discount: DiscountRate) -> Self {
        Quote::Paid {
            product_id: plan.product.id.clone(),
            product_name: plan.product.display_name().to_string(),
            interval: plan.price.interval,
            list: plan.price.amount,
            displayed: plan.price.amount.discounted(discount),
            discount,
        }
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quote::Free => write!(f, "Free tier: {}", Money::ZERO),
            Quote::Paid {
                product_name,
                interval,
                displayed,
                ..
            } => write!(f, "{product_name}: {displayed} {}", interval.per_label()),
        }
    }
}

/// Tracks the user's plan and interval overrides
///
/// The product override and the interval override are independent; clearing
/// one never touches the other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlanSelector {
    choice: Option<PlanChoice>,
    interval: Option<BillingInterval>,
}

impl PlanSelector {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the plan
    ///
    /// # Errors
    /// `FreeTierNotOffered` or `PlanNotOffered` when `choice` is not among `options`.
    pub fn choose(&mut self, choice: PlanChoice, options: &PlanOptions) -> Result<(), WorkflowError> {
        if !options.offers(&choice) {
            return Err(match choice {
                PlanChoice::FreeTier => WorkflowError::FreeTierNotOffered,
                PlanChoice::Product(id) => WorkflowError::PlanNotOffered(id),
            });
        }
        self.choice = Some(choice);
        Ok(())
    }

    #[inline]
    pub fn set_interval(&mut self, interval: BillingInterval) {
        self.interval = Some(interval);
    }

    /// Interval in effect
    #[inline]
    #[must_use]
    pub fn interval(&self) -> BillingInterval {
        self.interval.unwrap_or_default()
    }

    /// Drop a product override the fresh options no longer offer
    ///
    /// Returns `true` when an override was dropped.
    pub fn revalidate(&mut self, options: &PlanOptions) -> bool {
        match &self.choice {
            Some(choice) if !options.offers(choice) => {
                self.choice = None;
                true
            }
            _ => false,
        }
    }

    /// Choice in effect: the override, otherwise the default
    #[must_use]
    pub fn selected(&self, options: &PlanOptions) -> Option<PlanChoice> {
        match &self.choice {
            Some(choice) if options.offers(choice) => Some(choice.clone()),
            _ => options.default_choice(),
        }
    }

    /// Price for the choice in effect
    #[must_use]
    pub fn quote(&self, options: &PlanOptions) -> Option<Quote> {
        match self.selected(options)? {
            PlanChoice::FreeTier => Some(Quote::Free),
            PlanChoice::Product(id) => options
                .plan(&id)
                .map(|plan| Quote::for_plan(plan, options.discount)),
        }
    }
}

/// Why no plan selection is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingSkip {
    /// Billing was arranged on the legacy side
    PresetBilling,
    /// Destination org is on a negotiated license
    CustomLicense,
    /// Destination's license already covers the upgraded org
    ExistingLicenseCovers,
}

/// What the billing step shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingDecision {
    Skip(BillingSkip),
    /// Destination's session graph is not loaded yet
    Pending,
    SelectPlan {
        /// Destination has a subscription the new plan replaces
        cancels_existing_subscription: bool,
    },
    /// Custom license would be outgrown; only sales can resolve this
    CustomLicenseLimitExceeded,
}

impl BillingDecision {
    #[inline]
    #[must_use]
    pub fn shows_plans(&self) -> bool {
        matches!(self, BillingDecision::SelectPlan { .. })
    }
}

/// Destination state as far as billing is concerned
#[derive(Debug, Clone, Copy)]
pub enum Destination<'a> {
    /// A new account will be created
    New,
    /// Existing account selected, session graph not loaded
    Loading,
    Loaded(&'a SessionGraph),
}

/// Decide the billing step
#[must_use]
pub fn decide_billing(
    preset_billing: bool,
    destination: Destination<'_>,
    num_users: u32,
    sso_enabled: bool,
) -> BillingDecision {
    if preset_billing {
        return BillingDecision::Skip(BillingSkip::PresetBilling);
    }

    let session = match destination {
        Destination::New => {
            return BillingDecision::SelectPlan {
                cancels_existing_subscription: false,
            }
        }
        Destination::Loading => return BillingDecision::Pending,
        Destination::Loaded(session) => session,
    };

    let exceeded = session
        .license
        .is_some_and(|license| license.is_exceeded_by(num_users, sso_enabled));

    match (session.org.custom_license, exceeded) {
        (true, true) => BillingDecision::CustomLicenseLimitExceeded,
        (true, false) => BillingDecision::Skip(BillingSkip::CustomLicense),
        (false, false) => BillingDecision::Skip(BillingSkip::ExistingLicenseCovers),
        (false, true) => BillingDecision::SelectPlan {
            cancels_existing_subscription: true,
        },
    }
}
