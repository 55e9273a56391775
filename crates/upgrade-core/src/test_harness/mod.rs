// Test harness module
// Simulated background process, fixtures and the workflow simulator

pub mod background;
pub mod simulator;

pub use background::{
    BackgroundCall, RemoteScript, RemoteStage, SimulatedBackground, SimulatedBackgroundBuilder,
};
pub use simulator::*;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use upgrade_model::{
    AppId, ArchiveApp, ArchiveUser, BillingCatalog, BillingInterval, KnownAccount, License,
    MigrationArchive, Money, OrgPermission, OrgSummary, Price, PriceId, Product, ProductId,
    SessionGraph,
};

/// Two-tier catalog: Basics ($10/mo, $100/yr, up to 20 users, no SSO) and
/// Pro ($20/mo, $200/yr, SSO, unlimited)
#[must_use]
pub fn sample_catalog() -> BillingCatalog {
    let price = |product: &str, interval: BillingInterval, dollars: u64| Price {
        id: PriceId::new(format!("{product}-{interval:?}").to_lowercase()),
        product_id: ProductId::new(product),
        interval,
        amount: Money::dollars(dollars),
    };

    BillingCatalog::new(
        vec![
            Product {
                id: ProductId::new("basics"),
                name: "v2 Cloud Basics".into(),
                sso_enabled: false,
                max_users: Some(20),
            },
            Product {
                id: ProductId::new("pro"),
                name: "v2 Cloud Pro".into(),
                sso_enabled: true,
                max_users: None,
            },
        ],
        vec![
            price("basics", BillingInterval::Month, 10),
            price("basics", BillingInterval::Year, 100),
            price("pro", BillingInterval::Month, 20),
            price("pro", BillingInterval::Year, 200),
        ],
    )
}

/// Fixed reference time so fixtures are reproducible
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Known account with credentials, authenticated `minutes_ago` before [`epoch`]
#[must_use]
pub fn known_account(account: &str, minutes_ago: i64) -> KnownAccount {
    KnownAccount::new(
        account,
        format!("org-{account}").as_str(),
        format!("Org {account}"),
        epoch() - ChronoDuration::minutes(minutes_ago),
    )
}

/// Session graph with the archive import permission and an unlimited license
#[must_use]
pub fn importable_session(account: &str, active_users: u32) -> SessionGraph {
    SessionGraph::new(
        account,
        OrgSummary {
            name: format!("Org {account}"),
            active_user_or_invite_count: active_users,
            custom_license: false,
        },
    )
    .with_permission(OrgPermission::OrgArchiveImportExport)
    .with_license(License {
        max_users: Some(-1),
        is_cloud_basics: false,
    })
}

/// Archive with `users` users and the given app names
#[must_use]
pub fn archive_with(account: &str, users: u32, apps: &[&str]) -> MigrationArchive {
    MigrationArchive {
        account_id: account.into(),
        org_users: (0..users)
            .map(|i| ArchiveUser {
                email: format!("user{i}@{account}.example.com"),
            })
            .collect(),
        apps: apps
            .iter()
            .map(|name| ArchiveApp {
                id: AppId::new(*name),
                name: (*name).to_string(),
            })
            .collect(),
        signed_preset_billing: false,
    }
}
