//! Testing utilities for the upgrade workspace
//!
//! Shared fixtures and controller setup for integration tests.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;
use upgrade_core::test_harness::SimulatedBackground;
use upgrade_core::workflow::{UpgradeController, WorkflowPhase};
use upgrade_core::WorkflowConfig;
use upgrade_model::{KnownAccount, LegacyUpgrade, License, SessionGraph};

pub use upgrade_core::test_harness::{
    archive_with, epoch, importable_session, known_account, sample_catalog, BackgroundCall,
    RemoteScript, RemoteStage,
};

/// Longest a test waits for the controller to settle
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default configuration with a 100ms refresh period
pub fn fast_config() -> WorkflowConfig {
    WorkflowConfig::new().with_refresh_interval(Duration::from_millis(100))
}

/// Legacy payload for an org of `users`
pub fn legacy(users: u32) -> LegacyUpgrade {
    LegacyUpgrade::new(users, "encrypted-archive", "encryption-key")
}

/// Importable session whose org carries the given license
pub fn licensed_session(
    account: &str,
    active_users: u32,
    max_users: i64,
    custom_license: bool,
) -> SessionGraph {
    let mut session = importable_session(account, active_users).with_license(License {
        max_users: Some(max_users),
        is_cloud_basics: false,
    });
    session.org.custom_license = custom_license;
    session
}

pub fn setup_controller(
    background: &Arc<SimulatedBackground>,
    legacy: LegacyUpgrade,
    accounts: Vec<KnownAccount>,
) -> UpgradeController {
    UpgradeController::new(background.clone(), fast_config(), Some(legacy), accounts).unwrap()
}

/// Apply events until `done` holds, failing the test after [`SETTLE_TIMEOUT`]
pub async fn settle(controller: &mut UpgradeController, done: impl Fn(&UpgradeController) -> bool) {
    tokio::time::timeout(SETTLE_TIMEOUT, controller.run_until(done))
        .await
        .expect("controller did not settle in time")
        .unwrap();
}

/// Begin and wait until preparation finishes
pub async fn prepared(
    background: &Arc<SimulatedBackground>,
    legacy: LegacyUpgrade,
    accounts: Vec<KnownAccount>,
) -> UpgradeController {
    let mut controller = setup_controller(background, legacy, accounts);
    controller.begin().unwrap();
    settle(&mut controller, |c| c.phase() != WorkflowPhase::Preparing).await;
    controller
}
