//! End-to-end workflows against the simulated background process

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use upgrade_core::aggregator::ErrorChannel;
use upgrade_core::background::{BackgroundProcess, ErrorPayload, StatusSnapshot};
use upgrade_core::plan::{BillingDecision, BillingSkip, PlanChoice, Quote};
use upgrade_core::test_harness::SimulatedBackground;
use upgrade_core::workflow::{
    BillingNotice, JournalKind, UpgradeController, UserAction, WorkflowPhase,
};
use upgrade_core::{BackgroundError, WorkflowError};
use upgrade_model::{
    AccountId, AppId, AppSelection, BillingCatalog, LegacyUpgrade, MigrationArchive, Money,
    ProductId, SessionGraph, UpgradeRequest,
};
use upgrade_test_utils::*;

/// Simulated background whose status feed can be closed mid-workflow
struct DetachableFeed {
    inner: Arc<SimulatedBackground>,
    feed: Mutex<Option<watch::Sender<StatusSnapshot>>>,
}

impl DetachableFeed {
    fn new(inner: Arc<SimulatedBackground>) -> Arc<Self> {
        let (feed, _) = watch::channel(StatusSnapshot::default());
        Arc::new(Self {
            inner,
            feed: Mutex::new(Some(feed)),
        })
    }

    fn close(&self) {
        self.feed.lock().take();
    }
}

#[async_trait]
impl BackgroundProcess for DetachableFeed {
    async fn reset_import_preparation(
        &self,
        account: Option<AccountId>,
    ) -> Result<(), BackgroundError> {
        self.inner.reset_import_preparation(account).await
    }

    async fn cached_session(&self, account: &AccountId) -> Option<SessionGraph> {
        self.inner.cached_session(account).await
    }

    async fn fetch_session(&self, account: &AccountId) -> Result<SessionGraph, BackgroundError> {
        self.inner.fetch_session(account).await
    }

    async fn load_billing_catalog(&self) -> Result<BillingCatalog, BackgroundError> {
        self.inner.load_billing_catalog().await
    }

    async fn decrypt_migration_archive(
        &self,
        account: &AccountId,
        payload: &LegacyUpgrade,
        is_legacy_upgrade: bool,
    ) -> Result<MigrationArchive, BackgroundError> {
        self.inner
            .decrypt_migration_archive(account, payload, is_legacy_upgrade)
            .await
    }

    async fn start_upgrade(&self, request: &UpgradeRequest) -> Result<(), BackgroundError> {
        self.inner.start_upgrade(request).await
    }

    async fn cancel_or_reset_upgrade(&self, cancel: bool) -> Result<(), BackgroundError> {
        self.inner.cancel_or_reset_upgrade(cancel).await
    }

    async fn snapshot(&self) -> Result<StatusSnapshot, BackgroundError> {
        self.inner.snapshot().await
    }

    fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        match self.feed.lock().as_ref() {
            Some(feed) => feed.subscribe(),
            None => watch::channel(StatusSnapshot::default()).1,
        }
    }
}

fn is_terminal(c: &UpgradeController) -> bool {
    c.phase().is_terminal()
}

async fn select_destination(controller: &mut UpgradeController, account: &str) {
    controller
        .act(UserAction::SelectAccount(Some(AccountId::new(account))))
        .await
        .unwrap();
    settle(controller, |c| c.archive().is_some() || c.phase().is_terminal()).await;
}

#[tokio::test(start_paused = true)]
async fn test_catalog_failure_before_scan_errors() {
    let background = SimulatedBackground::builder()
        .catalog_failure("v1 upgrade - billing unavailable")
        .session_delay("dest", Duration::from_secs(1))
        .session(importable_session("dest", 1))
        .build();
    let mut controller = setup_controller(&background, legacy(3), vec![known_account("dest", 5)]);
    controller.begin().unwrap();

    settle(&mut controller, is_terminal).await;

    assert_eq!(controller.phase(), WorkflowPhase::Errored);
    assert!(controller.eligible_accounts().is_empty());
    assert_eq!(controller.timer_stats().starts, 0);

    let display = controller.error_display().unwrap();
    assert_eq!(display.message.as_deref(), Some("Billing unavailable."));
    assert_eq!(display.contact, "support@envkey.com");
}

#[tokio::test(start_paused = true)]
async fn test_begin_without_legacy_payload() {
    let background = SimulatedBackground::builder().build();
    let mut controller =
        UpgradeController::new(background.clone(), fast_config(), None, Vec::new()).unwrap();

    assert!(matches!(controller.begin(), Err(WorkflowError::NothingToUpgrade)));
    assert_eq!(controller.phase(), WorkflowPhase::NotStarted);

    controller.shutdown().await;
    assert!(background.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_account_free_tier() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(3), Vec::new()).await;
    assert_eq!(controller.phase(), WorkflowPhase::Configuring);

    let options = controller.plan_options().unwrap();
    assert!(options.free_tier);
    assert_eq!(controller.quote().unwrap().amount(), Money(850));

    controller
        .act(UserAction::ChoosePlan(PlanChoice::FreeTier))
        .await
        .unwrap();
    assert_eq!(controller.quote(), Some(Quote::Free));

    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();
    assert_eq!(controller.phase(), WorkflowPhase::Upgrading);

    let request = controller.request().unwrap().clone();
    assert!(request.free_tier());
    assert_eq!(request.product_id(), None);
    assert_eq!(request.device_name(), Some("laptop"));

    settle(&mut controller, is_terminal).await;
    assert_eq!(controller.phase(), WorkflowPhase::Complete);
    assert!(!controller.timer_active());
    assert!(controller.timer_stats().balanced());
    assert_eq!(background.started(), vec![request]);

    let refreshed = vec![known_account("older", 60), known_account("created", 0)];
    assert_eq!(
        controller.completion_target(&refreshed),
        Some(AccountId::new("created"))
    );

    controller.shutdown().await;
    assert_eq!(background.cancel_count(), 0);
    assert_eq!(background.signal_count(false), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sso_org_gets_discounted_pro() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(10), Vec::new()).await;

    controller.act(UserAction::SetSso(true)).await.unwrap();
    let quote = controller.quote().unwrap();
    assert_eq!(quote.amount(), Money::dollars(18));
    assert_eq!(quote.to_string(), "Cloud Pro: $18.00 per month");
    assert!(matches!(
        controller.act(UserAction::ChoosePlan(PlanChoice::FreeTier)).await,
        Err(WorkflowError::FreeTierNotOffered)
    ));

    controller
        .act(UserAction::SetDeviceName("desk".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();

    let request = controller.request().unwrap();
    assert_eq!(request.product_id(), Some(&ProductId::new("pro")));
    assert!(request.sso_enabled());
    assert!(!request.import_org_users());
    assert!(!request.free_tier());
}

#[tokio::test(start_paused = true)]
async fn test_plan_override_reverts_when_sso_enabled() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(2), Vec::new()).await;

    controller
        .act(UserAction::ChoosePlan(PlanChoice::FreeTier))
        .await
        .unwrap();
    controller.act(UserAction::SetSso(true)).await.unwrap();

    assert_eq!(
        controller.selected_plan(),
        Some(PlanChoice::Product(ProductId::new("pro")))
    );
    assert_eq!(
        controller
            .journal()
            .count(|k| matches!(k, JournalKind::PlanReverted)),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_new_account_requires_device_name() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(5), Vec::new()).await;

    let result = controller.act(UserAction::Submit).await;
    assert!(matches!(result, Err(WorkflowError::InvalidRequest(_))));
    assert_eq!(controller.phase(), WorkflowPhase::Configuring);
    assert!(background.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_existing_account_covered_by_license() {
    let background = SimulatedBackground::builder()
        .session(importable_session("dest", 2))
        .archive(archive_with("dest", 2, &["api", "web"]))
        .build();
    let mut controller = prepared(&background, legacy(2), vec![known_account("dest", 5)]).await;
    assert_eq!(controller.eligible_accounts().len(), 1);

    controller
        .act(UserAction::SelectAccount(Some(AccountId::new("dest"))))
        .await
        .unwrap();
    assert_eq!(
        controller.status_line().as_deref(),
        Some("Loading upgrade archive")
    );
    assert_eq!(controller.billing_decision(), BillingDecision::Pending);
    settle(&mut controller, |c| c.archive().is_some()).await;

    assert_eq!(controller.projected_users(), 4);
    assert!(controller.offers_app_selection());
    assert_eq!(
        controller.billing_decision(),
        BillingDecision::Skip(BillingSkip::ExistingLicenseCovers)
    );
    assert_eq!(controller.quote(), None);

    assert!(matches!(
        controller
            .act(UserAction::SelectApps(AppSelection::Chosen(vec![AppId::new("cli")])))
            .await,
        Err(WorkflowError::UnknownApp(_))
    ));
    controller
        .act(UserAction::SelectApps(AppSelection::Chosen(vec![AppId::new("api")])))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();

    let request = controller.request().unwrap().clone();
    assert_eq!(request.account_id(), Some(&AccountId::new("dest")));
    assert_eq!(request.import_app_ids(), Some(&[AppId::new("api")][..]));
    assert!(!request.free_tier());

    settle(&mut controller, is_terminal).await;
    assert_eq!(controller.phase(), WorkflowPhase::Complete);
    assert_eq!(
        controller.completion_target(&[known_account("other", 0)]),
        Some(AccountId::new("dest"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_small_existing_org_requests_free_tier() {
    let background = SimulatedBackground::builder()
        .session(importable_session("dest", 1))
        .archive(archive_with("dest", 1, &[]))
        .build();
    let mut controller = prepared(&background, legacy(1), vec![known_account("dest", 5)]).await;
    select_destination(&mut controller, "dest").await;

    assert_eq!(controller.projected_users(), 2);
    controller.act(UserAction::Submit).await.unwrap();
    assert!(controller.request().unwrap().free_tier());
}

#[tokio::test(start_paused = true)]
async fn test_ineligible_account_rejected() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(2), Vec::new()).await;

    let result = controller
        .act(UserAction::SelectAccount(Some(AccountId::new("stranger"))))
        .await;
    assert!(matches!(result, Err(WorkflowError::IneligibleAccount(_))));
    assert_eq!(controller.selected_account(), None);
}

#[tokio::test(start_paused = true)]
async fn test_custom_license_exceeded_blocks_submit() {
    let background = SimulatedBackground::builder()
        .session(licensed_session("dest", 5, 6, true))
        .archive(archive_with("dest", 3, &[]))
        .build();
    let mut controller = prepared(&background, legacy(3), vec![known_account("dest", 5)]).await;
    select_destination(&mut controller, "dest").await;

    assert_eq!(
        controller.billing_decision(),
        BillingDecision::CustomLicenseLimitExceeded
    );
    assert_eq!(
        controller.notice(),
        Some(BillingNotice::CustomLicenseLimitExceeded {
            contact: "sales@envkey.com".into()
        })
    );
    assert!(matches!(
        controller.act(UserAction::Submit).await,
        Err(WorkflowError::CustomLicenseLimitExceeded)
    ));
    assert_eq!(controller.phase(), WorkflowPhase::Configuring);
}

#[tokio::test(start_paused = true)]
async fn test_exceeded_license_shows_plans_with_notice() {
    let background = SimulatedBackground::builder()
        .session(licensed_session("dest", 5, 6, false))
        .archive(archive_with("dest", 3, &[]))
        .build();
    let mut controller = prepared(&background, legacy(3), vec![known_account("dest", 5)]).await;
    select_destination(&mut controller, "dest").await;

    assert_eq!(
        controller.notice(),
        Some(BillingNotice::ExistingSubscriptionCanceled)
    );
    // 8 users: basics at 90%
    assert_eq!(controller.quote().unwrap().amount(), Money::dollars(9));

    controller.act(UserAction::Submit).await.unwrap();
    assert_eq!(
        controller.request().unwrap().product_id(),
        Some(&ProductId::new("basics"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_session_response_discarded() {
    let background = SimulatedBackground::builder()
        .cached_session(importable_session("slow", 1))
        .session_delay("slow", Duration::from_millis(500))
        .session(importable_session("dest", 1))
        .archive(archive_with("dest", 2, &[]))
        .build();
    let accounts = vec![known_account("slow", 1), known_account("dest", 5)];
    let mut controller = prepared(&background, legacy(2), accounts).await;
    assert_eq!(controller.eligible_accounts().len(), 2);

    controller
        .act(UserAction::SelectAccount(Some(AccountId::new("slow"))))
        .await
        .unwrap();
    select_destination(&mut controller, "dest").await;

    settle(&mut controller, |c| {
        c.journal()
            .count(|k| matches!(k, JournalKind::StaleResponse { .. }))
            > 0
    })
    .await;

    assert_eq!(controller.selected_account(), Some(&AccountId::new("dest")));
    assert_eq!(
        controller.archive().map(|a| a.account_id.clone()),
        Some(AccountId::new("dest"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_decrypt_failure_errors_import_channel() {
    let background = SimulatedBackground::builder()
        .session(importable_session("dest", 1))
        .decrypt_failure("v1 upgrade - couldn't decrypt archive")
        .build();
    let mut controller = prepared(&background, legacy(2), vec![known_account("dest", 5)]).await;
    select_destination(&mut controller, "dest").await;

    assert_eq!(controller.phase(), WorkflowPhase::Errored);
    assert_eq!(
        controller.error_display().unwrap().message.as_deref(),
        Some("Couldn't decrypt archive.")
    );
}

#[tokio::test(start_paused = true)]
async fn test_upgrade_finished_while_import_running_stays_importing() {
    let background = SimulatedBackground::builder()
        .script(RemoteScript {
            step_delay: Duration::from_millis(10),
            stages: vec![
                RemoteStage::Registering,
                RemoteStage::ImportStarted,
                RemoteStage::UpgradeFinished,
            ],
        })
        .build();
    let mut controller = prepared(&background, legacy(5), Vec::new()).await;
    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();

    // First refresh tick comes after every stage was applied
    let polled = background.clone();
    settle(&mut controller, move |_| {
        polled.calls().contains(&BackgroundCall::Snapshot)
    })
    .await;
    assert_eq!(controller.phase(), WorkflowPhase::Importing);
    assert!(controller.timer_active());
    assert_eq!(controller.status_line().as_deref(), Some("Starting import"));

    background.push_status(|s| s.import_in_progress = false);
    settle(&mut controller, |c| {
        c.phase() == WorkflowPhase::AwaitingRemoteCompletion
    })
    .await;
    assert!(controller.timer_active());
    assert_eq!(
        controller.status_line().as_deref(),
        Some("Waiting for remote finalization")
    );

    background.push_status(|s| s.legacy_released = true);
    settle(&mut controller, is_terminal).await;
    assert_eq!(controller.phase(), WorkflowPhase::Complete);
    assert!(!controller.timer_active());
    assert_eq!(controller.timer_stats().starts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_then_return_home() {
    let background = SimulatedBackground::builder()
        .script(RemoteScript::failing(
            Duration::from_millis(10),
            ErrorPayload::message("v1 upgrade - org creation failed"),
        ))
        .build();
    let mut controller = prepared(&background, legacy(5), Vec::new()).await;
    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();

    settle(&mut controller, is_terminal).await;
    assert_eq!(controller.phase(), WorkflowPhase::Errored);
    assert!(!controller.timer_active());
    assert_eq!(
        controller.error_display().unwrap().message.as_deref(),
        Some("Org creation failed.")
    );
    assert_eq!(controller.completion_target(&[known_account("a", 0)]), None);

    controller.act(UserAction::ReturnHome).await.unwrap();
    controller.act(UserAction::ReturnHome).await.unwrap();
    controller.shutdown().await;
    assert_eq!(background.cancel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_errors_upgrade_channel() {
    let background = SimulatedBackground::builder()
        .start_failure("v1 upgrade - upgrade already running")
        .build();
    let mut controller = prepared(&background, legacy(5), Vec::new()).await;
    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();

    settle(&mut controller, is_terminal).await;
    assert_eq!(controller.phase(), WorkflowPhase::Errored);
    assert_eq!(
        controller.error_display().unwrap().message.as_deref(),
        Some("Upgrade already running.")
    );

    // Teardown releases the reservation when the user never went home
    controller.shutdown().await;
    assert_eq!(background.cancel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_preparing() {
    let background = SimulatedBackground::builder()
        .catalog_delay(Duration::from_secs(1))
        .build();
    let mut controller = setup_controller(&background, legacy(3), Vec::new());
    controller.begin().unwrap();

    controller.act(UserAction::Cancel).await.unwrap();
    assert_eq!(controller.phase(), WorkflowPhase::Canceled);
    assert_eq!(background.cancel_count(), 1);

    // Late scan and catalog results are discarded
    tokio::time::sleep(Duration::from_secs(2)).await;
    for _ in 0..2 {
        controller.step().await.unwrap();
    }
    assert_eq!(controller.phase(), WorkflowPhase::Canceled);
    assert!(controller.catalog().is_none());

    controller.act(UserAction::Cancel).await.unwrap();
    controller.shutdown().await;
    assert_eq!(background.cancel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_actions_rejected_outside_configuring() {
    let background = SimulatedBackground::builder()
        .catalog_delay(Duration::from_secs(1))
        .build();
    let mut controller = setup_controller(&background, legacy(3), Vec::new());
    controller.begin().unwrap();

    assert!(matches!(
        controller.act(UserAction::SetSso(true)).await,
        Err(WorkflowError::ActionNotAllowed { .. })
    ));
    assert!(matches!(
        controller.act(UserAction::ReturnHome).await,
        Err(WorkflowError::ActionNotAllowed { .. })
    ));
    assert!(matches!(
        controller.begin(),
        Err(WorkflowError::ActionNotAllowed { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_unavailable_after_complete() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(5), Vec::new()).await;
    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();
    settle(&mut controller, is_terminal).await;

    assert!(matches!(
        controller.act(UserAction::Cancel).await,
        Err(WorkflowError::CancelUnavailable)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_reservation() {
    let background = SimulatedBackground::builder().build();
    let controller = prepared(&background, legacy(5), Vec::new()).await;
    drop(controller);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(background.cancel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_journal_records_phase_path() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(2), Vec::new()).await;
    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();
    settle(&mut controller, is_terminal).await;

    assert_eq!(
        controller.journal().phases(),
        vec![
            WorkflowPhase::NotStarted,
            WorkflowPhase::Preparing,
            WorkflowPhase::Configuring,
            WorkflowPhase::Upgrading,
            WorkflowPhase::Importing,
            WorkflowPhase::AwaitingRemoteCompletion,
            WorkflowPhase::Complete,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_status_feed_errors_upgrade() {
    let inner = SimulatedBackground::builder().build();
    let background = DetachableFeed::new(inner.clone());
    let mut controller =
        UpgradeController::new(background.clone(), fast_config(), Some(legacy(5)), Vec::new())
            .unwrap();
    controller.begin().unwrap();
    settle(&mut controller, |c| c.phase() != WorkflowPhase::Preparing).await;
    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();
    assert_eq!(controller.phase(), WorkflowPhase::Upgrading);

    background.close();
    settle(&mut controller, is_terminal).await;

    assert_eq!(controller.phase(), WorkflowPhase::Errored);
    assert_eq!(
        controller.errors().get(ErrorChannel::Upgrade),
        Some(&ErrorPayload::unknown())
    );
    let display = controller.error_display().unwrap();
    assert_eq!(display.message, None);
    assert_eq!(display.contact, "support@envkey.com");
    assert!(!controller.timer_active());

    controller.shutdown().await;
    assert_eq!(inner.cancel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_feed_closed_before_begin_errors_while_preparing() {
    let inner = SimulatedBackground::builder()
        .catalog_delay(Duration::from_secs(1))
        .build();
    let background = DetachableFeed::new(inner.clone());
    background.close();
    let mut controller =
        UpgradeController::new(background, fast_config(), Some(legacy(2)), Vec::new()).unwrap();
    controller.begin().unwrap();

    settle(&mut controller, is_terminal).await;
    assert_eq!(controller.phase(), WorkflowPhase::Errored);
    assert_eq!(controller.timer_stats().starts, 0);
    assert!(inner.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timer_runs_only_while_polling() {
    let background = SimulatedBackground::builder().build();
    let mut controller = prepared(&background, legacy(5), Vec::new()).await;
    controller
        .act(UserAction::SetDeviceName("laptop".into()))
        .await
        .unwrap();
    controller.act(UserAction::Submit).await.unwrap();

    let finished = tokio::time::timeout(SETTLE_TIMEOUT, async {
        while !controller.phase().is_terminal() {
            controller.step().await.unwrap();
            assert_eq!(
                controller.timer_active(),
                controller.phase().polls_status(),
                "timer out of step in {}",
                controller.phase()
            );
        }
    })
    .await;
    assert!(finished.is_ok());

    assert_eq!(controller.phase(), WorkflowPhase::Complete);
    assert!(controller
        .journal()
        .phases()
        .contains(&WorkflowPhase::AwaitingRemoteCompletion));
    assert_eq!(controller.timer_stats().starts, 1);
    assert!(controller.timer_stats().balanced());
}

#[tokio::test(start_paused = true)]
async fn test_plan_selection_without_fitting_plan_refuses_submit() {
    let mut catalog = sample_catalog();
    catalog.products.retain(|p| p.id.as_str() == "basics");
    catalog.prices.retain(|p| p.product_id.as_str() == "basics");

    let background = SimulatedBackground::builder()
        .catalog(catalog)
        .session(licensed_session("dest", 5, 6, false))
        .archive(archive_with("dest", 20, &[]))
        .build();
    let mut controller = prepared(&background, legacy(3), vec![known_account("dest", 5)]).await;
    select_destination(&mut controller, "dest").await;

    // 25 users outgrow the only product and the free tier
    assert_eq!(controller.projected_users(), 25);
    assert_eq!(
        controller.notice(),
        Some(BillingNotice::ExistingSubscriptionCanceled)
    );
    assert_eq!(controller.selected_plan(), None);
    assert_eq!(controller.quote(), None);

    assert!(matches!(
        controller.act(UserAction::Submit).await,
        Err(WorkflowError::BillingNotSelectable)
    ));
    assert_eq!(controller.phase(), WorkflowPhase::Configuring);
    assert!(background.started().is_empty());
}
