//! Upgrade Workflow State Machine
//!
//! [`UpgradeController`] owns the workflow phase, the refresh timer and the
//! other components. All state changes go through [`UpgradeController::handle`],
//! which consumes one [`WorkflowEvent`] at a time. Requests to the background
//! process run in spawned tasks that only send events back; they never touch
//! controller state.
//!
//! ```text
//! NotStarted -> Preparing -> Configuring -> Upgrading -> Importing
//!     -> AwaitingRemoteCompletion -> Complete
//! any live phase -> Errored | Canceled
//! ```

mod event;
mod journal;
mod phase;

pub use event::{UserAction, WorkflowEvent};
pub use journal::{JournalEntry, JournalKind, WorkflowJournal};
pub use phase::{allowed_transitions, validate_transition, WorkflowPhase};

use crate::aggregator::{ErrorAggregator, ErrorChannel, ErrorDisplay};
use crate::archive::{ArchiveCoordinator, CoordinatorOutcome, ImportCommand};
use crate::background::{BackgroundProcess, ErrorPayload, StatusSnapshot};
use crate::config::WorkflowConfig;
use crate::eligibility::{EligibilityScan, EligibilityScanner};
use crate::error::{BackgroundError, WorkflowError};
use crate::plan::{
    decide_billing, BillingDecision, Destination, PlanChoice, PlanOptions,
    PlanSelector, PricingPolicy, Quote,
};
use crate::timer::{RefreshTimer, TimerStats};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use upgrade_model::{
    AccountId, AppSelection, AttemptId, BillingCatalog, DestinationAccount, KnownAccount,
    LegacyUpgrade, MigrationArchive, UpgradeRequest,
};

/// Blocking notice shown in the billing step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BillingNotice {
    /// Destination's custom license would be outgrown
    CustomLicenseLimitExceeded { contact: String },
    /// Choosing a plan replaces the destination's current subscription
    ExistingSubscriptionCanceled,
}

/// User-editable fields of the upgrade form
#[derive(Debug, Clone)]
struct UpgradeForm {
    sso_enabled: bool,
    import_local_keys: bool,
    apps: AppSelection,
    device_name: String,
}

/// Top-level controller for one upgrade workflow
pub struct UpgradeController {
    background: Arc<dyn BackgroundProcess>,
    config: WorkflowConfig,
    pricing: PricingPolicy,
    legacy: Option<LegacyUpgrade>,
    known_accounts: Vec<KnownAccount>,

    phase: WorkflowPhase,
    events_tx: UnboundedSender<WorkflowEvent>,
    events_rx: UnboundedReceiver<WorkflowEvent>,
    timer: RefreshTimer,
    feed: Option<JoinHandle<()>>,

    catalog: Option<BillingCatalog>,
    scan: Option<EligibilityScan>,
    coordinator: ArchiveCoordinator,
    errors: ErrorAggregator,
    selector: PlanSelector,
    form: UpgradeForm,
    status: StatusSnapshot,

    attempt: Option<AttemptId>,
    submitted: Option<UpgradeRequest>,
    journal: WorkflowJournal,
    cancel_sent: bool,
    torn_down: bool,
}

impl UpgradeController {
    /// Create a controller
    ///
    /// `legacy` is the payload handed over by the legacy product, `None` when
    /// no upgrade is on offer.
    ///
    /// # Errors
    /// `WorkflowError::Config` when the configuration is invalid.
    pub fn new(
        background: Arc<dyn BackgroundProcess>,
        config: WorkflowConfig,
        legacy: Option<LegacyUpgrade>,
        known_accounts: Vec<KnownAccount>,
    ) -> Result<Self, WorkflowError> {
        config.validate()?;
        let pricing = config.pricing()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            timer: RefreshTimer::new(config.refresh_interval()),
            form: UpgradeForm {
                sso_enabled: false,
                import_local_keys: true,
                apps: AppSelection::All,
                device_name: config.default_device_name.clone().unwrap_or_default(),
            },
            background,
            config,
            pricing,
            legacy,
            known_accounts,
            phase: WorkflowPhase::NotStarted,
            events_tx,
            events_rx,
            feed: None,
            catalog: None,
            scan: None,
            coordinator: ArchiveCoordinator::new(),
            errors: ErrorAggregator::new(),
            selector: PlanSelector::new(),
            status: StatusSnapshot::default(),
            attempt: None,
            submitted: None,
            journal: WorkflowJournal::new(),
            cancel_sent: false,
            torn_down: false,
        })
    }

    /// Sender for feeding events (user actions included) into the controller
    #[inline]
    #[must_use]
    pub fn events(&self) -> UnboundedSender<WorkflowEvent> {
        self.events_tx.clone()
    }

    /// Start preparing: subscribe to status, reset import state, load the
    /// catalog and scan known accounts
    ///
    /// # Errors
    /// `NothingToUpgrade` without a legacy payload; `ActionNotAllowed` when
    /// already begun.
    pub fn begin(&mut self) -> Result<(), WorkflowError> {
        if self.phase != WorkflowPhase::NotStarted {
            return Err(WorkflowError::not_allowed("begin", self.phase));
        }
        if self.legacy.is_none() {
            warn!("No legacy upgrade loaded and no attempt underway");
            return Err(WorkflowError::NothingToUpgrade);
        }

        self.transition(WorkflowPhase::Preparing)?;
        self.spawn_feed();
        self.dispatch(vec![ImportCommand::ResetPreparation(None)]);

        let background = Arc::clone(&self.background);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = background.load_billing_catalog().await;
            let _ = events.send(WorkflowEvent::CatalogLoaded(result));
        });

        let scanner = EligibilityScanner::new(Arc::clone(&self.background));
        let accounts = self.known_accounts.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let scan = scanner.scan(&accounts).await;
            let _ = events.send(WorkflowEvent::ScanCompleted(scan));
        });

        Ok(())
    }

    /// Wait for the next event and apply it
    ///
    /// # Errors
    /// Whatever [`UpgradeController::handle`] returns for the event.
    pub async fn step(&mut self) -> Result<(), WorkflowError> {
        match self.events_rx.recv().await {
            Some(event) => self.handle(event).await,
            None => Ok(()),
        }
    }

    /// Apply events until `done` holds
    ///
    /// Rejected user actions arriving through the queue are logged and
    /// skipped.
    ///
    /// # Errors
    /// Internal failures such as an illegal transition.
    pub async fn run_until(
        &mut self,
        done: impl Fn(&UpgradeController) -> bool,
    ) -> Result<(), WorkflowError> {
        while !done(self) {
            match self.step().await {
                Err(e) if e.is_user_error() => warn!(error = %e, "Queued action rejected"),
                other => other?,
            }
        }
        Ok(())
    }

    /// Apply a user action immediately
    ///
    /// # Errors
    /// The reason the action was rejected; the workflow is left unchanged.
    pub async fn act(&mut self, action: UserAction) -> Result<(), WorkflowError> {
        self.handle(WorkflowEvent::User(action)).await
    }

    /// The transition function
    ///
    /// # Errors
    /// Rejected user actions, or `IllegalTransition`.
    pub async fn handle(&mut self, event: WorkflowEvent) -> Result<(), WorkflowError> {
        if self.phase.is_terminal() && !matches!(event, WorkflowEvent::User(_)) {
            debug!(phase = %self.phase, ?event, "Event after workflow ended, discarding");
            return Ok(());
        }

        let result = self.apply(event).await;
        debug_assert_eq!(
            self.timer.is_active(),
            self.phase.polls_status(),
            "refresh timer out of step with phase {}",
            self.phase
        );
        result
    }

    async fn apply(&mut self, event: WorkflowEvent) -> Result<(), WorkflowError> {
        match event {
            WorkflowEvent::CatalogLoaded(Ok(catalog)) => {
                debug!(products = catalog.products.len(), "Billing catalog loaded");
                self.catalog = Some(catalog);
                self.enter_configuring()
            }
            WorkflowEvent::CatalogLoaded(Err(e)) => self.fail(ErrorChannel::Catalog, e.payload()),
            WorkflowEvent::ScanCompleted(scan) => {
                for failure in &scan.failures {
                    self.journal.record(JournalKind::ScanFailure {
                        account_id: failure.account_id.clone(),
                        error: failure.error.to_string(),
                    });
                }
                self.scan = Some(scan);
                self.enter_configuring()
            }
            WorkflowEvent::SessionLoaded { token, result } => {
                let outcome = self.coordinator.on_session(&token, result);
                self.apply_import_outcome("session", outcome)
            }
            WorkflowEvent::ArchiveDecrypted { token, result } => {
                let outcome = self.coordinator.on_archive(&token, result);
                self.apply_import_outcome("archive", outcome)
            }
            WorkflowEvent::UpgradeStarted { attempt, result } => {
                if self.attempt != Some(attempt) {
                    self.record_stale("upgrade start");
                    return Ok(());
                }
                match result {
                    Ok(()) => {
                        debug!(%attempt, "Remote upgrade accepted");
                        Ok(())
                    }
                    Err(e) => self.fail(ErrorChannel::Upgrade, e.payload()),
                }
            }
            WorkflowEvent::StatusChanged(snapshot) => self.observe_status(snapshot),
            WorkflowEvent::FeedClosed => {
                self.fail(ErrorChannel::Upgrade, BackgroundError::Disconnected.payload())
            }
            WorkflowEvent::Tick => {
                if self.timer.is_active() {
                    self.poll_status();
                }
                Ok(())
            }
            WorkflowEvent::User(action) => self.handle_user(action).await,
        }
    }

    /// Tear down: stop the timer and the status feed, then release the
    /// remote reservation unless the upgrade completed
    ///
    /// Runs at most once; dropping the controller without calling this
    /// performs the same teardown best-effort.
    pub async fn shutdown(mut self) {
        if let Some(cancel) = self.begin_teardown() {
            self.send_signal(cancel).await;
        }
    }

    // ------------------------------------------------------------------
    // Internal transitions
    // ------------------------------------------------------------------

    fn transition(&mut self, to: WorkflowPhase) -> Result<(), WorkflowError> {
        let from = self.phase;
        validate_transition(from, to)?;
        self.phase = to;
        self.journal.record(JournalKind::Transition { from, to });
        info!(%from, %to, "Workflow transition");
        Ok(())
    }

    fn enter_configuring(&mut self) -> Result<(), WorkflowError> {
        if self.phase == WorkflowPhase::Preparing && self.catalog.is_some() && self.scan.is_some()
        {
            self.transition(WorkflowPhase::Configuring)?;
        }
        Ok(())
    }

    fn fail(&mut self, channel: ErrorChannel, payload: ErrorPayload) -> Result<(), WorkflowError> {
        error!(?channel, error = %payload, "Upgrade channel failed");
        self.errors.record(channel, payload);
        self.halt_errored()
    }

    /// Stop everything in progress and enter `Errored`
    fn halt_errored(&mut self) -> Result<(), WorkflowError> {
        if self.phase.is_terminal() {
            return Ok(());
        }
        self.timer.stop();
        self.attempt = None;
        self.coordinator.halt();
        self.scan = None;
        self.transition(WorkflowPhase::Errored)
    }

    fn record_stale(&mut self, what: &'static str) {
        debug!(what, "Discarding stale response");
        self.journal.record(JournalKind::StaleResponse { what });
    }

    fn apply_import_outcome(
        &mut self,
        what: &'static str,
        outcome: CoordinatorOutcome,
    ) -> Result<(), WorkflowError> {
        match outcome {
            CoordinatorOutcome::Applied(commands) => {
                self.dispatch(commands);
                if self.coordinator.archive().is_some() {
                    self.retain_known_apps();
                }
                self.refresh_plans();
                Ok(())
            }
            CoordinatorOutcome::Stale => {
                self.record_stale(what);
                Ok(())
            }
            CoordinatorOutcome::Failed(e) => self.fail(ErrorChannel::Import, e.payload()),
        }
    }

    fn observe_status(&mut self, snapshot: StatusSnapshot) -> Result<(), WorkflowError> {
        let fired = self.errors.observe(&snapshot);
        self.status = snapshot;

        for channel in &fired {
            if let Some(payload) = self.errors.get(*channel) {
                error!(?channel, error = %payload, "Background reported failure");
            }
        }
        if self.errors.is_fatal() {
            return self.halt_errored();
        }

        let status = &self.status;
        let import_seen = status.import_in_progress || status.upgrade_finished;
        let import_done = status.upgrade_finished && !status.import_in_progress;
        let released = status.legacy_released;

        if self.phase == WorkflowPhase::Upgrading && import_seen {
            self.transition(WorkflowPhase::Importing)?;
            self.timer.start(self.events_tx.clone());
        }
        if self.phase == WorkflowPhase::Importing && import_done {
            self.transition(WorkflowPhase::AwaitingRemoteCompletion)?;
        }
        if self.phase == WorkflowPhase::AwaitingRemoteCompletion && released {
            self.timer.stop();
            self.attempt = None;
            self.transition(WorkflowPhase::Complete)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------

    async fn handle_user(&mut self, action: UserAction) -> Result<(), WorkflowError> {
        debug!(action = action.name(), phase = %self.phase, "User action");

        match action {
            UserAction::Cancel => return self.cancel().await,
            UserAction::ReturnHome => return self.return_home().await,
            _ => {}
        }
        if self.phase != WorkflowPhase::Configuring {
            return Err(WorkflowError::not_allowed(action.name(), self.phase));
        }

        match action {
            UserAction::SelectAccount(account) => self.select_account(account),
            UserAction::SetSso(enabled) => {
                self.form.sso_enabled = enabled;
                self.refresh_plans();
                Ok(())
            }
            UserAction::SetImportLocalKeys(import) => {
                self.form.import_local_keys = import;
                Ok(())
            }
            UserAction::SelectApps(selection) => self.select_apps(selection),
            UserAction::ChoosePlan(choice) => self.choose_plan(choice),
            UserAction::SetBillingInterval(interval) => {
                self.selector.set_interval(interval);
                self.refresh_plans();
                Ok(())
            }
            UserAction::SetDeviceName(name) => {
                self.form.device_name = name;
                Ok(())
            }
            UserAction::Submit => self.submit(),
            UserAction::Cancel | UserAction::ReturnHome => Ok(()),
        }
    }

    fn select_account(&mut self, account: Option<AccountId>) -> Result<(), WorkflowError> {
        if let Some(id) = &account {
            let eligible = self.scan.as_ref().is_some_and(|s| s.is_eligible(id));
            if !eligible {
                return Err(WorkflowError::IneligibleAccount(id.clone()));
            }
        }

        let commands = self.coordinator.select(account);
        self.dispatch(commands);
        self.form.apps = AppSelection::All;
        self.refresh_plans();
        Ok(())
    }

    fn select_apps(&mut self, selection: AppSelection) -> Result<(), WorkflowError> {
        if let AppSelection::Chosen(ids) = &selection {
            let archive = self.coordinator.archive().ok_or(WorkflowError::ArchiveNotReady)?;
            if let Some(unknown) = ids.iter().find(|id| !archive.contains_app(id)) {
                return Err(WorkflowError::UnknownApp(unknown.clone()));
            }
        }
        self.form.apps = selection;
        Ok(())
    }

    fn choose_plan(&mut self, choice: PlanChoice) -> Result<(), WorkflowError> {
        if !self.billing_decision().shows_plans() {
            return Err(WorkflowError::BillingNotSelectable);
        }
        let options = self.plan_options().ok_or(WorkflowError::BillingNotSelectable)?;
        self.selector.choose(choice, &options)
    }

    fn submit(&mut self) -> Result<(), WorkflowError> {
        if self.attempt.is_some() {
            return Err(WorkflowError::AttemptInFlight);
        }
        if self.coordinator.selected().is_some() && self.coordinator.archive().is_none() {
            return Err(WorkflowError::ArchiveNotReady);
        }
        match self.billing_decision() {
            BillingDecision::CustomLicenseLimitExceeded => {
                return Err(WorkflowError::CustomLicenseLimitExceeded)
            }
            BillingDecision::Pending => return Err(WorkflowError::ArchiveNotReady),
            BillingDecision::SelectPlan { .. } if self.selected_plan().is_none() => {
                return Err(WorkflowError::BillingNotSelectable)
            }
            _ => {}
        }

        let request = self.compose_request()?;
        let attempt = request.attempt_id();
        self.transition(WorkflowPhase::Upgrading)?;
        self.attempt = Some(attempt);
        self.submitted = Some(request.clone());
        info!(%attempt, account = ?request.account_id(), free_tier = request.free_tier(), "Submitting upgrade");

        let background = Arc::clone(&self.background);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = background.start_upgrade(&request).await;
            let _ = events.send(WorkflowEvent::UpgradeStarted { attempt, result });
        });
        Ok(())
    }

    /// Build the request from the form, the selection and the billing step
    fn compose_request(&self) -> Result<UpgradeRequest, WorkflowError> {
        let num_users = self.projected_users();
        let sso = self.form.sso_enabled;
        let account = self.coordinator.selected().cloned();

        let mut builder = UpgradeRequest::builder()
            .sso(sso)
            .import_local_keys(self.form.import_local_keys);

        builder = match &account {
            Some(id) => {
                let offers_apps = self
                    .coordinator
                    .archive()
                    .is_some_and(MigrationArchive::offers_app_selection);
                let apps = if offers_apps {
                    self.form.apps.clone()
                } else {
                    AppSelection::All
                };
                builder.account(id.clone()).apps(apps)
            }
            None => builder.device_name(self.form.device_name.clone()),
        };

        let options = self.plan_options();
        builder = match self.billing_decision() {
            BillingDecision::SelectPlan { .. } => {
                match options.as_ref().and_then(|o| self.selector.selected(o)) {
                    Some(PlanChoice::FreeTier) => builder.free_tier(true),
                    Some(PlanChoice::Product(id)) => builder.product(id, self.selector.interval()),
                    None => builder,
                }
            }
            BillingDecision::Skip(_) if account.is_some() => {
                builder.free_tier(self.pricing.free_tier_eligible(num_users, sso))
            }
            BillingDecision::Skip(_) => match options.as_ref() {
                Some(PlanOptions {
                    default: Some(plan),
                    interval,
                    ..
                }) => builder.product(plan.product.id.clone(), *interval),
                Some(o) if o.free_tier => builder.free_tier(true),
                _ => builder,
            },
            BillingDecision::Pending | BillingDecision::CustomLicenseLimitExceeded => builder,
        };

        Ok(builder.build()?)
    }

    async fn cancel(&mut self) -> Result<(), WorkflowError> {
        match self.phase {
            WorkflowPhase::Complete => Err(WorkflowError::CancelUnavailable),
            WorkflowPhase::Canceled => Ok(()),
            WorkflowPhase::Errored => self.return_home().await,
            _ => {
                self.timer.stop();
                self.attempt = None;
                self.coordinator.halt();
                self.transition(WorkflowPhase::Canceled)?;
                self.cancel_sent = true;
                self.send_signal(true).await;
                Ok(())
            }
        }
    }

    async fn return_home(&mut self) -> Result<(), WorkflowError> {
        match self.phase {
            WorkflowPhase::Errored => {
                if !self.cancel_sent {
                    self.cancel_sent = true;
                    self.send_signal(true).await;
                }
                Ok(())
            }
            WorkflowPhase::Complete | WorkflowPhase::Canceled => Ok(()),
            phase => Err(WorkflowError::not_allowed("return home", phase)),
        }
    }

    // ------------------------------------------------------------------
    // Background requests
    // ------------------------------------------------------------------

    /// Run import commands in order in one task
    fn dispatch(&self, commands: Vec<ImportCommand>) {
        if commands.is_empty() {
            return;
        }
        let background = Arc::clone(&self.background);
        let events = self.events_tx.clone();
        let legacy = self.legacy.clone();

        tokio::spawn(async move {
            for command in commands {
                match command {
                    ImportCommand::ResetPreparation(account) => {
                        if let Err(e) = background.reset_import_preparation(account).await {
                            warn!(error = %e, "Import preparation reset failed");
                        }
                    }
                    ImportCommand::FetchSession(token) => {
                        let result = background.fetch_session(token.account()).await;
                        let _ = events.send(WorkflowEvent::SessionLoaded { token, result });
                    }
                    ImportCommand::Decrypt(token) => {
                        let Some(payload) = &legacy else {
                            break;
                        };
                        let result = background
                            .decrypt_migration_archive(token.account(), payload, true)
                            .await;
                        let _ = events.send(WorkflowEvent::ArchiveDecrypted { token, result });
                    }
                }
            }
        });
    }

    fn spawn_feed(&mut self) {
        let mut feed = self.background.subscribe();
        let events = self.events_tx.clone();
        self.feed = Some(tokio::spawn(async move {
            while feed.changed().await.is_ok() {
                let snapshot = feed.borrow_and_update().clone();
                if events.send(WorkflowEvent::StatusChanged(snapshot)).is_err() {
                    return;
                }
            }
            warn!("Status feed closed");
            let _ = events.send(WorkflowEvent::FeedClosed);
        }));
    }

    fn poll_status(&self) {
        let background = Arc::clone(&self.background);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            match background.snapshot().await {
                Ok(snapshot) => {
                    let _ = events.send(WorkflowEvent::StatusChanged(snapshot));
                }
                Err(e) => warn!(error = %e, "Status refresh failed"),
            }
        });
    }

    async fn send_signal(&mut self, cancel: bool) {
        self.journal.record(JournalKind::Signal { cancel });
        if let Err(e) = self.background.cancel_or_reset_upgrade(cancel).await {
            warn!(error = %e, cancel, "Cancel/reset signal failed");
        }
    }

    /// Stop local resources once; returns the signal still owed to the
    /// remote side
    fn begin_teardown(&mut self) -> Option<bool> {
        if self.torn_down {
            return None;
        }
        self.torn_down = true;
        self.timer.stop();
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }

        match self.phase {
            WorkflowPhase::NotStarted => None,
            WorkflowPhase::Complete => Some(false),
            _ if self.cancel_sent => None,
            _ => {
                self.cancel_sent = true;
                Some(true)
            }
        }
    }

    fn refresh_plans(&mut self) {
        let Some(options) = self.plan_options() else {
            return;
        };
        if self.selector.revalidate(&options) {
            info!(num_users = options.num_users, sso = options.sso_required, "Plan override no longer offered, using default");
            self.journal.record(JournalKind::PlanReverted);
        }
    }

    /// Keep only chosen apps that exist in the freshly decrypted archive
    fn retain_known_apps(&mut self) {
        let Some(archive) = self.coordinator.archive() else {
            return;
        };
        if let AppSelection::Chosen(ids) = &self.form.apps {
            if ids.iter().any(|id| !archive.contains_app(id)) {
                self.form.apps = AppSelection::All;
            }
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Eligible destinations; empty until the scan finishes or after a failure
    #[must_use]
    pub fn eligible_accounts(&self) -> &[DestinationAccount] {
        self.scan.as_ref().map_or(&[], |s| s.eligible.as_slice())
    }

    #[inline]
    #[must_use]
    pub fn catalog(&self) -> Option<&BillingCatalog> {
        self.catalog.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn selected_account(&self) -> Option<&AccountId> {
        self.coordinator.selected()
    }

    #[inline]
    #[must_use]
    pub fn archive(&self) -> Option<&MigrationArchive> {
        self.coordinator.archive()
    }

    /// Whether to ask which apps to bring over
    #[must_use]
    pub fn offers_app_selection(&self) -> bool {
        self.coordinator
            .archive()
            .is_some_and(MigrationArchive::offers_app_selection)
    }

    /// Users the upgraded org will have
    ///
    /// With a destination selected and its archive ready: archive users plus
    /// the destination's active users and invites. Otherwise the legacy count.
    #[must_use]
    pub fn projected_users(&self) -> u32 {
        match (self.coordinator.archive(), self.coordinator.session()) {
            (Some(archive), Some(session)) => archive
                .user_count()
                .saturating_add(session.org.active_user_or_invite_count),
            _ => self.legacy.as_ref().map_or(0, |l| l.num_users),
        }
    }

    #[must_use]
    pub fn billing_decision(&self) -> BillingDecision {
        let preset = self.legacy.as_ref().is_some_and(|l| l.signed_preset_billing)
            || self.coordinator.archive().is_some_and(|a| a.signed_preset_billing);

        let destination = match (
            self.coordinator.selected(),
            self.coordinator.archive(),
            self.coordinator.session(),
        ) {
            (None, _, _) => Destination::New,
            (Some(_), Some(_), Some(session)) => Destination::Loaded(session),
            (Some(_), _, _) => Destination::Loading,
        };

        decide_billing(
            preset,
            destination,
            self.projected_users(),
            self.form.sso_enabled,
        )
    }

    /// Plans for the current user count, SSO choice and interval
    #[must_use]
    pub fn plan_options(&self) -> Option<PlanOptions> {
        let catalog = self.catalog.as_ref()?;
        Some(PlanOptions::compute(
            catalog,
            &self.pricing,
            self.projected_users(),
            self.form.sso_enabled,
            self.selector.interval(),
        ))
    }

    /// Price of the plan in effect, when plans are shown
    #[must_use]
    pub fn quote(&self) -> Option<Quote> {
        if !self.billing_decision().shows_plans() {
            return None;
        }
        self.selector.quote(&self.plan_options()?)
    }

    #[must_use]
    pub fn selected_plan(&self) -> Option<PlanChoice> {
        self.selector.selected(&self.plan_options()?)
    }

    #[must_use]
    pub fn notice(&self) -> Option<BillingNotice> {
        match self.billing_decision() {
            BillingDecision::CustomLicenseLimitExceeded => {
                Some(BillingNotice::CustomLicenseLimitExceeded {
                    contact: self.config.sales_contact.clone(),
                })
            }
            BillingDecision::SelectPlan {
                cancels_existing_subscription: true,
            } => Some(BillingNotice::ExistingSubscriptionCanceled),
            _ => None,
        }
    }

    /// Progress line for busy phases and archive loading
    #[must_use]
    pub fn status_line(&self) -> Option<String> {
        if self.phase.is_busy() && self.status.registering {
            return Some("Creating organization".to_string());
        }
        if self.coordinator.is_loading() {
            return Some("Loading upgrade archive".to_string());
        }
        if !self.phase.is_busy() {
            return None;
        }
        if self.phase == WorkflowPhase::AwaitingRemoteCompletion {
            return Some("Waiting for remote finalization".to_string());
        }
        if let Some(text) = self.status.import_status.as_deref().filter(|t| !t.is_empty()) {
            return Some(text.to_string());
        }
        let line = match self.phase {
            WorkflowPhase::Importing => "Starting import",
            WorkflowPhase::Upgrading => "Finishing upgrade",
            _ => "Preparing upgrade",
        };
        Some(line.to_string())
    }

    /// Fatal error to show, if any
    #[must_use]
    pub fn error_display(&self) -> Option<ErrorDisplay> {
        self.errors.display(&self.config)
    }

    #[inline]
    #[must_use]
    pub fn errors(&self) -> &ErrorAggregator {
        &self.errors
    }

    /// The request submitted for this workflow
    #[inline]
    #[must_use]
    pub fn request(&self) -> Option<&UpgradeRequest> {
        self.submitted.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn timer_active(&self) -> bool {
        self.timer.is_active()
    }

    #[inline]
    #[must_use]
    pub fn timer_stats(&self) -> TimerStats {
        self.timer.stats()
    }

    #[inline]
    #[must_use]
    pub fn journal(&self) -> &WorkflowJournal {
        &self.journal
    }

    /// Account to continue with after completion
    ///
    /// The destination the org was upgraded into, otherwise the most recently
    /// authenticated of `accounts` (the caller's refreshed list, which
    /// includes the newly created account).
    #[must_use]
    pub fn completion_target(&self, accounts: &[KnownAccount]) -> Option<AccountId> {
        if self.phase != WorkflowPhase::Complete {
            return None;
        }
        self.submitted
            .as_ref()
            .and_then(|r| r.account_id().cloned())
            .or_else(|| KnownAccount::most_recent(accounts).map(|a| a.account_id.clone()))
    }
}

impl Drop for UpgradeController {
    fn drop(&mut self) {
        let Some(cancel) = self.begin_teardown() else {
            return;
        };
        self.journal.record(JournalKind::Signal { cancel });
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let background = Arc::clone(&self.background);
                runtime.spawn(async move {
                    if let Err(e) = background.cancel_or_reset_upgrade(cancel).await {
                        warn!(error = %e, cancel, "Teardown signal failed");
                    }
                });
            }
            Err(_) => warn!(cancel, "No runtime at teardown, signal not sent"),
        }
    }
}

impl std::fmt::Debug for UpgradeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeController")
            .field("phase", &self.phase)
            .field("selected", &self.coordinator.selected())
            .field("attempt", &self.attempt)
            .field("timer_active", &self.timer.is_active())
            .finish_non_exhaustive()
    }
}
