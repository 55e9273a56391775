//! Scriptable in-memory background process

use crate::aggregator::ErrorChannel;
use crate::background::{BackgroundProcess, ErrorPayload, Operation, StatusSnapshot};
use crate::error::BackgroundError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;
use upgrade_model::{
    AccountId, ArchiveUser, BillingCatalog, LegacyUpgrade, MigrationArchive, SessionGraph,
    UpgradeRequest,
};

/// One step of the remote upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStage {
    Registering,
    ImportStarted,
    ImportStatus(String),
    UpgradeFinished,
    ImportFinished,
    LegacyReleased,
    Fail(ErrorChannel, ErrorPayload),
}

impl RemoteStage {
    fn apply(&self, status: &mut StatusSnapshot) {
        match self {
            RemoteStage::Registering => {
                status.upgrade_in_progress = true;
                status.registering = true;
            }
            RemoteStage::ImportStarted => {
                status.registering = false;
                status.import_in_progress = true;
            }
            RemoteStage::ImportStatus(text) => status.import_status = Some(text.clone()),
            RemoteStage::UpgradeFinished => {
                status.upgrade_in_progress = false;
                status.upgrade_finished = true;
            }
            RemoteStage::ImportFinished => {
                status.import_in_progress = false;
                status.import_status = None;
            }
            RemoteStage::LegacyReleased => status.legacy_released = true,
            RemoteStage::Fail(channel, payload) => {
                let slot = match channel {
                    ErrorChannel::Catalog => &mut status.catalog_error,
                    ErrorChannel::Import => &mut status.import_error,
                    ErrorChannel::Upgrade => &mut status.upgrade_error,
                };
                *slot = Some(payload.clone());
            }
        }
    }
}

/// Remote progression started by `start_upgrade`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScript {
    /// Delay before each stage
    pub step_delay: Duration,
    pub stages: Vec<RemoteStage>,
}

impl RemoteScript {
    /// Registration, import, upgrade finish, release
    #[must_use]
    pub fn happy_path(step_delay: Duration) -> Self {
        Self {
            step_delay,
            stages: vec![
                RemoteStage::Registering,
                RemoteStage::ImportStarted,
                RemoteStage::ImportStatus("Importing apps".into()),
                RemoteStage::UpgradeFinished,
                RemoteStage::ImportStatus("Importing users".into()),
                RemoteStage::ImportFinished,
                RemoteStage::LegacyReleased,
            ],
        }
    }

    /// Import starts, then the remote upgrade fails
    #[must_use]
    pub fn failing(step_delay: Duration, payload: ErrorPayload) -> Self {
        Self {
            step_delay,
            stages: vec![
                RemoteStage::Registering,
                RemoteStage::ImportStarted,
                RemoteStage::Fail(ErrorChannel::Upgrade, payload),
            ],
        }
    }

    /// Starts and never finishes
    #[must_use]
    pub fn stalled(step_delay: Duration) -> Self {
        Self {
            step_delay,
            stages: vec![RemoteStage::Registering, RemoteStage::ImportStarted],
        }
    }
}

impl Default for RemoteScript {
    fn default() -> Self {
        Self::happy_path(Duration::from_millis(10))
    }
}

/// Request received by the simulated process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundCall {
    ResetImportPreparation(Option<AccountId>),
    FetchSession(AccountId),
    LoadBillingCatalog,
    DecryptMigrationArchive(AccountId),
    StartUpgrade(Box<UpgradeRequest>),
    CancelOrResetUpgrade(bool),
    Snapshot,
}

/// In-memory [`BackgroundProcess`]
pub struct SimulatedBackground {
    catalog: Result<BillingCatalog, BackgroundError>,
    catalog_delay: Duration,
    sessions: HashMap<AccountId, SessionGraph>,
    cached: HashSet<AccountId>,
    session_failures: HashMap<AccountId, BackgroundError>,
    session_delays: HashMap<AccountId, Duration>,
    archives: HashMap<AccountId, MigrationArchive>,
    decrypt_failure: Option<BackgroundError>,
    start_failure: Option<BackgroundError>,
    script: RemoteScript,
    status: Arc<watch::Sender<StatusSnapshot>>,
    remote: Mutex<Option<JoinHandle<()>>>,
    calls: Mutex<Vec<BackgroundCall>>,
}

impl SimulatedBackground {
    #[must_use]
    pub fn builder() -> SimulatedBackgroundBuilder {
        SimulatedBackgroundBuilder::default()
    }

    fn record(&self, call: BackgroundCall) {
        self.calls.lock().push(call);
    }

    /// Every request received, in order
    #[must_use]
    pub fn calls(&self) -> Vec<BackgroundCall> {
        self.calls.lock().clone()
    }

    /// Number of `CancelOrResetUpgrade` calls with the given flag
    #[must_use]
    pub fn signal_count(&self, cancel: bool) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| **c == BackgroundCall::CancelOrResetUpgrade(cancel))
            .count()
    }

    #[inline]
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.signal_count(true)
    }

    /// Requests passed to `start_upgrade`
    #[must_use]
    pub fn started(&self) -> Vec<UpgradeRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                BackgroundCall::StartUpgrade(request) => Some((**request).clone()),
                _ => None,
            })
            .collect()
    }

    /// Push a status change, as the remote side would
    pub fn push_status(&self, update: impl FnOnce(&mut StatusSnapshot)) {
        self.status.send_modify(update);
    }

    fn default_archive(account: &AccountId, payload: &LegacyUpgrade) -> MigrationArchive {
        MigrationArchive {
            account_id: account.clone(),
            org_users: (0..payload.num_users)
                .map(|i| ArchiveUser {
                    email: format!("user{i}@example.com"),
                })
                .collect(),
            apps: Vec::new(),
            signed_preset_billing: payload.signed_preset_billing,
        }
    }
}

async fn delay(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl BackgroundProcess for SimulatedBackground {
    async fn reset_import_preparation(
        &self,
        account: Option<AccountId>,
    ) -> Result<(), BackgroundError> {
        self.record(BackgroundCall::ResetImportPreparation(account));
        Ok(())
    }

    async fn cached_session(&self, account: &AccountId) -> Option<SessionGraph> {
        if self.cached.contains(account) {
            self.sessions.get(account).cloned()
        } else {
            None
        }
    }

    async fn fetch_session(&self, account: &AccountId) -> Result<SessionGraph, BackgroundError> {
        self.record(BackgroundCall::FetchSession(account.clone()));
        delay(self.session_delays.get(account).copied().unwrap_or_default()).await;

        if let Some(error) = self.session_failures.get(account) {
            return Err(error.clone());
        }
        self.sessions.get(account).cloned().ok_or_else(|| {
            BackgroundError::request(Operation::FetchSession, "v1 upgrade - account not found")
        })
    }

    async fn load_billing_catalog(&self) -> Result<BillingCatalog, BackgroundError> {
        self.record(BackgroundCall::LoadBillingCatalog);
        delay(self.catalog_delay).await;
        self.catalog.clone()
    }

    async fn decrypt_migration_archive(
        &self,
        account: &AccountId,
        payload: &LegacyUpgrade,
        _is_legacy_upgrade: bool,
    ) -> Result<MigrationArchive, BackgroundError> {
        self.record(BackgroundCall::DecryptMigrationArchive(account.clone()));
        if let Some(error) = &self.decrypt_failure {
            return Err(error.clone());
        }
        Ok(self
            .archives
            .get(account)
            .cloned()
            .unwrap_or_else(|| Self::default_archive(account, payload)))
    }

    async fn start_upgrade(&self, request: &UpgradeRequest) -> Result<(), BackgroundError> {
        self.record(BackgroundCall::StartUpgrade(Box::new(request.clone())));
        if let Some(error) = &self.start_failure {
            return Err(error.clone());
        }

        let script = self.script.clone();
        let status = Arc::clone(&self.status);
        let handle = tokio::spawn(async move {
            for stage in script.stages {
                delay(script.step_delay).await;
                debug!(?stage, "Remote stage");
                status.send_modify(|s| stage.apply(s));
            }
        });
        if let Some(previous) = self.remote.lock().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    async fn cancel_or_reset_upgrade(&self, cancel: bool) -> Result<(), BackgroundError> {
        self.record(BackgroundCall::CancelOrResetUpgrade(cancel));
        if let Some(remote) = self.remote.lock().take() {
            remote.abort();
        }
        self.status.send_replace(StatusSnapshot::default());
        Ok(())
    }

    async fn snapshot(&self) -> Result<StatusSnapshot, BackgroundError> {
        self.record(BackgroundCall::Snapshot);
        Ok(self.status.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }
}

/// Builder for [`SimulatedBackground`]
#[derive(Default)]
pub struct SimulatedBackgroundBuilder {
    catalog: Option<Result<BillingCatalog, BackgroundError>>,
    catalog_delay: Duration,
    sessions: HashMap<AccountId, SessionGraph>,
    cached: HashSet<AccountId>,
    session_failures: HashMap<AccountId, BackgroundError>,
    session_delays: HashMap<AccountId, Duration>,
    archives: HashMap<AccountId, MigrationArchive>,
    decrypt_failure: Option<BackgroundError>,
    start_failure: Option<BackgroundError>,
    script: RemoteScript,
}

impl SimulatedBackgroundBuilder {
    #[must_use]
    pub fn catalog(mut self, catalog: BillingCatalog) -> Self {
        self.catalog = Some(Ok(catalog));
        self
    }

    #[must_use]
    pub fn catalog_failure(mut self, message: &str) -> Self {
        self.catalog = Some(Err(BackgroundError::request(
            Operation::LoadBillingCatalog,
            message,
        )));
        self
    }

    #[must_use]
    pub fn catalog_delay(mut self, delay: Duration) -> Self {
        self.catalog_delay = delay;
        self
    }

    /// Session returned by `fetch_session`
    #[must_use]
    pub fn session(mut self, session: SessionGraph) -> Self {
        self.sessions.insert(session.account_id.clone(), session);
        self
    }

    /// Session already held, returned by `cached_session`
    #[must_use]
    pub fn cached_session(mut self, session: SessionGraph) -> Self {
        self.cached.insert(session.account_id.clone());
        self.session(session)
    }

    #[must_use]
    pub fn session_failure(mut self, account: &str, message: &str) -> Self {
        self.session_failures.insert(
            AccountId::new(account),
            BackgroundError::request(Operation::FetchSession, message),
        );
        self
    }

    #[must_use]
    pub fn session_delay(mut self, account: &str, delay: Duration) -> Self {
        self.session_delays.insert(AccountId::new(account), delay);
        self
    }

    #[must_use]
    pub fn archive(mut self, archive: MigrationArchive) -> Self {
        self.archives.insert(archive.account_id.clone(), archive);
        self
    }

    #[must_use]
    pub fn decrypt_failure(mut self, message: &str) -> Self {
        self.decrypt_failure = Some(BackgroundError::request(
            Operation::DecryptMigrationArchive,
            message,
        ));
        self
    }

    #[must_use]
    pub fn start_failure(mut self, message: &str) -> Self {
        self.start_failure = Some(BackgroundError::request(Operation::StartUpgrade, message));
        self
    }

    #[must_use]
    pub fn script(mut self, script: RemoteScript) -> Self {
        self.script = script;
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<SimulatedBackground> {
        let (status, _) = watch::channel(StatusSnapshot::default());
        Arc::new(SimulatedBackground {
            catalog: self.catalog.unwrap_or_else(|| Ok(super::sample_catalog())),
            catalog_delay: self.catalog_delay,
            sessions: self.sessions,
            cached: self.cached,
            session_failures: self.session_failures,
            session_delays: self.session_delays,
            archives: self.archives,
            decrypt_failure: self.decrypt_failure,
            start_failure: self.start_failure,
            script: self.script,
            status: Arc::new(status),
            remote: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }
}
