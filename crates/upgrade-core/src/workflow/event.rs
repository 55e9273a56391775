//! Typed inputs to the workflow's transition function

use crate::archive::SelectionToken;
use crate::background::StatusSnapshot;
use crate::eligibility::EligibilityScan;
use crate::error::BackgroundError;
use crate::plan::PlanChoice;
use upgrade_model::{
    AccountId, AppSelection, AttemptId, BillingCatalog, BillingInterval, MigrationArchive,
    SessionGraph,
};

/// Everything the controller reacts to
#[derive(Debug)]
pub enum WorkflowEvent {
    CatalogLoaded(Result<BillingCatalog, BackgroundError>),
    ScanCompleted(EligibilityScan),
    SessionLoaded {
        token: SelectionToken,
        result: Result<SessionGraph, BackgroundError>,
    },
    ArchiveDecrypted {
        token: SelectionToken,
        result: Result<MigrationArchive, BackgroundError>,
    },
    /// Answer to the start request itself; progress arrives as status
    UpgradeStarted {
        attempt: AttemptId,
        result: Result<(), BackgroundError>,
    },
    StatusChanged(StatusSnapshot),
    /// Status feed ended while still subscribed
    FeedClosed,
    /// Refresh timer fired
    Tick,
    User(UserAction),
}

/// Input from the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Upgrade into an existing account, or `None` to create one
    SelectAccount(Option<AccountId>),
    SetSso(bool),
    SetImportLocalKeys(bool),
    SelectApps(AppSelection),
    ChoosePlan(PlanChoice),
    SetBillingInterval(BillingInterval),
    SetDeviceName(String),
    Submit,
    Cancel,
    /// Leave a finished or failed workflow
    ReturnHome,
}

impl UserAction {
    /// Name used in log lines and errors
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            UserAction::SelectAccount(_) => "select account",
            UserAction::SetSso(_) => "set sso",
            UserAction::SetImportLocalKeys(_) => "set local key import",
            UserAction::SelectApps(_) => "select apps",
            UserAction::ChoosePlan(_) => "choose plan",
            UserAction::SetBillingInterval(_) => "set billing interval",
            UserAction::SetDeviceName(_) => "set device name",
            UserAction::Submit => "submit",
            UserAction::Cancel => "cancel",
            UserAction::ReturnHome => "return home",
        }
    }
}
