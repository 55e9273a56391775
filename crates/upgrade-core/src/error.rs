//! Error types for the upgrade controller
//!
//! Provides error handling for:
//! - Failures reported by the background process
//! - User actions the current phase does not allow
//! - Submission preconditions and invalid requests
//! - Configuration loading

use crate::background::{ErrorPayload, Operation};
use crate::config::ConfigError;
use crate::workflow::WorkflowPhase;
use upgrade_model::{AccountId, AppId, ProductId, RequestError};

/// Failure reported by (or while talking to) the background process
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackgroundError {
    /// A request completed with an error payload
    #[error("{operation} failed: {payload}")]
    Request {
        /// Request that failed
        operation: Operation,
        /// Structured error returned by the background process
        payload: ErrorPayload,
    },

    /// Background process did not answer
    #[error("background process unavailable")]
    Unavailable,

    /// Status feed closed while the workflow was still observing it
    #[error("background status feed disconnected")]
    Disconnected,
}

impl BackgroundError {
    /// Create a request failure with a message
    #[inline]
    pub fn request(operation: Operation, message: impl Into<String>) -> Self {
        Self::Request {
            operation,
            payload: ErrorPayload::message(message),
        }
    }

    /// Structured payload for error display
    #[must_use]
    pub fn payload(&self) -> ErrorPayload {
        match self {
            Self::Request { payload, .. } => payload.clone(),
            Self::Unavailable | Self::Disconnected => ErrorPayload::unknown(),
        }
    }
}

/// Main controller error type
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// No legacy upgrade is loaded and none was started
    #[error("no legacy upgrade is available")]
    NothingToUpgrade,

    /// Transition not in the phase table
    #[error("illegal transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: WorkflowPhase,
        to: WorkflowPhase,
    },

    /// User action not available in the current phase
    #[error("{action} is not available while {phase:?}")]
    ActionNotAllowed {
        action: &'static str,
        phase: WorkflowPhase,
    },

    /// Account is not among the eligible destinations
    #[error("account {0} is not an eligible destination")]
    IneligibleAccount(AccountId),

    /// Selected destination's archive has not been produced yet
    #[error("migration archive for the selected account is not ready")]
    ArchiveNotReady,

    /// Product is not one of the offered plans
    #[error("product {0} is not offered for this upgrade")]
    PlanNotOffered(ProductId),

    /// Free tier is not offered for this upgrade
    #[error("the free tier is not offered for this upgrade")]
    FreeTierNotOffered,

    /// Plan selection is not shown for this upgrade
    #[error("billing is not selectable for this upgrade")]
    BillingNotSelectable,

    /// App is not in the archive
    #[error("app {0} is not part of the archive")]
    UnknownApp(AppId),

    /// Destination is on a custom license whose limit the upgrade would exceed
    #[error("the destination's custom license would be exceeded")]
    CustomLicenseLimitExceeded,

    /// Upgrade already finished
    #[error("cancellation is unavailable once the upgrade is complete")]
    CancelUnavailable,

    /// An upgrade request is already in flight
    #[error("an upgrade request is already in flight")]
    AttemptInFlight,

    /// Request builder rejected the field combination
    #[error("invalid upgrade request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// Background process failure
    #[error("background error: {0}")]
    Background(#[from] BackgroundError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WorkflowError {
    /// Rejected user input that leaves the workflow unchanged
    #[inline]
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::ActionNotAllowed { .. }
                | Self::IneligibleAccount(_)
                | Self::ArchiveNotReady
                | Self::PlanNotOffered(_)
                | Self::FreeTierNotOffered
                | Self::BillingNotSelectable
                | Self::UnknownApp(_)
                | Self::CustomLicenseLimitExceeded
                | Self::CancelUnavailable
                | Self::AttemptInFlight
                | Self::InvalidRequest(_)
        )
    }

    /// Shorthand for [`WorkflowError::ActionNotAllowed`]
    #[inline]
    pub(crate) fn not_allowed(action: &'static str, phase: WorkflowPhase) -> Self {
        Self::ActionNotAllowed { action, phase }
    }
}
