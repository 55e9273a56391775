//! Upgrade Core
//!
//! Orchestration controller for upgrading a legacy single-tenant org into a
//! multi-tenant cloud account.
//!
//! # Components
//!
//! - [`eligibility`]: which known accounts may receive the upgraded org
//! - [`plan`]: default/alternative plans, free tier and pricing
//! - [`archive`]: session and archive readiness for the selected destination
//! - [`aggregator`]: fatal error channels and their normalized display
//! - [`workflow`]: the state machine that owns the phase and the refresh timer
//!
//! The background process (sessions, decryption, billing, remote execution)
//! sits behind the [`BackgroundProcess`] trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use upgrade_core::prelude::*;
//!
//! let mut controller = UpgradeController::new(background, WorkflowConfig::default(), Some(legacy), accounts)?;
//! controller.begin()?;
//! controller.run_until(|c| c.phase() != WorkflowPhase::Preparing).await?;
//! controller.act(UserAction::SetDeviceName("laptop".into())).await?;
//! controller.act(UserAction::Submit).await?;
//! controller.run_until(|c| c.phase().is_terminal()).await?;
//! controller.shutdown().await;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregator;
pub mod archive;
pub mod background;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod plan;
pub mod timer;
pub mod workflow;

// Simulated background process and simulator, also used by the binary
pub mod test_harness;

pub use background::{BackgroundProcess, ErrorPayload, Operation, StatusSnapshot};
pub use config::{ConfigError, WorkflowConfig};
pub use error::{BackgroundError, WorkflowError};

/// Common imports
pub mod prelude {
    pub use crate::aggregator::{ErrorChannel, ErrorDisplay};
    pub use crate::background::{BackgroundProcess, ErrorPayload, StatusSnapshot};
    pub use crate::config::WorkflowConfig;
    pub use crate::eligibility::{EligibilityScan, EligibilityScanner};
    pub use crate::error::{BackgroundError, WorkflowError};
    pub use crate::plan::{BillingDecision, PlanChoice, PlanOptions, Quote};
    pub use crate::workflow::{BillingNotice, UpgradeController, UserAction, WorkflowPhase};
    pub use upgrade_model::{
        AccountId, AppSelection, BillingInterval, KnownAccount, LegacyUpgrade, UpgradeRequest,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
