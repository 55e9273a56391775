//! Error Aggregator
//!
//! Three independent channels can fail the workflow: catalog loading, archive
//! import and the remote upgrade. Any of them is fatal. Only the first
//! payload per channel is kept; display priority is catalog, then remote
//! upgrade, then import.

use crate::background::{ErrorPayload, StatusSnapshot};
use crate::config::WorkflowConfig;
use serde::Serialize;

/// Source of a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorChannel {
    Catalog,
    Import,
    Upgrade,
}

impl ErrorChannel {
    /// Channels from highest to lowest display priority
    pub const BY_PRIORITY: [ErrorChannel; 3] =
        [ErrorChannel::Catalog, ErrorChannel::Upgrade, ErrorChannel::Import];
}

/// User-facing error: one sentence (when known) and a contact line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDisplay {
    pub message: Option<String>,
    pub contact: String,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorAggregator {
    catalog: Option<ErrorPayload>,
    import: Option<ErrorPayload>,
    upgrade: Option<ErrorPayload>,
}

impl ErrorAggregator {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, channel: ErrorChannel) -> &mut Option<ErrorPayload> {
        match channel {
            ErrorChannel::Catalog => &mut self.catalog,
            ErrorChannel::Import => &mut self.import,
            ErrorChannel::Upgrade => &mut self.upgrade,
        }
    }

    /// Record a failure; returns `true` if the channel had not fired before
    pub fn record(&mut self, channel: ErrorChannel, payload: ErrorPayload) -> bool {
        let slot = self.slot(channel);
        if slot.is_some() {
            return false;
        }
        *slot = Some(payload);
        true
    }

    /// Record every error slot in a status snapshot
    ///
    /// A failed org registration is reported on the upgrade channel. Returns
    /// the channels that fired for the first time.
    pub fn observe(&mut self, snapshot: &StatusSnapshot) -> Vec<ErrorChannel> {
        let slots = [
            (ErrorChannel::Catalog, &snapshot.catalog_error),
            (ErrorChannel::Import, &snapshot.import_error),
            (ErrorChannel::Upgrade, &snapshot.upgrade_error),
            (ErrorChannel::Upgrade, &snapshot.registration_error),
        ];

        slots
            .into_iter()
            .filter_map(|(channel, payload)| {
                let payload = payload.clone()?;
                self.record(channel, payload).then_some(channel)
            })
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.catalog.is_some() || self.import.is_some() || self.upgrade.is_some()
    }

    #[must_use]
    pub fn get(&self, channel: ErrorChannel) -> Option<&ErrorPayload> {
        match channel {
            ErrorChannel::Catalog => self.catalog.as_ref(),
            ErrorChannel::Import => self.import.as_ref(),
            ErrorChannel::Upgrade => self.upgrade.as_ref(),
        }
    }

    /// Highest priority error
    #[must_use]
    pub fn primary(&self) -> Option<(ErrorChannel, &ErrorPayload)> {
        ErrorChannel::BY_PRIORITY
            .into_iter()
            .find_map(|channel| self.get(channel).map(|payload| (channel, payload)))
    }

    /// What the user sees for the primary error
    #[must_use]
    pub fn display(&self, config: &WorkflowConfig) -> Option<ErrorDisplay> {
        self.primary().map(|(_, payload)| ErrorDisplay {
            message: normalize_message(payload, &config.error_prefix),
            contact: config.support_contact.clone(),
        })
    }
}

/// Reduce a payload to one sentence: prefix stripped, first letter
/// capitalized, trailing period
///
/// `None` when the payload carries no message.
#[must_use]
pub fn normalize_message(payload: &ErrorPayload, prefix: &str) -> Option<String> {
    let raw = payload.message.as_deref()?;
    let stripped = raw.strip_prefix(prefix).unwrap_or(raw).trim();

    let mut chars = stripped.chars();
    let first = chars.next()?;
    let mut sentence: String = first.to_uppercase().chain(chars).collect();
    if !sentence.ends_with(&['.', '!', '?'][..]) {
        sentence.push('.');
    }
    Some(sentence)
}
