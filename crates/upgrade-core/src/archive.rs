//! Archive Import Coordinator
//!
//! Tracks readiness of the selected destination's session graph and
//! migration archive. Every selection change bumps a generation counter;
//! responses carry the [`SelectionToken`] they were requested under and are
//! discarded when the token no longer matches.
//!
//! The coordinator performs no I/O. It returns [`ImportCommand`]s that the
//! workflow runs in order against the background process.

use crate::error::BackgroundError;
use tracing::debug;
use upgrade_model::{AccountId, MigrationArchive, SessionGraph};

/// Identifies the selection a request was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionToken {
    generation: u64,
    account: AccountId,
}

impl SelectionToken {
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    #[must_use]
    pub fn account(&self) -> &AccountId {
        &self.account
    }
}

/// Readiness of the selected destination
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportState {
    /// No destination selected
    #[default]
    Idle,
    AwaitingSession {
        token: SelectionToken,
    },
    Decrypting {
        token: SelectionToken,
        session: SessionGraph,
    },
    Ready {
        token: SelectionToken,
        session: SessionGraph,
        archive: MigrationArchive,
    },
}

/// Background request to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportCommand {
    ResetPreparation(Option<AccountId>),
    FetchSession(SelectionToken),
    Decrypt(SelectionToken),
}

/// What a response did to the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorOutcome {
    Applied(Vec<ImportCommand>),
    /// Response belonged to an earlier selection and was dropped
    Stale,
    /// Response for the current selection carried an error
    Failed(BackgroundError),
}

#[derive(Debug, Default)]
pub struct ArchiveCoordinator {
    generation: u64,
    state: ImportState,
}

impl ArchiveCoordinator {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a destination account, or none to create a new account
    pub fn select(&mut self, account: Option<AccountId>) -> Vec<ImportCommand> {
        self.generation += 1;

        match account {
            Some(account) => {
                let token = SelectionToken {
                    generation: self.generation,
                    account: account.clone(),
                };
                self.state = ImportState::AwaitingSession {
                    token: token.clone(),
                };
                vec![
                    ImportCommand::ResetPreparation(Some(account)),
                    ImportCommand::FetchSession(token),
                ]
            }
            None => {
                self.state = ImportState::Idle;
                vec![ImportCommand::ResetPreparation(None)]
            }
        }
    }

    /// Apply a session response
    pub fn on_session(
        &mut self,
        token: &SelectionToken,
        result: Result<SessionGraph, BackgroundError>,
    ) -> CoordinatorOutcome {
        match &self.state {
            ImportState::AwaitingSession { token: current } if current == token => {}
            _ => {
                debug!(account = %token.account, generation = token.generation, "Discarding stale session response");
                return CoordinatorOutcome::Stale;
            }
        }

        match result {
            Ok(session) => {
                self.state = ImportState::Decrypting {
                    token: token.clone(),
                    session,
                };
                CoordinatorOutcome::Applied(vec![
                    ImportCommand::ResetPreparation(None),
                    ImportCommand::Decrypt(token.clone()),
                ])
            }
            Err(error) => CoordinatorOutcome::Failed(error),
        }
    }

    /// Apply a decryption response
    pub fn on_archive(
        &mut self,
        token: &SelectionToken,
        result: Result<MigrationArchive, BackgroundError>,
    ) -> CoordinatorOutcome {
        let session = match &self.state {
            ImportState::Decrypting {
                token: current,
                session,
            } if current == token => session.clone(),
            _ => {
                debug!(account = %token.account, generation = token.generation, "Discarding stale archive");
                return CoordinatorOutcome::Stale;
            }
        };

        match result {
            Ok(archive) => {
                self.state = ImportState::Ready {
                    token: token.clone(),
                    session,
                    archive,
                };
                CoordinatorOutcome::Applied(Vec::new())
            }
            Err(error) => CoordinatorOutcome::Failed(error),
        }
    }

    /// Drop pending work; later responses are stale
    pub fn halt(&mut self) {
        self.generation += 1;
        self.state = ImportState::Idle;
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &ImportState {
        &self.state
    }

    #[must_use]
    pub fn selected(&self) -> Option<&AccountId> {
        match &self.state {
            ImportState::Idle => None,
            ImportState::AwaitingSession { token }
            | ImportState::Decrypting { token, .. }
            | ImportState::Ready { token, .. } => Some(&token.account),
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&SessionGraph> {
        match &self.state {
            ImportState::Decrypting { session, .. } | ImportState::Ready { session, .. } => {
                Some(session)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn archive(&self) -> Option<&MigrationArchive> {
        match &self.state {
            ImportState::Ready { archive, .. } => Some(archive),
            _ => None,
        }
    }

    /// Waiting on a session or an archive for the selected account
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            ImportState::AwaitingSession { .. } | ImportState::Decrypting { .. }
        )
    }
}
