//! Unit-of-work completion callbacks.
//!
//! The identity cache never decides on its own when a transaction ends. It
//! registers a [`CompletionCallback`] with the caller's [`UnitOfWork`], and
//! the unit of work invokes it exactly once with the outcome.

use std::fmt;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::TransactionError;

/// How a unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// All changes were committed.
    Committed,
    /// The unit of work was rolled back.
    RolledBack,
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOutcome::Committed => write!(f, "committed"),
            TransactionOutcome::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// Callback invoked once when a unit of work completes.
pub type CompletionCallback = Box<dyn FnOnce(TransactionOutcome) + Send>;

/// The transaction collaborator a compilation runs within.
///
/// Implementations must run the registered callbacks exactly once, also when
/// the transaction is abandoned without an explicit commit or rollback: an
/// abort counts as [`TransactionOutcome::RolledBack`]. Otherwise the identity
/// cache keeps the unit's candidate ids until the process exits.
pub trait UnitOfWork: Send + Sync {
    /// Identifier unique among live units of work.
    fn id(&self) -> &str;

    /// Registers a callback to run when the unit of work completes.
    ///
    /// Fails if the unit of work has already completed.
    fn register_completion(&self, callback: CompletionCallback) -> Result<(), TransactionError>;
}

#[derive(Default)]
struct LocalState {
    completed: bool,
    callbacks: Vec<CompletionCallback>,
}

/// An in-process unit of work that runs its callbacks on commit or rollback.
///
/// Dropping it before either completes rolls it back.
///
/// Hosts that manage transactions elsewhere implement [`UnitOfWork`] over
/// their own transaction type; this implementation suits single-process
/// deployments and tests.
pub struct LocalUnitOfWork {
    id: String,
    state: Mutex<LocalState>,
}

impl LocalUnitOfWork {
    /// Starts a new unit of work.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            state: Mutex::new(LocalState::default()),
        }
    }

    /// Commits, running callbacks with [`TransactionOutcome::Committed`].
    pub fn commit(&self) -> Result<(), TransactionError> {
        self.complete(TransactionOutcome::Committed)
    }

    /// Rolls back, running callbacks with [`TransactionOutcome::RolledBack`].
    pub fn rollback(&self) -> Result<(), TransactionError> {
        self.complete(TransactionOutcome::RolledBack)
    }

    /// Returns true once commit or rollback has run.
    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    fn complete(&self, outcome: TransactionOutcome) -> Result<(), TransactionError> {
        let callbacks = {
            let mut state = self.state.lock();
            if state.completed {
                return Err(TransactionError::AlreadyCompleted {
                    id: self.id.clone(),
                });
            }
            state.completed = true;
            std::mem::take(&mut state.callbacks)
        };

        tracing::debug!(
            "Unit of work {} {}, running {} callbacks",
            self.id,
            outcome,
            callbacks.len()
        );
        for callback in callbacks {
            callback(outcome);
        }
        Ok(())
    }
}

impl Default for LocalUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalUnitOfWork {
    fn drop(&mut self) {
        if !self.state.get_mut().completed {
            tracing::debug!("Unit of work {} dropped before completion", self.id);
            // Only fails when already completed, which was just ruled out
            let _ = self.complete(TransactionOutcome::RolledBack);
        }
    }
}

impl fmt::Debug for LocalUnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalUnitOfWork")
            .field("id", &self.id)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl UnitOfWork for LocalUnitOfWork {
    fn id(&self) -> &str {
        &self.id
    }

    fn register_completion(&self, callback: CompletionCallback) -> Result<(), TransactionError> {
        let mut state = self.state.lock();
        if state.completed {
            return Err(TransactionError::AlreadyCompleted {
                id: self.id.clone(),
            });
        }
        state.callbacks.push(callback);
        Ok(())
    }
}
