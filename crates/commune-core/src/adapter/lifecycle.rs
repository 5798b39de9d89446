//! Adapter lifecycle: `Uninitialised -> Ready -> Closed`.
//!
//! Every adapter keeps its live connection handle inside a `Lifecycle`, so
//! the handle only exists while the adapter is `Ready`. Sessions obtain a
//! clone of it through [`Lifecycle::connection`], which fails with
//! `NotReady` before `setup` and after `teardown`.

use std::sync::{PoisonError, RwLock};

use commune_types::error::StorageError;

/// Observable adapter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialised,
    Ready,
    Closed,
}

enum Phase<C> {
    Uninitialised,
    Ready(C),
    Closed,
}

/// Lifecycle state plus the connection it guards.
pub struct Lifecycle<C> {
    adapter: &'static str,
    phase: RwLock<Phase<C>>,
}

impl<C: Clone> Lifecycle<C> {
    pub fn new(adapter: &'static str) -> Self {
        Self {
            adapter,
            phase: RwLock::new(Phase::Uninitialised),
        }
    }

    pub fn state(&self) -> AdapterState {
        match &*self.phase.read().unwrap_or_else(PoisonError::into_inner) {
            Phase::Uninitialised => AdapterState::Uninitialised,
            Phase::Ready(_) => AdapterState::Ready,
            Phase::Closed => AdapterState::Closed,
        }
    }

    /// Fail unless `setup` has not run yet. Called before connecting.
    pub fn ensure_uninitialised(&self) -> Result<(), StorageError> {
        match self.state() {
            AdapterState::Uninitialised => Ok(()),
            _ => Err(self.not_ready()),
        }
    }

    /// Install the connection and move to `Ready`.
    pub fn mark_ready(&self, connection: C) -> Result<(), StorageError> {
        let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        match *phase {
            Phase::Uninitialised => {
                *phase = Phase::Ready(connection);
                Ok(())
            }
            _ => Err(self.not_ready()),
        }
    }

    /// Clone of the live connection.
    pub fn connection(&self) -> Result<C, StorageError> {
        match &*self.phase.read().unwrap_or_else(PoisonError::into_inner) {
            Phase::Ready(connection) => Ok(connection.clone()),
            _ => Err(self.not_ready()),
        }
    }

    /// Move to `Closed`, handing back the connection for release.
    pub fn close(&self) -> Result<C, StorageError> {
        let mut phase = self.phase.write().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *phase, Phase::Closed) {
            Phase::Ready(connection) => Ok(connection),
            previous => {
                *phase = previous;
                Err(self.not_ready())
            }
        }
    }

    fn not_ready(&self) -> StorageError {
        StorageError::NotReady {
            adapter: self.adapter,
        }
    }
}
