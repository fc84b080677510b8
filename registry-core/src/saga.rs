//! In-process saga executor
//!
//! Multi-document operations run as a sequence of steps. After each step
//! succeeds its undo action is recorded with [`Saga::on_rollback`]. When a later
//! step fails, the recorded compensations run in reverse order, their own
//! failures are logged and swallowed, and the step's original error is returned.

use crate::error::RegistryResult;
use futures_util::future::BoxFuture;
use std::future::Future;
use tracing::{debug, warn};

struct Compensation {
    label: &'static str,
    action: BoxFuture<'static, RegistryResult<()>>,
}

pub struct Saga {
    name: &'static str,
    compensations: Vec<Compensation>,
}

impl Saga {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            compensations: Vec::new(),
        }
    }

    /// Run one step; on failure unwind everything recorded so far
    pub async fn step<T, F>(&mut self, label: &'static str, action: F) -> RegistryResult<T>
    where
        F: Future<Output = RegistryResult<T>>,
    {
        match action.await {
            Ok(value) => {
                debug!(saga = self.name, step = label, "Saga step completed");
                Ok(value)
            }
            Err(error) => {
                warn!(
                    saga = self.name,
                    step = label,
                    error = %error,
                    "Saga step failed, compensating"
                );
                self.rollback().await;
                Err(error)
            }
        }
    }

    /// Record the undo action for the step that just completed
    pub fn on_rollback<F>(&mut self, label: &'static str, action: F)
    where
        F: Future<Output = RegistryResult<()>> + Send + 'static,
    {
        self.compensations.push(Compensation {
            label,
            action: Box::pin(action),
        });
    }

    /// Number of compensations currently recorded
    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    /// Finish successfully, dropping all recorded compensations unrun
    pub fn commit(self) {
        debug!(saga = self.name, "Saga committed");
    }

    async fn rollback(&mut self) {
        while let Some(compensation) = self.compensations.pop() {
            match compensation.action.await {
                Ok(()) => debug!(
                    saga = self.name,
                    compensation = compensation.label,
                    "Compensation applied"
                ),
                Err(e) => warn!(
                    saga = self.name,
                    compensation = compensation.label,
                    error = %e,
                    "Compensation failed"
                ),
            }
        }
    }
}
