//! Recording command channel.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::core::{CancellationCommand, RunId, RunStatus};
use crate::errors::{PublishError, StoreError};
use crate::ports::CommandChannel;

use super::InMemoryRunStore;

/// A published message as the channel received it.
#[derive(Debug, Clone)]
pub struct PublishedCommand {
    /// Queue the command was published to.
    pub queue: String,
    /// Routing key reported by the command.
    pub routing_key: String,
    /// The command itself.
    pub command: CancellationCommand,
    /// The encoded payload.
    pub payload: serde_json::Value,
}

/// A channel that records every publish.
///
/// Optionally acts as the worker side: with [`Self::with_worker`] each
/// accepted command cancels the run in the attached store, which makes
/// duplicate commands observable as no-ops.
#[derive(Default)]
pub struct RecordingCommandChannel {
    published: Mutex<Vec<PublishedCommand>>,
    failure: Mutex<Option<PublishError>>,
    worker: Option<Arc<InMemoryRunStore>>,
}

impl RecordingCommandChannel {
    /// Creates a channel that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels runs in `store` as commands arrive.
    #[must_use]
    pub fn with_worker(mut self, store: Arc<InMemoryRunStore>) -> Self {
        self.worker = Some(store);
        self
    }

    /// Makes every subsequent publish fail with `error`.
    pub fn fail_with(&self, error: PublishError) {
        *self.failure.lock() = Some(error);
    }

    /// Returns all accepted messages.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedCommand> {
        self.published.lock().clone()
    }

    /// Number of accepted messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.lock().len()
    }

    /// Returns true if nothing was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }

    /// Accepted messages addressed to `run_id`.
    #[must_use]
    pub fn commands_for(&self, run_id: RunId) -> Vec<CancellationCommand> {
        self.published
            .lock()
            .iter()
            .filter(|p| p.command.run_id() == run_id)
            .map(|p| p.command.clone())
            .collect()
    }
}

impl std::fmt::Debug for RecordingCommandChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingCommandChannel")
            .field("published", &self.len())
            .field("has_worker", &self.worker.is_some())
            .finish()
    }
}

#[async_trait]
impl CommandChannel for RecordingCommandChannel {
    async fn publish(&self, queue: &str, command: &CancellationCommand) -> Result<(), PublishError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }

        let payload = command.to_payload()?;

        if let Some(store) = &self.worker {
            // Ok(false) means the run was already terminal; the worker
            // treats the duplicate as a no-op.
            match store.set_status(command.run_id(), RunStatus::Cancelled) {
                Ok(applied) => debug!(run_id = %command.run_id(), applied, "Worker handled cancellation"),
                Err(StoreError::NotFound) => {
                    return Err(PublishError::Rejected(format!(
                        "no worker holds step run {}",
                        command.run_id()
                    )))
                }
                Err(err) => return Err(PublishError::Unavailable(err.to_string())),
            }
        }

        self.published.lock().push(PublishedCommand {
            queue: queue.to_string(),
            routing_key: command.routing_key(),
            command: command.clone(),
            payload,
        });
        Ok(())
    }
}
