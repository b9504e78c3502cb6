//! Suspending calls until someone decides whether they may proceed.
//!
//! The call-issuing side registers a [`BreakpointTicket`] and announces a
//! [`BreakpointHit`]; the deciding side answers with a [`BreakpointDecision`] carrying
//! the same id. The two sides only share channels.

use crate::{
    data::RequestRecord,
    error::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointAction {
    Continue,
    Cancel,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BreakpointDecision {
    pub id: String,
    pub action: BreakpointAction,
}

impl BreakpointDecision {
    pub fn proceed<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            action: BreakpointAction::Continue,
        }
    }

    pub fn cancel<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            action: BreakpointAction::Cancel,
        }
    }
}

/// Notification that a call is suspended. Carries the record as it was when the call
/// was issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakpointHit {
    #[serde(flatten)]
    pub record: RequestRecord,
}

impl BreakpointHit {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Handle held by a suspended call.
#[derive(Debug)]
pub struct BreakpointTicket {
    id: String,
    receiver: oneshot::Receiver<BreakpointAction>,
}

impl BreakpointTicket {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the decision. `None` waits forever.
    ///
    /// A ticket whose registry entry vanished without a decision counts as cancelled.
    pub async fn wait(self, timeout: Option<Duration>) -> Result<()> {
        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, self.receiver)
                .await
                .map_err(|_| Error::BreakpointTimedOut)?,
            None => self.receiver.await,
        };

        match outcome {
            Ok(BreakpointAction::Continue) => Ok(()),
            Ok(BreakpointAction::Cancel) | Err(_) => Err(Error::BreakpointCancelled),
        }
    }
}

#[derive(Debug)]
pub struct BreakpointCoordinator {
    pending: Mutex<HashMap<String, oneshot::Sender<BreakpointAction>>>,
    notifications: mpsc::UnboundedSender<BreakpointHit>,
}

impl BreakpointCoordinator {
    /// Creates a coordinator and the receiving end of its hit notifications.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<BreakpointHit>) {
        let (notifications, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            pending: Mutex::new(HashMap::new()),
            notifications,
        };

        (Arc::new(coordinator), receiver)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<BreakpointAction>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register<S: Into<String>>(&self, id: S) -> BreakpointTicket {
        let id = id.into();
        let (sender, receiver) = oneshot::channel();

        if self.pending().insert(id.clone(), sender).is_some() {
            warn!(%id, "breakpoint ticket replaced an unresolved one with the same id");
        }

        BreakpointTicket { id, receiver }
    }

    /// Best effort: a missing listener does not affect the suspended call.
    pub fn notify(&self, record: RequestRecord) {
        if self.notifications.send(BreakpointHit { record }).is_err() {
            debug!("no breakpoint listener attached");
        }
    }

    /// Registers a ticket for `record`, announces it and waits for the decision.
    ///
    /// The ticket is removed however the wait ends, including when the returned future
    /// is dropped before a decision arrives.
    pub async fn suspend(&self, record: &RequestRecord, timeout: Option<Duration>) -> Result<()> {
        let ticket = self.register(record.id.as_str());
        let _registered = Registration {
            coordinator: self,
            id: &record.id,
        };
        info!(id = %record.id, method = %record.method, url = %record.url, "breakpoint hit");
        self.notify(record.clone());

        let outcome = ticket.wait(timeout).await;
        if let Err(Error::BreakpointTimedOut) = outcome {
            warn!(id = %record.id, "breakpoint decision timed out, cancelling call");
        }

        outcome
    }

    /// Applies a decision. Returns `false` when no ticket is pending for the id, which
    /// covers duplicate and late decisions.
    pub fn resolve(&self, decision: &BreakpointDecision) -> bool {
        let sender = match self.pending().remove(&decision.id) {
            Some(sender) => sender,
            None => {
                debug!(id = %decision.id, "ignoring decision for unknown breakpoint");
                return false;
            }
        };

        debug!(id = %decision.id, action = ?decision.action, "breakpoint resolved");
        // the suspended call may have gone away in the meantime
        let _ = sender.send(decision.action);
        true
    }

    fn forget(&self, id: &str) -> bool {
        self.pending().remove(id).is_some()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending().contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Resolves decisions as they arrive until every decision sender is gone.
    pub async fn serve(self: Arc<Self>, mut decisions: mpsc::UnboundedReceiver<BreakpointDecision>) {
        while let Some(decision) = decisions.recv().await {
            self.resolve(&decision);
        }
    }

    /// Spawns [`serve`](Self::serve) and returns the sender decisions go to.
    pub fn decision_channel(self: &Arc<Self>) -> mpsc::UnboundedSender<BreakpointDecision> {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Arc::clone(self).serve(receiver));
        sender
    }
}

/// Drops the pending entry of a suspended call when the suspension ends.
struct Registration<'a> {
    coordinator: &'a BreakpointCoordinator,
    id: &'a str,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if self.coordinator.forget(self.id) {
            debug!(id = %self.id, "breakpoint abandoned before a decision");
        }
    }
}
