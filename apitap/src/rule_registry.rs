use crate::{
    error::Result,
    rules::{BreakpointRule, MockRule, RuleSet},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Current mock and breakpoint rule snapshots.
///
/// Saving replaces a whole list and pushes the new snapshot to every subscribed
/// interceptor. Subscribers only ever see the latest complete snapshot; there is no
/// acknowledgement.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    mocks: Arc<watch::Sender<Arc<RuleSet<MockRule>>>>,
    breakpoints: Arc<watch::Sender<Arc<RuleSet<BreakpointRule>>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        let (mocks, _) = watch::channel(Arc::new(RuleSet::default()));
        let (breakpoints, _) = watch::channel(Arc::new(RuleSet::default()));

        Self {
            mocks: Arc::new(mocks),
            breakpoints: Arc::new(breakpoints),
        }
    }

    pub fn mock_rules(&self) -> Vec<MockRule> {
        self.mocks.borrow().rules().to_vec()
    }

    pub fn breakpoint_rules(&self) -> Vec<BreakpointRule> {
        self.breakpoints.borrow().rules().to_vec()
    }

    /// Replaces the mock rules. Fails without touching the current snapshot if any
    /// pattern cannot be compiled.
    pub fn save_mock_rules(&self, rules: Vec<MockRule>) -> Result<()> {
        let set = RuleSet::new(rules)?;
        info!(rules = set.len(), "mock rules updated");
        self.mocks.send_replace(Arc::new(set));
        Ok(())
    }

    pub fn save_breakpoint_rules(&self, rules: Vec<BreakpointRule>) -> Result<()> {
        let set = RuleSet::new(rules)?;
        info!(rules = set.len(), "breakpoint rules updated");
        self.breakpoints.send_replace(Arc::new(set));
        Ok(())
    }

    pub fn subscribe(&self) -> RuleSubscription {
        RuleSubscription {
            mocks: self.mocks.subscribe(),
            breakpoints: self.breakpoints.subscribe(),
        }
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a [`RuleRegistry`] held by one interception context.
#[derive(Debug, Clone)]
pub struct RuleSubscription {
    mocks: watch::Receiver<Arc<RuleSet<MockRule>>>,
    breakpoints: watch::Receiver<Arc<RuleSet<BreakpointRule>>>,
}

impl RuleSubscription {
    pub fn mocks(&self) -> Arc<RuleSet<MockRule>> {
        Arc::clone(&self.mocks.borrow())
    }

    pub fn breakpoints(&self) -> Arc<RuleSet<BreakpointRule>> {
        Arc::clone(&self.breakpoints.borrow())
    }
}
