use crate::{
    breakpoint::{BreakpointCoordinator, BreakpointDecision, BreakpointHit},
    data::RequestRecord,
    error::Result,
    rule_registry::RuleRegistry,
    rules::{BreakpointRule, MockRule},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Messages exchanged between the interception context and the presentation side
/// when they do not share a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeMessage {
    MockRulesUpdated(Vec<MockRule>),
    BreakpointRulesUpdated(Vec<BreakpointRule>),
    BreakpointHit(BreakpointHit),
    BreakpointResponse(BreakpointDecision),
    RequestCaptured(RequestRecord),
}

impl BridgeMessage {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<BreakpointHit> for BridgeMessage {
    fn from(hit: BreakpointHit) -> Self {
        BridgeMessage::BreakpointHit(hit)
    }
}

impl From<RequestRecord> for BridgeMessage {
    fn from(record: RequestRecord) -> Self {
        BridgeMessage::RequestCaptured(record)
    }
}

/// Applies incoming bridge messages to the interception side.
#[derive(Debug, Clone)]
pub struct Bridge {
    registry: RuleRegistry,
    coordinator: Arc<BreakpointCoordinator>,
}

impl Bridge {
    pub fn new(registry: RuleRegistry, coordinator: Arc<BreakpointCoordinator>) -> Self {
        Self {
            registry,
            coordinator,
        }
    }

    /// Outbound-only messages are ignored.
    pub fn handle(&self, message: BridgeMessage) -> Result<()> {
        match message {
            BridgeMessage::MockRulesUpdated(rules) => self.registry.save_mock_rules(rules),
            BridgeMessage::BreakpointRulesUpdated(rules) => {
                self.registry.save_breakpoint_rules(rules)
            }
            BridgeMessage::BreakpointResponse(decision) => {
                self.coordinator.resolve(&decision);
                Ok(())
            }
            BridgeMessage::BreakpointHit(_) | BridgeMessage::RequestCaptured(_) => {
                debug!("ignoring outbound bridge message");
                Ok(())
            }
        }
    }

    pub fn handle_json(&self, json: &str) -> Result<()> {
        self.handle(BridgeMessage::from_json(json)?)
    }
}
