use crate::{
    breakpoint::{BreakpointCoordinator, BreakpointDecision, BreakpointHit},
    bridge::Bridge,
    capture_log::CaptureLog,
    configuration::InterceptorConfiguration,
    data::RequestRecord,
    dispatcher::Dispatcher,
    interceptor::Interceptor,
    load_generator::LoadGenerator,
    record_stream::RecordPublisher,
    recording_dispatcher::RecordingDispatcher,
    rule_registry::RuleRegistry,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Wires rules, breakpoints, the record stream and the dispatcher together and hands
/// out the pieces that use them.
#[derive(Debug, Clone)]
pub struct TrafficControl {
    configuration: InterceptorConfiguration,
    dispatcher: Arc<dyn Dispatcher>,
    registry: RuleRegistry,
    coordinator: Arc<BreakpointCoordinator>,
    publisher: RecordPublisher,
}

impl TrafficControl {
    /// Also returns the stream of breakpoint hits the deciding side listens to.
    pub fn new(
        configuration: InterceptorConfiguration,
    ) -> (Self, mpsc::UnboundedReceiver<BreakpointHit>) {
        let (coordinator, hits) = BreakpointCoordinator::new();
        let control = Self {
            dispatcher: configuration.dispatcher(),
            publisher: RecordPublisher::new(configuration.record_capacity()),
            registry: RuleRegistry::new(),
            coordinator,
            configuration,
        };

        (control, hits)
    }

    pub fn configuration(&self) -> &InterceptorConfiguration {
        &self.configuration
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<BreakpointCoordinator> {
        &self.coordinator
    }

    /// A new interception context following the current rule snapshots.
    pub fn interceptor(&self) -> Interceptor {
        Interceptor::new(
            Arc::clone(&self.dispatcher),
            self.registry.subscribe(),
            Arc::clone(&self.coordinator),
            self.publisher.clone(),
            self.configuration.breakpoint_timeout(),
        )
    }

    /// Replays bypass every rule.
    pub fn load_generator(&self) -> LoadGenerator {
        if self.configuration.record_replays() {
            LoadGenerator::new(Arc::new(RecordingDispatcher::new(
                Arc::clone(&self.dispatcher),
                self.publisher.clone(),
            )))
        } else {
            LoadGenerator::new(Arc::clone(&self.dispatcher))
        }
    }

    pub fn bridge(&self) -> Bridge {
        Bridge::new(self.registry.clone(), Arc::clone(&self.coordinator))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RequestRecord> {
        self.publisher.subscribe()
    }

    /// Sender for breakpoint decisions, served on a background task.
    pub fn decisions(&self) -> mpsc::UnboundedSender<BreakpointDecision> {
        self.coordinator.decision_channel()
    }

    /// A capture log fed from the record stream on a background task.
    pub fn capture_log(&self, limit: usize) -> Arc<CaptureLog> {
        let log = Arc::new(CaptureLog::new(limit));
        let receiver = self.publisher.subscribe();
        let follower = Arc::clone(&log);
        tokio::spawn(async move { follower.follow(receiver).await });
        log
    }
}
