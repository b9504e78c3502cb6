use crate::{
    dispatcher::{Dispatcher, HyperDispatcher},
    record_stream::DEFAULT_RECORD_CAPACITY,
};
use std::{sync::Arc, time::Duration};

pub const DEFAULT_BREAKPOINT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct InterceptorConfiguration {
    dispatcher: Option<Arc<dyn Dispatcher>>,
    breakpoint_timeout: Option<Duration>,
    record_capacity: usize,
    record_replays: bool,
}

impl InterceptorConfiguration {
    pub fn new() -> Self {
        Self {
            dispatcher: None,
            breakpoint_timeout: Some(DEFAULT_BREAKPOINT_TIMEOUT),
            record_capacity: DEFAULT_RECORD_CAPACITY,
            record_replays: true,
        }
    }

    /// Dispatcher real calls go through. Defaults to [`HyperDispatcher`].
    pub fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        self.dispatcher
            .clone()
            .unwrap_or_else(|| Arc::new(HyperDispatcher::new()))
    }

    pub fn set_dispatcher(&mut self, dispatcher: Arc<dyn Dispatcher>) {
        self.dispatcher = Some(dispatcher);
    }

    /// How long a suspended call waits for a decision. `None` waits forever.
    pub fn breakpoint_timeout(&self) -> Option<Duration> {
        self.breakpoint_timeout
    }

    pub fn set_breakpoint_timeout(&mut self, timeout: Option<Duration>) {
        self.breakpoint_timeout = timeout;
    }

    pub fn record_capacity(&self) -> usize {
        self.record_capacity
    }

    pub fn set_record_capacity(&mut self, capacity: usize) {
        self.record_capacity = capacity;
    }

    /// Whether load test replays show up on the record stream.
    pub fn record_replays(&self) -> bool {
        self.record_replays
    }

    pub fn set_record_replays(&mut self, value: bool) {
        self.record_replays = value;
    }
}

impl Default for InterceptorConfiguration {
    fn default() -> Self {
        Self::new()
    }
}
