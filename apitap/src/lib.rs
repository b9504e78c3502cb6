mod body;
mod breakpoint;
mod bridge;
mod cancel;
mod capture_log;
mod configuration;
mod data;
mod dispatcher;
mod error;
mod history;
mod interceptor;
mod load_generator;
mod record_stream;
mod recording_dispatcher;
mod rule_registry;
mod rules;
mod stats;
mod traffic_control;
mod util;

pub use body::{decode_event_body, decode_mock_body, decode_response_body};
pub use breakpoint::{
    BreakpointAction, BreakpointCoordinator, BreakpointDecision, BreakpointHit, BreakpointTicket,
};
pub use bridge::{Bridge, BridgeMessage};
pub use cancel::CancellationToken;
pub use capture_log::{CaptureLog, DEFAULT_CAPTURE_LIMIT};
pub use configuration::{InterceptorConfiguration, DEFAULT_BREAKPOINT_TIMEOUT};
pub use data::{
    CallKind, DispatchedResponse, HeaderList, OutboundRequest, RequestBody, RequestRecord,
    UNPARSABLE_REQUEST_BODY, UNPARSABLE_RESPONSE_BODY, UNSUPPORTED_RESPONSE_BODY,
};
pub use dispatcher::{Dispatcher, HyperDispatcher};
pub use error::{Error, Result};
pub use history::{HistoryStore, JsonFileHistory, MemoryHistory, SavedLoadTest, MAX_HISTORY};
pub use interceptor::{EventCall, Interceptor};
pub use load_generator::{LoadGenerator, LoadTestConfig, LoadTestResult};
pub use record_stream::{RecordPublisher, DEFAULT_RECORD_CAPACITY};
pub use recording_dispatcher::RecordingDispatcher;
pub use rule_registry::{RuleRegistry, RuleSubscription};
pub use rules::{
    find_matching_rule, BreakpointRule, MatchRule, MockRule, RuleMethod, RuleSet, UrlPattern,
};
pub use stats::{calculate_stats, percentile, LoadRun, LoadTestStats};
pub use traffic_control::TrafficControl;

// re-exported so dispatcher implementations outside the crate use the same version
pub use async_trait::async_trait;
pub use hyper::body::Bytes;
