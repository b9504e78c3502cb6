//! Observable, controllable outbound calls.
//!
//! Every call goes through the same steps: breakpoint check (possibly suspending), mock
//! check, then the real dispatcher. Exactly one terminal [`RequestRecord`] is published
//! per call, and a call that matches no rule behaves as if the dispatcher were called
//! directly.

use crate::{
    body,
    breakpoint::BreakpointCoordinator,
    data::{CallKind, DispatchedResponse, OutboundRequest, RequestBody, RequestRecord},
    dispatcher::Dispatcher,
    error::Error,
    record_stream::RecordPublisher,
    rule_registry::RuleSubscription,
    rules::MockRule,
    util,
};
use async_trait::async_trait;
use hyper::body::Bytes;
use std::{fmt, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, warn};

const MOCK_STATUS_TEXT: &str = "OK (Mocked)";

/// Dispatcher that applies mock and breakpoint rules before calling the real one.
#[derive(Debug, Clone)]
pub struct Interceptor {
    dispatcher: Arc<dyn Dispatcher>,
    rules: RuleSubscription,
    coordinator: Arc<BreakpointCoordinator>,
    publisher: RecordPublisher,
    breakpoint_timeout: Option<Duration>,
}

/// How a call got past the rule checks.
enum Route {
    Mocked(MockRule),
    Dispatch,
}

/// The one terminal record of a call that is still in progress.
///
/// If the call is dropped before it settles, the record is published as aborted.
struct PendingRecord {
    publisher: RecordPublisher,
    record: RequestRecord,
    start: Instant,
    settled: bool,
}

impl PendingRecord {
    fn new(publisher: RecordPublisher, record: RequestRecord) -> Self {
        Self {
            publisher,
            record,
            start: Instant::now(),
            settled: false,
        }
    }

    fn record(&self) -> &RequestRecord {
        &self.record
    }

    /// Publishes the terminal record built by `settle`. Only the first call publishes.
    fn finish<F: FnOnce(RequestRecord, u64) -> RequestRecord>(&mut self, settle: F) {
        if self.settled {
            return;
        }
        self.settled = true;
        let duration = util::elapsed_millis(self.start);
        self.publisher.publish(settle(self.record.clone(), duration));
    }
}

impl Drop for PendingRecord {
    fn drop(&mut self) {
        if !self.settled {
            debug!(id = %self.record.id, "call dropped before it settled");
            self.finish(|record, duration| {
                record.network_error(Error::Aborted.to_string(), duration)
            });
        }
    }
}

impl Interceptor {
    pub fn new(
        dispatcher: Arc<dyn Dispatcher>,
        rules: RuleSubscription,
        coordinator: Arc<BreakpointCoordinator>,
        publisher: RecordPublisher,
        breakpoint_timeout: Option<Duration>,
    ) -> Self {
        Self {
            dispatcher,
            rules,
            coordinator,
            publisher,
            breakpoint_timeout,
        }
    }

    /// Starts an event-style call. Nothing is sent until [`EventCall::send`].
    pub fn open<S1: Into<String>, S2: Into<String>>(&self, method: S1, url: S2) -> EventCall {
        let request = OutboundRequest::new(method, url);
        let record = RequestRecord::started(CallKind::Xhr, &request);

        EventCall {
            interceptor: self.clone(),
            request,
            record,
            load_listeners: Vec::new(),
            error_listeners: Vec::new(),
        }
    }

    /// Runs the breakpoint and mock checks. On cancellation the terminal record has
    /// already been published.
    async fn route(&self, pending: &mut PendingRecord) -> Result<Route, Error> {
        let record = pending.record();
        let breakpoint = self
            .rules
            .breakpoints()
            .find(&record.url, &record.method)
            .map(|rule| rule.id.clone());

        if let Some(rule_id) = breakpoint {
            debug!(id = %record.id, rule = %rule_id, "call matched breakpoint rule");

            let decision = self
                .coordinator
                .suspend(record, self.breakpoint_timeout)
                .await;
            if let Err(e) = decision {
                pending.finish(|record, duration| {
                    record.breakpoint_cancelled(e.to_string(), duration)
                });
                return Err(e);
            }
        }

        let record = pending.record();
        let mock = self
            .rules
            .mocks()
            .find(&record.url, &record.method)
            .cloned();

        Ok(match mock {
            Some(rule) => Route::Mocked(rule),
            None => Route::Dispatch,
        })
    }

    fn mock_response(rule: &MockRule) -> DispatchedResponse {
        let mut headers = rule.response_headers.clone();
        if !headers.contains("content-type") {
            headers.set("content-type", "application/json");
        }

        let body = if rule.response_body.is_empty() {
            String::from("{}")
        } else {
            rule.response_body.clone()
        };

        DispatchedResponse {
            status: if rule.status == 0 { 200 } else { rule.status },
            status_text: if rule.status_text.is_empty() {
                MOCK_STATUS_TEXT.into()
            } else {
                rule.status_text.clone()
            },
            headers,
            body: Bytes::from(body),
        }
    }

    fn settle_mocked(pending: &mut PendingRecord, rule: &MockRule, response: &DispatchedResponse) {
        debug!(id = %pending.record().id, rule = %rule.id, "call answered by mock rule");
        pending.finish(|record, duration| {
            record.mocked(
                response.status,
                response.headers.clone(),
                body::decode_mock_body(&rule.response_body),
                duration,
            )
        });
    }
}

#[async_trait]
impl Dispatcher for Interceptor {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<DispatchedResponse, Error> {
        let mut pending = PendingRecord::new(
            self.publisher.clone(),
            RequestRecord::started(CallKind::Fetch, request),
        );

        if let Route::Mocked(rule) = self.route(&mut pending).await? {
            let response = Self::mock_response(&rule);
            Self::settle_mocked(&mut pending, &rule, &response);
            return Ok(response);
        }

        match self.dispatcher.dispatch(request).await {
            Ok(response) => {
                // the caller keeps `response`; the record decodes a shared copy of the body
                let observed = response.clone();
                pending.finish(|record, duration| {
                    record.resolved(
                        observed.status,
                        observed.status_text.clone(),
                        observed.headers.clone(),
                        body::decode_response_body(&observed),
                        duration,
                    )
                });
                Ok(response)
            }
            Err(e) => {
                let record = pending.record();
                warn!(id = %record.id, url = %record.url, error = %e, "call failed");
                pending.finish(|record, duration| record.network_error(e.to_string(), duration));
                Err(e)
            }
        }
    }
}

type LoadListener = Box<dyn FnOnce(&DispatchedResponse) + Send>;
type ErrorListener = Box<dyn FnOnce(&Error) + Send>;

/// An event-style call: headers are set one by one, then the call is sent and the
/// outcome is delivered to listeners.
pub struct EventCall {
    interceptor: Interceptor,
    request: OutboundRequest,
    record: RequestRecord,
    load_listeners: Vec<LoadListener>,
    error_listeners: Vec<ErrorListener>,
}

impl EventCall {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn set_request_header<S1: Into<String>, S2: Into<String>>(&mut self, name: S1, value: S2) {
        let name = name.into();
        let value = value.into();
        self.record.request_headers.set(name.clone(), value.clone());
        self.request.headers.set(name, value);
    }

    pub fn on_load<F: FnOnce(&DispatchedResponse) + Send + 'static>(&mut self, listener: F) {
        self.load_listeners.push(Box::new(listener));
    }

    pub fn on_error<F: FnOnce(&Error) + Send + 'static>(&mut self, listener: F) {
        self.error_listeners.push(Box::new(listener));
    }

    /// Sends the call on a background task. Listeners run on that task once the call
    /// completes; the handle resolves after they have run.
    pub fn send(mut self, body: Option<RequestBody>) -> JoinHandle<()> {
        self.record.request_body = body.as_ref().map(RequestBody::to_record_text);
        self.request.body = body;

        tokio::spawn(async move { self.complete().await })
    }

    async fn complete(self) {
        let EventCall {
            interceptor,
            request,
            record,
            load_listeners,
            error_listeners,
        } = self;
        let mut pending = PendingRecord::new(interceptor.publisher.clone(), record);

        let outcome = match interceptor.route(&mut pending).await {
            Ok(Route::Mocked(rule)) => {
                let mut response = Interceptor::mock_response(&rule);
                // event-style callers always see the mock marker as status text
                response.status_text = MOCK_STATUS_TEXT.into();
                Interceptor::settle_mocked(&mut pending, &rule, &response);
                Ok(response)
            }
            Ok(Route::Dispatch) => match interceptor.dispatcher.dispatch(&request).await {
                Ok(response) => {
                    let text = response.text();
                    pending.finish(|record, duration| {
                        record.resolved(
                            response.status,
                            response.status_text.clone(),
                            response.headers.clone(),
                            body::decode_event_body(response.content_type(), &text),
                            duration,
                        )
                    });
                    Ok(response)
                }
                Err(e) => {
                    let record = pending.record();
                    warn!(id = %record.id, url = %record.url, error = %e, "call failed");
                    pending
                        .finish(|record, duration| record.network_error(e.to_string(), duration));
                    Err(e)
                }
            },
            Err(e) => Err(e),
        };

        match outcome {
            Ok(response) => load_listeners
                .into_iter()
                .for_each(|listener| listener(&response)),
            Err(e) => error_listeners
                .into_iter()
                .for_each(|listener| listener(&e)),
        }
    }
}

impl fmt::Debug for EventCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCall")
            .field("request", &self.request)
            .field("record", &self.record)
            .field("load_listeners", &self.load_listeners.len())
            .field("error_listeners", &self.error_listeners.len())
            .finish()
    }
}
