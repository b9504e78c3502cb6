use crate::{
    body,
    data::{CallKind, DispatchedResponse, OutboundRequest, RequestRecord},
    dispatcher::Dispatcher,
    error::Error,
    record_stream::RecordPublisher,
    util,
};
use async_trait::async_trait;
use tokio::time::Instant;

/// Publishes a record for every call but never applies rules.
#[derive(Debug, Clone)]
pub struct RecordingDispatcher<D> {
    inner: D,
    publisher: RecordPublisher,
}

impl<D: Dispatcher> RecordingDispatcher<D> {
    pub fn new(inner: D, publisher: RecordPublisher) -> Self {
        Self { inner, publisher }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

#[async_trait]
impl<D: Dispatcher> Dispatcher for RecordingDispatcher<D> {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<DispatchedResponse, Error> {
        let start = Instant::now();
        let record = RequestRecord::started(CallKind::Fetch, request);
        let result = self.inner.dispatch(request).await;
        let duration = util::elapsed_millis(start);

        let record = match &result {
            Ok(response) => record.resolved(
                response.status,
                response.status_text.clone(),
                response.headers.clone(),
                body::decode_response_body(response),
                duration,
            ),
            Err(e) => record.network_error(e.to_string(), duration),
        };
        self.publisher.publish(record);

        result
    }
}
