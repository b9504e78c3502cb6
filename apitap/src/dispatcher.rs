use crate::{
    data::{DispatchedResponse, OutboundRequest},
    error::Error,
    util,
};
use async_trait::async_trait;
use hyper::{body, client::HttpConnector, Body, Client, Request};
use hyper_tls::HttpsConnector;
use std::{fmt::Debug, sync::Arc};

/// Issues one call and returns its outcome.
///
/// Page code is written against this trait; instrumentation is added by handing it a
/// wrapping implementation instead of the real one.
#[async_trait]
pub trait Dispatcher: Debug + Send + Sync {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<DispatchedResponse, Error>;
}

#[async_trait]
impl<D: Dispatcher + ?Sized> Dispatcher for Arc<D> {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<DispatchedResponse, Error> {
        (**self).dispatch(request).await
    }
}

/// Dispatcher that puts calls on the wire.
#[derive(Debug, Clone)]
pub struct HyperDispatcher {
    client: Client<HttpsConnector<HttpConnector>>,
}

impl HyperDispatcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder().build(HttpsConnector::new()),
        }
    }

    fn build_request(request: &OutboundRequest) -> Result<Request<Body>, Error> {
        let mut request_builder = Request::builder()
            .uri(request.url.as_str())
            .method(request.normalized_method().as_str());

        if let Some(headers_mut) = request_builder.headers_mut() {
            util::put_headers(
                headers_mut,
                request
                    .headers
                    .iter()
                    .filter(|(header_name, _)| !header_name.eq_ignore_ascii_case("host")),
            )?;
        }

        let body = match &request.body {
            Some(body) => Body::from(body.to_bytes()),
            None => Body::empty(),
        };

        Ok(request_builder.body(body)?)
    }
}

#[async_trait]
impl Dispatcher for HyperDispatcher {
    async fn dispatch(&self, request: &OutboundRequest) -> Result<DispatchedResponse, Error> {
        let request = Self::build_request(request)?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let headers = util::extract_headers(response.headers());
        let body = body::to_bytes(response.into_body())
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(DispatchedResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").into(),
            headers,
            body,
        })
    }
}

impl Default for HyperDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
