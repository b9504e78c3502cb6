use apitap::{async_trait, Bytes, DispatchedResponse, Dispatcher, Error, OutboundRequest};
use hyper::{
    body,
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server,
};
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Once,
    },
    time::Duration,
};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("apitap=debug")
            .try_init();
    });
}

async fn handle_request(request: Request<Body>) -> Result<Response<Body>, Infallible> {
    let path = request.uri().path().to_string();
    let method = request.method().to_string();
    let trace = request
        .headers()
        .get("x-trace")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let payload = body::to_bytes(request.into_body())
        .await
        .map(|b| String::from_utf8_lossy(&b).into_owned())
        .unwrap_or_default();

    let response = match path.as_str() {
        "/json" => Response::builder()
            .header("content-type", "application/json")
            .body(Body::from(format!(
                "{{\"method\":\"{}\",\"trace\":\"{}\",\"body\":{}}}",
                method,
                trace,
                serde_json::to_string(&payload).unwrap_or_default()
            ))),
        "/text" => Response::builder()
            .header("content-type", "text/plain")
            .body(Body::from("plain text")),
        "/binary" => Response::builder()
            .header("content-type", "application/octet-stream")
            .body(Body::from(vec![0u8, 159, 146, 150])),
        "/fail" => Response::builder()
            .status(500)
            .header("content-type", "application/json")
            .body(Body::from("{\"error\":\"boom\"}")),
        _ => Response::builder().status(404).body(Body::empty()),
    };

    Ok(response.unwrap_or_else(|_| Response::new(Body::empty())))
}

/// Starts a local server on an ephemeral port and returns its base url.
pub async fn start_server() -> String {
    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let server = Server::bind(&addr).serve(make_service_fn(|_| async {
        Ok::<_, Infallible>(service_fn(handle_request))
    }));
    let local_addr = server.local_addr();

    tokio::spawn(async move {
        if let Err(e) = server.await {
            eprintln!("test server error: {}", e);
        }
    });

    format!("http://{}", local_addr)
}

/// Answers every call with 200 after `latency`, tracking how many calls overlap.
/// Calls whose sequence number is in `stalled` never complete.
#[derive(Debug, Default)]
pub struct ScriptedDispatcher {
    pub latency: Duration,
    pub stalled: Vec<usize>,
    pub status: u16,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedDispatcher {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            status: 200,
            ..Self::default()
        }
    }

    pub fn stalling(mut self, calls: Vec<usize>) -> Self {
        self.stalled = calls;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn dispatch(&self, _: &OutboundRequest) -> Result<DispatchedResponse, Error> {
        let sequence = self.calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if self.stalled.contains(&sequence) {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(DispatchedResponse {
            status: self.status,
            status_text: "OK".into(),
            headers: Default::default(),
            body: Bytes::new(),
        })
    }
}
