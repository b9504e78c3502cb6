use crate::support::{init_tracing, start_server};
use apitap::{
    BreakpointDecision, BreakpointRule, BridgeMessage, CallKind, Dispatcher, Error,
    InterceptorConfiguration, MockRule, OutboundRequest, TrafficControl,
    UNSUPPORTED_RESPONSE_BODY,
};
use serde_json::json;
use std::time::Duration;

fn traffic_control() -> (
    TrafficControl,
    tokio::sync::mpsc::UnboundedReceiver<apitap::BreakpointHit>,
) {
    init_tracing();
    TrafficControl::new(InterceptorConfiguration::new())
}

#[tokio::test]
async fn real_calls_are_recorded_without_changing_the_response() {
    let base = start_server().await;
    let (control, _hits) = traffic_control();
    let mut records = control.subscribe();
    let interceptor = control.interceptor();

    let response = interceptor
        .dispatch(
            &OutboundRequest::new("POST", format!("{}/json", base))
                .with_header("X-Trace", "t-1")
                .with_body(json!({"hello": "world"})),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let page_view: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(page_view["trace"], "t-1");
    assert_eq!(page_view["body"], r#"{"hello":"world"}"#);

    let record = records.recv().await.unwrap();
    assert_eq!(record.kind, CallKind::Fetch);
    assert_eq!(record.method, "POST");
    assert_eq!(record.status_text, "OK");
    assert_eq!(record.response_body, page_view);
    assert_eq!(record.request_body.as_deref(), Some(r#"{"hello":"world"}"#));
    assert!(record.error.is_none());
}

#[tokio::test]
async fn content_type_drives_recorded_body() {
    let base = start_server().await;
    let (control, _hits) = traffic_control();
    let mut records = control.subscribe();
    let interceptor = control.interceptor();

    interceptor
        .dispatch(&OutboundRequest::get(format!("{}/text", base)))
        .await
        .unwrap();
    assert_eq!(records.recv().await.unwrap().response_body, "plain text");

    let binary = interceptor
        .dispatch(&OutboundRequest::get(format!("{}/binary", base)))
        .await
        .unwrap();
    assert_eq!(binary.body.len(), 4);
    assert_eq!(
        records.recv().await.unwrap().response_body,
        UNSUPPORTED_RESPONSE_BODY
    );

    let failed = interceptor
        .dispatch(&OutboundRequest::get(format!("{}/fail", base)))
        .await
        .unwrap();
    assert_eq!(failed.status, 500);
    let record = records.recv().await.unwrap();
    assert_eq!(record.status, 500);
    assert_eq!(record.response_body, json!({"error": "boom"}));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let (control, _hits) = traffic_control();
    let mut records = control.subscribe();

    let result = control
        .interceptor()
        .dispatch(&OutboundRequest::get("http://127.0.0.1:9/nothing-here"))
        .await;
    assert!(matches!(result, Err(Error::Network(_))));

    let record = records.recv().await.unwrap();
    assert_eq!(record.status, 0);
    assert_eq!(record.status_text, "Network Error");
    assert!(record.error.is_some());
    assert!(!record.breakpoint_cancelled);
}

#[tokio::test]
async fn rule_updates_reach_existing_interceptors() {
    let base = start_server().await;
    let (control, _hits) = traffic_control();
    let mut records = control.subscribe();
    let interceptor = control.interceptor();
    let bridge = control.bridge();

    bridge
        .handle(BridgeMessage::MockRulesUpdated(vec![MockRule::new(
            "m1",
            format!("{}/json*", base),
        )
        .with_status(202)
        .with_body(r#"{"mocked":true}"#)]))
        .unwrap();

    let response = interceptor
        .dispatch(&OutboundRequest::get(format!("{}/json?x=1", base)))
        .await
        .unwrap();
    assert_eq!(response.status, 202);
    assert_eq!(response.text(), r#"{"mocked":true}"#);
    assert!(records.recv().await.unwrap().mocked);

    control.rules().save_mock_rules(Vec::new()).unwrap();
    let response = interceptor
        .dispatch(&OutboundRequest::get(format!("{}/json?x=1", base)))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(!records.recv().await.unwrap().mocked);
}

#[tokio::test]
async fn breakpoint_decisions_travel_over_the_bridge() {
    let base = start_server().await;
    let (control, mut hits) = traffic_control();
    let mut records = control.subscribe();
    control
        .rules()
        .save_breakpoint_rules(vec![BreakpointRule::new("bp", "/text").with_method("GET")])
        .unwrap();

    let interceptor = control.interceptor();
    let url = format!("{}/text", base);
    let call = tokio::spawn(async move { interceptor.dispatch(&OutboundRequest::get(url)).await });

    let hit = hits.recv().await.unwrap();
    let outgoing = BridgeMessage::from(hit.clone()).to_json().unwrap();
    let echoed: serde_json::Value = serde_json::from_str(&outgoing).unwrap();
    assert_eq!(echoed["type"], "BREAKPOINT_HIT");
    assert_eq!(echoed["payload"]["id"], hit.id());
    assert_eq!(echoed["payload"]["method"], "GET");

    let reply = json!({"type": "BREAKPOINT_RESPONSE", "payload": {"id": hit.id(), "action": "continue"}});
    control.bridge().handle_json(&reply.to_string()).unwrap();

    let response = call.await.unwrap().unwrap();
    assert_eq!(response.text(), "plain text");
    assert_eq!(records.recv().await.unwrap().id, hit.id());
}

#[tokio::test]
async fn cancelled_breakpoint_is_distinct_from_network_failure() {
    let (control, mut hits) = traffic_control();
    let mut records = control.subscribe();
    let decisions = control.decisions();
    control
        .rules()
        .save_breakpoint_rules(vec![BreakpointRule::new("bp", "*/never-sent")])
        .unwrap();

    let interceptor = control.interceptor();
    let call = tokio::spawn(async move {
        interceptor
            .dispatch(&OutboundRequest::get("http://127.0.0.1:9/never-sent"))
            .await
    });

    let hit = hits.recv().await.unwrap();
    decisions.send(BreakpointDecision::cancel(hit.id())).unwrap();
    decisions.send(BreakpointDecision::proceed(hit.id())).unwrap();

    let error = call.await.unwrap().unwrap_err();
    assert!(error.is_breakpoint_cancellation());
    assert!(!error.is_transport_failure());

    let record = records.recv().await.unwrap();
    assert!(record.breakpoint_cancelled);
    assert_eq!(record.error.as_deref(), Some("Request cancelled by breakpoint"));
    assert_eq!(control.coordinator().pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unanswered_breakpoint_times_out() {
    init_tracing();
    let mut configuration = InterceptorConfiguration::new();
    configuration.set_breakpoint_timeout(Some(Duration::from_secs(60)));
    let (control, _hits) = TrafficControl::new(configuration);
    let mut records = control.subscribe();
    control
        .rules()
        .save_breakpoint_rules(vec![BreakpointRule::new("bp", "slow")])
        .unwrap();

    let result = control
        .interceptor()
        .dispatch(&OutboundRequest::get("http://127.0.0.1:9/slow"))
        .await;
    assert!(matches!(result, Err(Error::BreakpointTimedOut)));

    let record = records.recv().await.unwrap();
    assert!(record.breakpoint_cancelled);
    assert_eq!(record.error.as_deref(), Some("Breakpoint decision timed out"));
}

#[tokio::test]
async fn event_style_calls_land_in_the_capture_log() {
    let base = start_server().await;
    let (control, _hits) = traffic_control();
    let log = control.capture_log(10);
    let (done, loaded) = tokio::sync::oneshot::channel();

    let mut call = control.interceptor().open("post", format!("{}/json", base));
    call.set_request_header("X-Trace", "xhr-7");
    call.on_load(move |response| {
        let _ = done.send(response.status);
    });
    let id = call.id().to_string();
    call.send(Some("raw body".into())).await.unwrap();
    assert_eq!(loaded.await.unwrap(), 200);

    let mut record = None;
    for _ in 0..50 {
        record = log.get(&id);
        if record.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let record = record.expect("record should reach the capture log");
    assert_eq!(record.kind, CallKind::Xhr);
    assert_eq!(record.request_body.as_deref(), Some("raw body"));
    assert_eq!(record.response_body["trace"], "xhr-7");
    assert_eq!(record.response_body["body"], "raw body");
}
