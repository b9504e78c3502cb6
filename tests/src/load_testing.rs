use crate::support::{init_tracing, start_server, ScriptedDispatcher};
use apitap::{
    CancellationToken, HistoryStore, InterceptorConfiguration, JsonFileHistory, LoadGenerator,
    LoadTestConfig, MemoryHistory, MockRule, OutboundRequest, SavedLoadTest, TrafficControl,
};
use std::{sync::Arc, time::Duration};

#[tokio::test(start_paused = true)]
async fn every_iteration_runs_in_sequential_batches() {
    init_tracing();
    let dispatcher = Arc::new(ScriptedDispatcher::new(Duration::from_millis(20)));
    let generator = LoadGenerator::new(dispatcher.clone());
    let mut progress = Vec::new();

    let result = generator
        .run(
            &OutboundRequest::get("http://h/api"),
            LoadTestConfig::new(10, 3),
            |completed, total, runs| progress.push((completed, total, runs.len())),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(
        progress,
        vec![(3, 10, 3), (6, 10, 6), (9, 10, 9), (10, 10, 10)]
    );
    assert_eq!(result.runs.len(), 10);
    assert_eq!(dispatcher.calls(), 10);
    assert_eq!(dispatcher.max_in_flight(), 3);
    assert_eq!(result.stats.total, 10);
    assert_eq!(result.stats.successful, 10);
    assert!(!result.partial);
}

#[tokio::test(start_paused = true)]
async fn timed_out_calls_still_count_as_runs() {
    init_tracing();
    let dispatcher =
        Arc::new(ScriptedDispatcher::new(Duration::from_millis(5)).stalling(vec![1, 4, 9]));
    let generator = LoadGenerator::new(dispatcher.clone());

    let result = generator
        .run(
            &OutboundRequest::get("http://h/api"),
            LoadTestConfig::new(10, 3).with_timeout(1000),
            |_, _, _| {},
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.runs.len(), 10);
    let timed_out: Vec<_> = result
        .runs
        .iter()
        .filter(|run| run.error.as_deref() == Some("Request timed out after 1000 ms"))
        .collect();
    assert_eq!(timed_out.len(), 3);
    assert!(timed_out.iter().all(|run| run.status == 0));
    assert_eq!(result.stats.failed, 3);
    assert_eq!(result.stats.successful, 7);
    assert_eq!(result.stats.max_time, 1000);
}

#[tokio::test(start_paused = true)]
async fn cancelling_after_two_batches_keeps_partial_runs() {
    init_tracing();
    let dispatcher = Arc::new(ScriptedDispatcher::new(Duration::from_millis(10)));
    let generator = LoadGenerator::new(dispatcher.clone());
    let cancellation = CancellationToken::new();
    let trigger = cancellation.clone();

    let result = generator
        .run(
            &OutboundRequest::get("http://h/api"),
            LoadTestConfig::new(10, 3).with_delay_ms(500),
            move |completed, _, _| {
                if completed == 6 {
                    trigger.cancel();
                }
            },
            &cancellation,
        )
        .await;

    assert_eq!(result.runs.len(), 6);
    assert_eq!(result.stats.total, 6);
    assert_eq!(dispatcher.calls(), 6);
    assert!(result.partial);
}

#[tokio::test(start_paused = true)]
async fn cancellation_aborts_in_flight_calls() {
    init_tracing();
    let dispatcher = Arc::new(ScriptedDispatcher::new(Duration::from_secs(10)));
    let generator = LoadGenerator::new(dispatcher);
    let cancellation = CancellationToken::new();

    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = generator
        .run(
            &OutboundRequest::get("http://h/api"),
            LoadTestConfig::new(4, 2).with_timeout(30000),
            |_, _, _| {},
            &cancellation,
        )
        .await;

    assert_eq!(result.runs.len(), 2);
    assert!(result
        .runs
        .iter()
        .all(|run| run.error.as_deref() == Some("Request aborted")));
    assert!(result.partial);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_last_batch_is_partial() {
    init_tracing();
    let dispatcher = Arc::new(ScriptedDispatcher::new(Duration::from_secs(10)));
    let generator = LoadGenerator::new(dispatcher);
    let cancellation = CancellationToken::new();

    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = generator
        .run(
            &OutboundRequest::get("http://h/api"),
            LoadTestConfig::new(3, 3),
            |_, _, _| {},
            &cancellation,
        )
        .await;

    assert_eq!(result.runs.len(), 3);
    assert_eq!(result.stats.failed, 3);
    assert!(result.partial);
}

#[tokio::test(start_paused = true)]
async fn delay_separates_batches() {
    init_tracing();
    let dispatcher = Arc::new(ScriptedDispatcher::new(Duration::from_millis(0)));
    let generator = LoadGenerator::new(dispatcher);

    let started = tokio::time::Instant::now();
    let result = generator
        .run(
            &OutboundRequest::get("http://h/api"),
            LoadTestConfig::new(3, 1).with_delay_ms(200),
            |_, _, _| {},
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.runs.len(), 3);
    // two gaps between three batches, none after the last one
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(400));
    assert!(elapsed < Duration::from_millis(600));
}

#[tokio::test]
async fn replays_against_a_real_server_bypass_mocks_and_are_saved() {
    init_tracing();
    let base = start_server().await;
    let (control, _hits) = TrafficControl::new(InterceptorConfiguration::new());
    let mut records = control.subscribe();
    control
        .rules()
        .save_mock_rules(vec![MockRule::new("m", "/json").with_status(299)])
        .unwrap();

    let template = OutboundRequest::new("post", format!("{}/json", base)).with_body("{}");
    let result = control
        .load_generator()
        .run(
            &template,
            LoadTestConfig::new(5, 5),
            |_, _, _| {},
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.runs.len(), 5);
    assert!(result.runs.iter().all(|run| run.status == 200));
    assert_eq!(result.stats.successful, 5);

    for _ in 0..5 {
        let record = records.recv().await.unwrap();
        assert!(!record.mocked);
        assert_eq!(record.status, 200);
    }

    let dir = tempfile::tempdir().unwrap();
    let stores: Vec<Box<dyn HistoryStore>> = vec![
        Box::new(MemoryHistory::new()),
        Box::new(JsonFileHistory::new(dir.path().join("history.json"))),
    ];
    for store in stores {
        let saved = SavedLoadTest::new(template.url.clone(), "POST", result.clone());
        store.save(saved.clone()).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.id);
        assert_eq!(listed[0].result.runs, saved.result.runs);
        assert!(store.delete(&saved.id).unwrap());
        store.clear().unwrap();
    }
}
