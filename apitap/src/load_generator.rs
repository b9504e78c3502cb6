//! Replaying one request many times and measuring the outcome.

use crate::{
    cancel::CancellationToken,
    data::OutboundRequest,
    dispatcher::Dispatcher,
    error::{Error, Result},
    stats::{self, LoadRun, LoadTestStats},
    util,
};
use futures::future;
use serde::{Deserialize, Serialize};
use std::{ops::RangeInclusive, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, info};

const ITERATIONS: RangeInclusive<u32> = 1..=100;
const CONCURRENCY: RangeInclusive<u32> = 1..=10;
const DELAY_MS: RangeInclusive<u64> = 0..=5000;
const TIMEOUT_MS: RangeInclusive<u64> = 1000..=60000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestConfig {
    pub iterations: u32,
    pub concurrency: u32,
    pub delay_ms: u64,
    pub timeout: u64,
}

impl LoadTestConfig {
    pub fn new(iterations: u32, concurrency: u32) -> Self {
        Self {
            iterations,
            concurrency,
            ..Self::default()
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Copy with every field pulled into its allowed range.
    pub fn clamped(&self) -> Self {
        Self {
            iterations: clamp(self.iterations, &ITERATIONS),
            concurrency: clamp(self.concurrency, &CONCURRENCY),
            delay_ms: clamp(self.delay_ms, &DELAY_MS),
            timeout: clamp(self.timeout, &TIMEOUT_MS),
        }
    }

    /// Rejects out-of-range fields instead of clamping them.
    pub fn validate(&self) -> Result<()> {
        check("iterations", self.iterations, &ITERATIONS)?;
        check("concurrency", self.concurrency, &CONCURRENCY)?;
        check("delayMs", self.delay_ms, &DELAY_MS)?;
        check("timeout", self.timeout, &TIMEOUT_MS)
    }

    /// Sizes of the batches the iterations are split into.
    pub fn batches(&self) -> Vec<usize> {
        let iterations = self.iterations as usize;
        let concurrency = self.concurrency.max(1) as usize;

        (0..iterations)
            .step_by(concurrency)
            .map(|offset| concurrency.min(iterations - offset))
            .collect()
    }
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            concurrency: 1,
            delay_ms: 0,
            timeout: 30000,
        }
    }
}

fn clamp<T: Copy + Ord>(value: T, range: &RangeInclusive<T>) -> T {
    value.max(*range.start()).min(*range.end())
}

fn check<T: Copy + Ord + std::fmt::Display>(
    name: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestResult {
    pub config: LoadTestConfig,
    pub runs: Vec<LoadRun>,
    pub stats: LoadTestStats,
    pub start_time: u64,
    pub end_time: u64,
    /// Set when the run was cancelled, even if the cancellation only aborted calls
    /// of the last batch.
    #[serde(default)]
    pub partial: bool,
}

#[derive(Debug, Clone)]
pub struct LoadGenerator {
    dispatcher: Arc<dyn Dispatcher>,
}

impl LoadGenerator {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Replays `template` according to `config` (clamped first).
    ///
    /// Batches run one after another; calls inside a batch run concurrently.
    /// `on_progress` gets the completed count, the configured total and a snapshot of
    /// the runs so far after every batch. A cancelled run returns what it has.
    pub async fn run<F>(
        &self,
        template: &OutboundRequest,
        config: LoadTestConfig,
        mut on_progress: F,
        cancellation: &CancellationToken,
    ) -> LoadTestResult
    where
        F: FnMut(usize, usize, Vec<LoadRun>),
    {
        let config = config.clamped();
        let total = config.iterations as usize;
        let batches = config.batches();
        let request = Self::replay_request(template);
        let start_time = util::unix_millis();
        let mut runs: Vec<LoadRun> = Vec::with_capacity(total);

        info!(
            url = %request.url,
            method = %request.method,
            iterations = config.iterations,
            concurrency = config.concurrency,
            "load test started"
        );

        for (index, size) in batches.iter().enumerate() {
            if cancellation.is_cancelled() {
                debug!(batch = index, "load test cancelled before batch");
                break;
            }

            let batch = (0..*size).map(|_| self.execute(&request, config.timeout, cancellation));
            runs.extend(future::join_all(batch).await);

            debug!(batch = index, completed = runs.len(), total, "batch finished");
            on_progress(runs.len(), total, runs.clone());

            let more_batches = index + 1 < batches.len();
            if more_batches && config.delay_ms > 0 && !cancellation.is_cancelled() {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(config.delay_ms)) => {}
                    _ = cancellation.cancelled() => {}
                }
            }
        }

        let end_time = util::unix_millis();
        let stats = stats::calculate_stats(&runs, start_time, end_time);
        // calls aborted in the last batch still count as runs
        let partial = cancellation.is_cancelled() || runs.len() < total;

        info!(
            runs = runs.len(),
            successful = stats.successful,
            failed = stats.failed,
            partial,
            "load test finished"
        );

        LoadTestResult {
            config,
            runs,
            stats,
            start_time,
            end_time,
            partial,
        }
    }

    /// GET replays never carry a body.
    fn replay_request(template: &OutboundRequest) -> OutboundRequest {
        let mut request = template.clone();
        request.method = template.normalized_method();
        if request.method == "GET" {
            request.body = None;
        }
        request
    }

    async fn execute(
        &self,
        request: &OutboundRequest,
        timeout_ms: u64,
        cancellation: &CancellationToken,
    ) -> LoadRun {
        let start = Instant::now();
        let timestamp = util::unix_millis();

        let outcome = tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(Error::Aborted),
            result = tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.dispatcher.dispatch(request),
            ) => result.unwrap_or(Err(Error::Timeout(timeout_ms))),
        };
        let duration = util::elapsed_millis(start);

        match outcome {
            Ok(response) => LoadRun {
                status: response.status,
                duration,
                error: None,
                timestamp,
            },
            Err(e) => LoadRun {
                status: 0,
                duration,
                error: Some(e.to_string()),
                timestamp,
            },
        }
    }
}
