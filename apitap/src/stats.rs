use serde::{Deserialize, Serialize};

/// Outcome of one replayed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRun {
    pub status: u16,
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: u64,
}

impl LoadRun {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..400).contains(&self.status)
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 400 || self.status == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub min_time: u64,
    pub max_time: u64,
    pub avg_time: f64,
    pub median_time: u64,
    pub p95_time: u64,
    pub p99_time: u64,
    pub requests_per_second: f64,
}

/// Value at index `clamp(ceil(p/100 * n) - 1, 0, n - 1)` of an ascending slice, 0 if empty.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }

    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as i64 - 1;
    let index = rank.max(0).min(sorted.len() as i64 - 1) as usize;
    sorted[index]
}

/// Aggregates runs observed between `start` and `end` (unix ms).
pub fn calculate_stats(runs: &[LoadRun], start: u64, end: u64) -> LoadTestStats {
    let mut durations: Vec<u64> = runs.iter().map(|run| run.duration).collect();
    durations.sort_unstable();

    let total = runs.len();
    let successful = runs.iter().filter(|run| run.is_success()).count();
    let failed = runs.iter().filter(|run| run.is_failure()).count();

    let avg_time = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    };

    let elapsed_seconds = end.saturating_sub(start) as f64 / 1000.0;
    let requests_per_second = if elapsed_seconds > 0.0 {
        total as f64 / elapsed_seconds
    } else {
        0.0
    };

    LoadTestStats {
        total,
        successful,
        failed,
        min_time: durations.first().copied().unwrap_or(0),
        max_time: durations.last().copied().unwrap_or(0),
        avg_time,
        median_time: percentile(&durations, 50.0),
        p95_time: percentile(&durations, 95.0),
        p99_time: percentile(&durations, 99.0),
        requests_per_second,
    }
}
