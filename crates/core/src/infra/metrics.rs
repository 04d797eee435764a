use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::error::ErrorCode;

const MAX_LATENCY_RECORDS: usize = 1000;

/// ローカルメトリクス収集器
pub struct Metrics {
    counters: Mutex<MetricsCounters>,
    latencies: Mutex<Vec<LatencyRecord>>,
}

#[derive(Debug, Default)]
struct MetricsCounters {
    turns_started: u64,
    turns_completed: u64,
    turns_failed: u64,
    utterances_dropped: u64,
    stops_ignored: u64,
    completions_served: u64,
    errors_capability: u64,
    errors_recognition: u64,
    errors_transport: u64,
    errors_provider: u64,
    errors_unexpected_response: u64,
    errors_internal: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyRecord {
    pub phase: String,
    pub duration_ms: u64,
    pub timestamp: String,
}

/// メトリクスサマリー（UI / API に返す用）
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub turns_started: u64,
    pub turns_completed: u64,
    pub turns_failed: u64,
    pub utterances_dropped: u64,
    pub stops_ignored: u64,
    pub completions_served: u64,
    pub error_counts: ErrorCounts,
    pub avg_latency_ms: AvgLatency,
    pub recent_latencies: Vec<LatencyRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorCounts {
    pub capability: u64,
    pub recognition: u64,
    pub transport: u64,
    pub provider: u64,
    pub unexpected_response: u64,
    pub internal: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvgLatency {
    pub completion: Option<f64>,
    pub turn: Option<f64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(MetricsCounters::default()),
            latencies: Mutex::new(Vec::new()),
        }
    }

    pub fn inc_turns_started(&self) {
        self.counters.lock().turns_started += 1;
    }

    pub fn inc_turns_completed(&self) {
        self.counters.lock().turns_completed += 1;
    }

    pub fn inc_turns_failed(&self) {
        self.counters.lock().turns_failed += 1;
    }

    pub fn inc_utterances_dropped(&self) {
        self.counters.lock().utterances_dropped += 1;
    }

    pub fn inc_stops_ignored(&self) {
        self.counters.lock().stops_ignored += 1;
    }

    pub fn inc_completions_served(&self) {
        self.counters.lock().completions_served += 1;
    }

    pub fn inc_error(&self, code: ErrorCode) {
        let mut c = self.counters.lock();
        match code {
            ErrorCode::CapabilityUnavailable => c.errors_capability += 1,
            ErrorCode::Recognition => c.errors_recognition += 1,
            ErrorCode::Transport => c.errors_transport += 1,
            ErrorCode::Provider => c.errors_provider += 1,
            ErrorCode::UnexpectedResponse => c.errors_unexpected_response += 1,
            ErrorCode::InvalidState | ErrorCode::Internal => c.errors_internal += 1,
        }
    }

    pub fn record_latency(&self, phase: &str, duration_ms: u64) {
        let record = LatencyRecord {
            phase: phase.to_string(),
            duration_ms,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let mut latencies = self.latencies.lock();
        latencies.push(record);
        // 最新1000件のみ保持
        if latencies.len() > MAX_LATENCY_RECORDS {
            let excess = latencies.len() - MAX_LATENCY_RECORDS;
            latencies.drain(0..excess);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let c = self.counters.lock();
        let latencies = self.latencies.lock();

        let avg = |phase: &str| -> Option<f64> {
            let vals: Vec<f64> = latencies
                .iter()
                .filter(|r| r.phase == phase)
                .map(|r| r.duration_ms as f64)
                .collect();
            if vals.is_empty() {
                None
            } else {
                Some(vals.iter().sum::<f64>() / vals.len() as f64)
            }
        };

        let recent: Vec<LatencyRecord> = latencies.iter().rev().take(20).cloned().collect();

        MetricsSummary {
            turns_started: c.turns_started,
            turns_completed: c.turns_completed,
            turns_failed: c.turns_failed,
            utterances_dropped: c.utterances_dropped,
            stops_ignored: c.stops_ignored,
            completions_served: c.completions_served,
            error_counts: ErrorCounts {
                capability: c.errors_capability,
                recognition: c.errors_recognition,
                transport: c.errors_transport,
                provider: c.errors_provider,
                unexpected_response: c.errors_unexpected_response,
                internal: c.errors_internal,
            },
            avg_latency_ms: AvgLatency {
                completion: avg("completion"),
                turn: avg("turn"),
            },
            recent_latencies: recent,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
