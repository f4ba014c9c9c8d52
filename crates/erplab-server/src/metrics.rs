//! Request metrics.
//!
//! Two sinks are fed by the same middleware:
//! - Prometheus counters and histograms, rendered at `/metrics`
//! - [`RequestMetrics`], a bounded in-memory ring of recent requests behind
//!   the `/health/metrics` endpoints

use std::collections::{HashMap, VecDeque};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::MetricsConfig;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    pub const HTTP_SLOW_REQUESTS_TOTAL: &str = "http_slow_requests_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: /metrics is served by the router itself
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }
            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record an HTTP request in Prometheus.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration, slow: bool) {
    let status_class = match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    };
    let normalized_path = normalize_path(path);

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => normalized_path.clone(),
        "status" => status.to_string(),
        "status_class" => status_class.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => normalized_path.clone()
    )
    .record(duration.as_secs_f64());

    if slow {
        counter!(names::HTTP_SLOW_REQUESTS_TOTAL, "path" => normalized_path).increment(1);
    }
}

/// Replaces identifiers in a path with `{id}` to keep label cardinality low.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|part| if is_likely_id(part) { "{id}" } else { part })
        .collect::<Vec<_>>()
        .join("/")
}

/// UUIDs, numbers (CPF, CEP, IBGE codes) and long opaque tokens.
fn is_likely_id(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s.len() == 36 && s.chars().filter(|c| *c == '-').count() == 4 {
        return true;
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    s.len() > 24 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// =============================================================================
// Request ring buffer
// =============================================================================

/// One handled request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub method: String,
    pub url: String,
    /// Milliseconds.
    pub duration: u64,
    pub status_code: u16,
    pub ip: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    /// Seconds since start or the last reset.
    pub uptime: u64,
    pub requests: RequestSummary,
    pub background: BackgroundActivity,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuMetrics {
    pub cores: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryMetrics {
    /// Resident set size in MB; `null` where the platform does not expose it.
    pub rss: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub total: usize,
    pub avg_duration: u64,
    pub slow_requests: usize,
    pub recent_requests: Vec<RequestRecord>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundActivity {
    pub last_activity: Option<DateTime<Utc>>,
    pub inactivity_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDuration {
    pub url: String,
    pub count: usize,
    pub avg_duration: u64,
    pub max_duration: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointCount {
    pub url: String,
    pub count: usize,
}

const RECENT_REQUESTS: usize = 50;

struct Ring {
    entries: VecDeque<RequestRecord>,
    started: Instant,
    last_activity: Option<(Instant, DateTime<Utc>)>,
}

/// Bounded log of the most recent requests.
///
/// When full, the oldest entry is dropped.
pub struct RequestMetrics {
    ring: Mutex<Ring>,
    capacity: usize,
    slow_threshold_ms: u64,
}

impl RequestMetrics {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(config.capacity),
                started: Instant::now(),
                last_activity: None,
            }),
            capacity: config.capacity.max(1),
            slow_threshold_ms: config.slow_threshold_ms,
        }
    }

    pub fn slow_threshold_ms(&self) -> u64 {
        self.slow_threshold_ms
    }

    pub fn is_slow(&self, duration_ms: u64) -> bool {
        duration_ms > self.slow_threshold_ms
    }

    pub fn record(&self, record: RequestRecord) {
        if self.is_slow(record.duration) {
            tracing::warn!(
                method = %record.method,
                url = %record.url,
                duration_ms = record.duration,
                status = record.status_code,
                "slow request"
            );
        }
        let mut ring = self.ring.lock();
        if ring.entries.len() == self.capacity {
            ring.entries.pop_front();
        }
        ring.last_activity = Some((Instant::now(), record.timestamp));
        ring.entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.ring.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn system_metrics(&self) -> SystemMetrics {
        let ring = self.ring.lock();
        let total = ring.entries.len();
        let sum: u64 = ring.entries.iter().map(|r| r.duration).sum();
        let avg_duration = if total > 0 {
            (sum as f64 / total as f64).round() as u64
        } else {
            0
        };
        let slow_requests = ring
            .entries
            .iter()
            .filter(|r| self.is_slow(r.duration))
            .count();
        let recent_requests = ring
            .entries
            .iter()
            .rev()
            .take(RECENT_REQUESTS)
            .cloned()
            .collect();

        SystemMetrics {
            cpu: CpuMetrics {
                cores: num_cpus::get(),
            },
            memory: MemoryMetrics {
                rss: resident_memory_mb(),
            },
            uptime: ring.started.elapsed().as_secs(),
            requests: RequestSummary {
                total,
                avg_duration,
                slow_requests,
                recent_requests,
            },
            background: background(&ring),
        }
    }

    pub fn background_activity(&self) -> BackgroundActivity {
        background(&self.ring.lock())
    }

    /// Requests slower than the threshold, slowest first.
    pub fn slow_requests(&self, limit: usize) -> Vec<RequestRecord> {
        let ring = self.ring.lock();
        let mut slow: Vec<RequestRecord> = ring
            .entries
            .iter()
            .filter(|r| self.is_slow(r.duration))
            .cloned()
            .collect();
        slow.sort_by(|a, b| b.duration.cmp(&a.duration));
        slow.truncate(limit);
        slow
    }

    /// Per-url duration stats, highest average first.
    pub fn slowest_endpoints(&self, limit: usize) -> Vec<EndpointDuration> {
        let ring = self.ring.lock();
        let mut stats: HashMap<&str, (usize, u64, u64)> = HashMap::new();
        for r in &ring.entries {
            let entry = stats.entry(r.url.as_str()).or_default();
            entry.0 += 1;
            entry.1 += r.duration;
            entry.2 = entry.2.max(r.duration);
        }
        let mut endpoints: Vec<EndpointDuration> = stats
            .into_iter()
            .map(|(url, (count, total, max))| EndpointDuration {
                url: url.to_string(),
                count,
                avg_duration: (total as f64 / count as f64).round() as u64,
                max_duration: max,
            })
            .collect();
        endpoints.sort_by(|a, b| {
            b.avg_duration
                .cmp(&a.avg_duration)
                .then_with(|| a.url.cmp(&b.url))
        });
        endpoints.truncate(limit);
        endpoints
    }

    /// Request count per url, most called first.
    pub fn most_called(&self, limit: usize) -> Vec<EndpointCount> {
        let ring = self.ring.lock();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for r in &ring.entries {
            *counts.entry(r.url.as_str()).or_default() += 1;
        }
        let mut endpoints: Vec<EndpointCount> = counts
            .into_iter()
            .map(|(url, count)| EndpointCount {
                url: url.to_string(),
                count,
            })
            .collect();
        endpoints.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.url.cmp(&b.url)));
        endpoints.truncate(limit);
        endpoints
    }

    /// Clears the buffer and restarts the uptime clock.
    pub fn reset(&self) {
        tracing::info!("resetting request metrics");
        let mut ring = self.ring.lock();
        ring.entries.clear();
        ring.started = Instant::now();
    }
}

fn background(ring: &Ring) -> BackgroundActivity {
    let since = ring
        .last_activity
        .map_or(ring.started, |(instant, _)| instant);
    BackgroundActivity {
        last_activity: ring.last_activity.map(|(_, at)| at),
        inactivity_seconds: since.elapsed().as_secs(),
    }
}

#[cfg(target_os = "linux")]
fn resident_memory_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let kb: u64 = status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))?
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb / 1024)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_mb() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(capacity: usize) -> RequestMetrics {
        RequestMetrics::new(MetricsConfig {
            capacity,
            slow_threshold_ms: 1000,
        })
    }

    fn req(url: &str, duration: u64) -> RequestRecord {
        RequestRecord {
            method: "GET".into(),
            url: url.into(),
            duration,
            status_code: 200,
            ip: "127.0.0.1".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn ring_drops_oldest_when_full() {
        let m = metrics(3);
        for i in 0..5 {
            m.record(req(&format!("/r{i}"), 10));
        }
        assert_eq!(m.len(), 3);
        let recent = m.system_metrics().requests.recent_requests;
        let urls: Vec<_> = recent.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["/r4", "/r3", "/r2"]);
    }

    #[test]
    fn summary_rounds_average_and_counts_slow() {
        let m = metrics(10);
        m.record(req("/a", 10));
        m.record(req("/a", 15));
        m.record(req("/b", 1500));
        let summary = m.system_metrics().requests;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.avg_duration, 508);
        assert_eq!(summary.slow_requests, 1);
    }

    #[test]
    fn threshold_itself_is_not_slow() {
        let m = metrics(10);
        m.record(req("/limite", 1000));
        m.record(req("/lento", 1001));
        let slow = m.slow_requests(50);
        assert_eq!(slow.len(), 1);
        assert_eq!(slow[0].url, "/lento");
    }

    #[test]
    fn slow_requests_sorted_desc_and_limited() {
        let m = metrics(10);
        for d in [1200, 3000, 1100, 2000] {
            m.record(req("/x", d));
        }
        let slow: Vec<_> = m.slow_requests(3).into_iter().map(|r| r.duration).collect();
        assert_eq!(slow, [3000, 2000, 1200]);
    }

    #[test]
    fn endpoints_grouped_by_url() {
        let m = metrics(10);
        m.record(req("/a", 100));
        m.record(req("/a", 300));
        m.record(req("/b", 50));
        m.record(req("/b", 50));
        m.record(req("/b", 50));

        let slowest = m.slowest_endpoints(10);
        assert_eq!(
            slowest[0],
            EndpointDuration {
                url: "/a".into(),
                count: 2,
                avg_duration: 200,
                max_duration: 300
            }
        );
        let most = m.most_called(1);
        assert_eq!(
            most,
            [EndpointCount {
                url: "/b".into(),
                count: 3
            }]
        );
    }

    #[test]
    fn reset_clears_buffer_but_keeps_last_activity() {
        let m = metrics(10);
        m.record(req("/a", 5));
        m.reset();
        assert!(m.is_empty());
        assert_eq!(m.system_metrics().requests.total, 0);
        assert!(m.background_activity().last_activity.is_some());
    }

    #[test]
    fn serializes_in_camel_case() {
        let m = metrics(10);
        m.record(req("/a", 5));
        let json = serde_json::to_value(m.system_metrics()).unwrap();
        assert!(json["requests"]["avgDuration"].is_u64());
        assert!(json["requests"]["recentRequests"][0]["statusCode"].is_u64());
        assert!(json["background"]["inactivitySeconds"].is_u64());
        assert!(json["cpu"]["cores"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/pacientes/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/pacientes/{id}"
        );
        assert_eq!(normalize_path("/api/v1/cep/01001000"), "/api/v1/cep/{id}");
        assert_eq!(normalize_path("/api/v1/pacientes/stats"), "/api/v1/pacientes/stats");
    }

    #[test]
    fn test_is_likely_id() {
        assert!(is_likely_id("12345"));
        assert!(is_likely_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_likely_id("pacientes"));
        assert!(!is_likely_id(""));
        assert!(!is_likely_id("v1"));
    }
}
