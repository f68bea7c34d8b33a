//! Individual health checks

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Up or down, as reported for one indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorStatus {
    Up,
    Down,
}

/// Result of a single check
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorResult {
    pub key: String,
    pub status: IndicatorStatus,
    pub details: Map<String, Value>,
}

impl IndicatorResult {
    pub fn up(key: impl Into<String>, details: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            status: IndicatorStatus::Up,
            details,
        }
    }

    pub fn down(key: impl Into<String>, details: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            status: IndicatorStatus::Down,
            details,
        }
    }

    fn status_if(healthy: bool) -> IndicatorStatus {
        if healthy {
            IndicatorStatus::Up
        } else {
            IndicatorStatus::Down
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == IndicatorStatus::Up
    }

    /// `{"status": "up", ...details}`
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("status".to_string(), json!(self.status));
        body.extend(self.details.clone());
        Value::Object(body)
    }
}

fn details(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// One named health check
#[async_trait]
pub trait HealthIndicator: Send + Sync {
    fn key(&self) -> &str;

    async fn check(&self) -> IndicatorResult;
}

/// Fails when the used fraction of the filesystem holding `path` exceeds
/// `threshold` (0.0 to 1.0).
pub struct DiskIndicator {
    key: String,
    path: PathBuf,
    threshold: f64,
}

impl DiskIndicator {
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            threshold,
        }
    }
}

#[async_trait]
impl HealthIndicator for DiskIndicator {
    fn key(&self) -> &str {
        &self.key
    }

    async fn check(&self) -> IndicatorResult {
        let space = fs2::total_space(&self.path)
            .and_then(|total| fs2::available_space(&self.path).map(|available| (total, available)));

        match space {
            Ok((total, available)) => {
                let used = if total == 0 {
                    0.0
                } else {
                    1.0 - available as f64 / total as f64
                };
                IndicatorResult {
                    key: self.key.clone(),
                    status: IndicatorResult::status_if(used <= self.threshold),
                    details: details(json!({
                        "path": self.path.display().to_string(),
                        "usedPercent": (used * 10_000.0).round() / 100.0,
                        "thresholdPercent": self.threshold * 100.0,
                    })),
                }
            },
            Err(e) => IndicatorResult::down(
                &self.key,
                details(json!({
                    "path": self.path.display().to_string(),
                    "message": e.to_string(),
                })),
            ),
        }
    }
}

/// Process memory figure checked by [`MemoryIndicator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Data segment size, the closest analogue of a managed heap
    Heap,
    /// Resident set size
    Rss,
}

/// Fails when process memory exceeds `threshold_bytes`
pub struct MemoryIndicator {
    key: String,
    kind: MemoryKind,
    threshold_bytes: u64,
}

impl MemoryIndicator {
    pub fn new(key: impl Into<String>, kind: MemoryKind, threshold_bytes: u64) -> Self {
        Self {
            key: key.into(),
            kind,
            threshold_bytes,
        }
    }
}

/// Reads a `kB` field such as `VmRSS` from `/proc/self/status`, in bytes
fn proc_status_bytes(field: &str) -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_status_field(&status, field)
}

fn parse_status_field(status: &str, field: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let rest = line.strip_prefix(field)?.strip_prefix(':')?;
        let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
        Some(kb * 1024)
    })
}

pub fn process_memory_bytes(kind: MemoryKind) -> Option<u64> {
    match kind {
        MemoryKind::Heap => proc_status_bytes("VmData").or_else(|| proc_status_bytes("VmRSS")),
        MemoryKind::Rss => proc_status_bytes("VmRSS"),
    }
}

#[async_trait]
impl HealthIndicator for MemoryIndicator {
    fn key(&self) -> &str {
        &self.key
    }

    async fn check(&self) -> IndicatorResult {
        match process_memory_bytes(self.kind) {
            Some(used) => IndicatorResult {
                key: self.key.clone(),
                status: IndicatorResult::status_if(used <= self.threshold_bytes),
                details: details(json!({
                    "usedBytes": used,
                    "thresholdBytes": self.threshold_bytes,
                })),
            },
            // No procfs on this platform; nothing to measure.
            None => IndicatorResult::up(
                &self.key,
                details(json!({ "message": "memory usage unavailable on this platform" })),
            ),
        }
    }
}

/// Fails unless a GET to `url` answers with a 2xx status
pub struct HttpPingIndicator {
    key: String,
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPingIndicator {
    pub fn new(key: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
            client,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl HealthIndicator for HttpPingIndicator {
    fn key(&self) -> &str {
        &self.key
    }

    async fn check(&self) -> IndicatorResult {
        match self.client.get(&self.url).timeout(self.timeout).send().await {
            Ok(response) if response.status().is_success() => IndicatorResult::up(
                &self.key,
                details(json!({ "url": self.url, "statusCode": response.status().as_u16() })),
            ),
            Ok(response) => IndicatorResult::down(
                &self.key,
                details(json!({
                    "url": self.url,
                    "statusCode": response.status().as_u16(),
                    "message": format!("unexpected status {}", response.status()),
                })),
            ),
            Err(e) => IndicatorResult::down(
                &self.key,
                details(json!({ "url": self.url, "message": e.to_string() })),
            ),
        }
    }
}
