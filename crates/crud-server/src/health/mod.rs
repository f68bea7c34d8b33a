//! Health checks
//!
//! [`HealthService`] runs every registered [`HealthIndicator`] and folds the
//! results into one document:
//!
//! ```json
//! {
//!   "status": "error",
//!   "info":    { "ms-disk": { "status": "up", ... } },
//!   "error":   { "memory_rss": { "status": "down", ... } },
//!   "details": { "ms-disk": { ... }, "memory_rss": { ... } }
//! }
//! ```
//!
//! Results are computed fresh on every call.

pub mod indicators;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::HealthConfig;
pub use indicators::{
    DiskIndicator, HealthIndicator, HttpPingIndicator, IndicatorResult, IndicatorStatus,
    MemoryIndicator, MemoryKind,
};

/// Aggregate status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

/// Combined result of a set of indicators
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub info: Map<String, Value>,
    pub error: Map<String, Value>,
    pub details: Map<String, Value>,
}

impl HealthCheckResult {
    pub fn from_results(results: Vec<IndicatorResult>) -> Self {
        let mut info = Map::new();
        let mut error = Map::new();
        let mut details = Map::new();

        for result in results {
            let body = result.to_json();
            if result.is_up() {
                info.insert(result.key.clone(), body.clone());
            } else {
                error.insert(result.key.clone(), body.clone());
            }
            details.insert(result.key, body);
        }

        let status = if error.is_empty() {
            HealthStatus::Ok
        } else {
            HealthStatus::Error
        };

        Self {
            status,
            info,
            error,
            details,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

type Indicator = Arc<dyn HealthIndicator>;

/// Runs the configured health indicators
#[derive(Clone, Default)]
pub struct HealthService {
    disk: Vec<Indicator>,
    memory: Vec<Indicator>,
    other: Vec<Indicator>,
}

impl HealthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disk, heap and RSS checks, plus the HTTP ping when a URL is configured
    pub fn from_config(config: &HealthConfig, client: reqwest::Client) -> Self {
        let mut service = Self::new()
            .with_disk(DiskIndicator::new(
                &config.disk_key,
                &config.disk_path,
                config.disk_threshold,
            ))
            .with_memory(MemoryIndicator::new(
                &config.heap_key,
                MemoryKind::Heap,
                config.heap_threshold_bytes,
            ))
            .with_memory(MemoryIndicator::new(
                &config.rss_key,
                MemoryKind::Rss,
                config.rss_threshold_bytes,
            ));

        if let Some(url) = &config.ping_url {
            service = service.with_indicator(HttpPingIndicator::new(&config.ping_key, url, client));
        }

        service
    }

    pub fn with_disk(mut self, indicator: impl HealthIndicator + 'static) -> Self {
        self.disk.push(Arc::new(indicator));
        self
    }

    pub fn with_memory(mut self, indicator: impl HealthIndicator + 'static) -> Self {
        self.memory.push(Arc::new(indicator));
        self
    }

    pub fn with_indicator(mut self, indicator: impl HealthIndicator + 'static) -> Self {
        self.other.push(Arc::new(indicator));
        self
    }

    async fn run<'a>(indicators: impl IntoIterator<Item = &'a Indicator>) -> HealthCheckResult {
        let results = join_all(indicators.into_iter().map(|i| i.check())).await;
        HealthCheckResult::from_results(results)
    }

    /// Every indicator
    pub async fn check(&self) -> HealthCheckResult {
        let result = Self::run(self.disk.iter().chain(&self.memory).chain(&self.other)).await;
        if !result.is_healthy() {
            tracing::warn!(failing = ?result.error.keys().collect::<Vec<_>>(), "Health check failed");
        }
        result
    }

    pub async fn check_disk(&self) -> HealthCheckResult {
        Self::run(&self.disk).await
    }

    pub async fn check_memory(&self) -> HealthCheckResult {
        Self::run(&self.memory).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed {
        key: &'static str,
        up: bool,
    }

    #[async_trait]
    impl HealthIndicator for Fixed {
        fn key(&self) -> &str {
            self.key
        }

        async fn check(&self) -> IndicatorResult {
            let details = Map::new();
            if self.up {
                IndicatorResult::up(self.key, details)
            } else {
                IndicatorResult::down(self.key, details)
            }
        }
    }

    #[tokio::test]
    async fn test_all_up_is_ok() {
        let service = HealthService::new()
            .with_disk(Fixed { key: "ms-disk", up: true })
            .with_memory(Fixed { key: "memory_heap", up: true });

        let result = service.check().await;
        assert_eq!(result.status, HealthStatus::Ok);
        assert!(result.error.is_empty());
        assert_eq!(result.info.len(), 2);
        assert_eq!(result.details["ms-disk"], json!({ "status": "up" }));
    }

    #[tokio::test]
    async fn test_any_down_is_error() {
        let service = HealthService::new()
            .with_disk(Fixed { key: "ms-disk", up: true })
            .with_memory(Fixed { key: "memory_rss", up: false })
            .with_indicator(Fixed { key: "http-ping", up: true });

        let result = service.check().await;
        assert_eq!(result.status, HealthStatus::Error);
        assert_eq!(result.error.keys().collect::<Vec<_>>(), vec!["memory_rss"]);
        assert_eq!(result.details.len(), 3);

        let serialized = serde_json::to_value(&result).unwrap();
        assert_eq!(serialized["status"], "error");
        assert_eq!(serialized["error"]["memory_rss"]["status"], "down");
    }

    #[tokio::test]
    async fn test_partial_checks() {
        let service = HealthService::new()
            .with_disk(Fixed { key: "ms-disk", up: false })
            .with_memory(Fixed { key: "memory_heap", up: true });

        let disk = service.check_disk().await;
        assert!(!disk.is_healthy());
        assert!(disk.details.contains_key("ms-disk"));
        assert!(!disk.details.contains_key("memory_heap"));

        let memory = service.check_memory().await;
        assert!(memory.is_healthy());
        assert!(memory.details.contains_key("memory_heap"));
    }

    #[test]
    fn test_from_config_registers_ping_only_when_configured() {
        let mut config = crate::config::Config::default().health;
        let service = HealthService::from_config(&config, reqwest::Client::new());
        assert!(service.other.is_empty());
        assert_eq!(service.memory.len(), 2);

        config.ping_url = Some("http://localhost:9/health".to_string());
        let service = HealthService::from_config(&config, reqwest::Client::new());
        assert_eq!(service.other.len(), 1);
        assert_eq!(service.other[0].key(), config.ping_key);
    }
}
