//! `fixed_upstream` — writes a statically-configured upstream address to a
//! request identifier for later filters (or the surrounding HTTP layer) to
//! read, and records the simulated round trip into its own [`HttpStat`].
//! Demonstrates a filter that only writes, never reads, a request
//! identifier; that a proxy-style filter pushes one [`Metric`] per request
//! into an [`HttpStat`] it owns; and whose own reload behavior is simple
//! replacement (no state worth carrying over, so it relies on
//! [`Filter::inherit`]'s default implementation).

use async_trait::async_trait;
use parking_lot::RwLock;
use pipeline_kernel::filter::{Filter, FilterLifecycleError, RequestContext};
use pipeline_kernel::spec::FilterSpec;
use pipeline_kernel::stat::{HttpStat, Metric};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

/// The identifier this filter publishes.
pub const UPSTREAM_IDENTIFIER: &str = "upstream";

/// Publishes a fixed upstream address configured via the `upstream` body
/// field, and records one [`Metric`] per request into its own [`HttpStat`].
pub struct FixedUpstreamFilter {
    upstream: RwLock<String>,
    stats: Arc<HttpStat>,
}

impl FixedUpstreamFilter {
    pub fn new() -> Self {
        Self {
            upstream: RwLock::new(String::new()),
            stats: Arc::new(HttpStat::new()),
        }
    }

    /// This instance's traffic statistics, for the surrounding process to
    /// sample on its own cadence (see [`HttpStat::status`]'s tick contract).
    pub fn stats(&self) -> Arc<HttpStat> {
        Arc::clone(&self.stats)
    }
}

impl Default for FixedUpstreamFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates a `fixed_upstream` body at Phase F.
pub fn validate_body(body: &serde_json::Value) -> Result<(), String> {
    match body.get("upstream").and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err("fixed_upstream body must have a non-empty string field 'upstream'".to_string()),
    }
}

#[async_trait]
impl Filter for FixedUpstreamFilter {
    fn kind(&self) -> &'static str {
        "fixed_upstream"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn init(&mut self, spec: &FilterSpec) -> Result<(), FilterLifecycleError> {
        let upstream = spec
            .body
            .get("upstream")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                FilterLifecycleError::new("fixed_upstream body must have a string field 'upstream'")
            })?;
        *self.upstream.write() = upstream.to_string();
        Ok(())
    }

    async fn handle(&self, ctx: &mut dyn RequestContext) -> String {
        let start = Instant::now();
        let upstream = self.upstream.read().clone();
        let resp_size = upstream.len() as u64;
        ctx.set_identifier(UPSTREAM_IDENTIFIER, serde_json::Value::String(upstream));
        self.stats.stat(Metric::new(200, start.elapsed().as_millis() as u64, 0, resp_size));
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapContext(HashMap<String, serde_json::Value>);
    impl RequestContext for MapContext {
        fn add_tag(&mut self, _tag: &str) {}
        fn get_identifier(&self, name: &str) -> Option<&serde_json::Value> {
            self.0.get(name)
        }
        fn set_identifier(&mut self, name: &str, value: serde_json::Value) {
            self.0.insert(name.to_string(), value);
        }
    }

    #[tokio::test]
    async fn publishes_configured_upstream() {
        let mut filter = FixedUpstreamFilter::new();
        let spec = FilterSpec {
            name: "u".to_string(),
            kind: "fixed_upstream".to_string(),
            body: serde_json::json!({ "upstream": "http://backend:8080" }),
        };
        filter.init(&spec).await.unwrap();

        let mut ctx = MapContext(HashMap::new());
        filter.handle(&mut ctx).await;
        assert_eq!(
            ctx.get_identifier(UPSTREAM_IDENTIFIER),
            Some(&serde_json::json!("http://backend:8080"))
        );
    }

    #[tokio::test]
    async fn records_a_metric_into_its_own_stats_per_request() {
        let mut filter = FixedUpstreamFilter::new();
        let spec = FilterSpec {
            name: "u".to_string(),
            kind: "fixed_upstream".to_string(),
            body: serde_json::json!({ "upstream": "http://backend:8080" }),
        };
        filter.init(&spec).await.unwrap();
        let stats = filter.stats();

        let mut ctx = MapContext(HashMap::new());
        filter.handle(&mut ctx).await;
        filter.handle(&mut ctx).await;

        let status = stats.status();
        assert_eq!(status.count, 2);
        assert_eq!(status.err_count, 0);
    }

    #[tokio::test]
    async fn rejects_missing_upstream_field() {
        let mut filter = FixedUpstreamFilter::new();
        let spec = FilterSpec {
            name: "u".to_string(),
            kind: "fixed_upstream".to_string(),
            body: serde_json::json!({}),
        };
        assert!(filter.init(&spec).await.is_err());
    }

    #[test]
    fn validate_body_rejects_empty_upstream() {
        assert!(validate_body(&serde_json::json!({ "upstream": "" })).is_err());
    }

    #[test]
    fn validate_body_accepts_non_empty_upstream() {
        assert!(validate_body(&serde_json::json!({ "upstream": "http://x" })).is_ok());
    }
}
