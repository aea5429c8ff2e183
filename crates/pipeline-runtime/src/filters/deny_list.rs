//! `deny_list` — rejects requests whose `client_id` identifier matches a
//! configured list of blocked values. Demonstrates a filter that reads a
//! context identifier and returns a non-empty result label for `jumpIf`
//! routing (typically wired to jump straight to `END`).

use async_trait::async_trait;
use parking_lot::RwLock;
use pipeline_kernel::filter::{Filter, FilterLifecycleError, RequestContext};
use pipeline_kernel::spec::FilterSpec;
use std::any::Any;
use std::collections::HashSet;

/// Result label returned when the request's `client_id` is on the list.
pub const DENY: &str = "deny";

/// Denies requests whose `client_id` identifier is in a configured set.
pub struct DenyListFilter {
    denied: RwLock<HashSet<String>>,
}

impl DenyListFilter {
    pub fn new() -> Self {
        Self {
            denied: RwLock::new(HashSet::new()),
        }
    }

    fn apply_body(&self, body: &serde_json::Value) -> Result<(), FilterLifecycleError> {
        let entries = body
            .get("denied")
            .and_then(|v| v.as_array())
            .ok_or_else(|| FilterLifecycleError::new("deny_list body must have an array field 'denied'"))?;

        let mut denied = HashSet::with_capacity(entries.len());
        for entry in entries {
            let value = entry
                .as_str()
                .ok_or_else(|| FilterLifecycleError::new("deny_list entries must be strings"))?;
            denied.insert(value.to_string());
        }
        *self.denied.write() = denied;
        Ok(())
    }
}

impl Default for DenyListFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates a `deny_list` body at Phase F, before any instance exists.
pub fn validate_body(body: &serde_json::Value) -> Result<(), String> {
    let entries = body
        .get("denied")
        .and_then(|v| v.as_array())
        .ok_or("deny_list body must have an array field 'denied'")?;
    for entry in entries {
        if !entry.is_string() {
            return Err("deny_list entries must be strings".to_string());
        }
    }
    Ok(())
}

#[async_trait]
impl Filter for DenyListFilter {
    fn kind(&self) -> &'static str {
        "deny_list"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn init(&mut self, spec: &FilterSpec) -> Result<(), FilterLifecycleError> {
        self.apply_body(&spec.body)
    }

    async fn handle(&self, ctx: &mut dyn RequestContext) -> String {
        let blocked = match ctx.get_identifier("client_id") {
            Some(serde_json::Value::String(id)) => self.denied.read().contains(id),
            _ => false,
        };
        if blocked {
            DENY.to_string()
        } else {
            String::new()
        }
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

    async fn filter_with(denied: &[&str]) -> DenyListFilter {
        let mut f = DenyListFilter::new();
        let spec = FilterSpec {
            name: "d".to_string(),
            kind: "deny_list".to_string(),
            body: serde_json::json!({ "denied": denied }),
        };
        f.init(&spec).await.unwrap();
        f
    }

    #[tokio::test]
    async fn allows_unlisted_client() {
        let filter = filter_with(&["bad-1"]).await;
        let mut ctx = MapContext(HashMap::from([(
            "client_id".to_string(),
            serde_json::json!("good-1"),
        )]));
        assert_eq!(filter.handle(&mut ctx).await, "");
    }

    #[tokio::test]
    async fn denies_listed_client() {
        let filter = filter_with(&["bad-1"]).await;
        let mut ctx = MapContext(HashMap::from([(
            "client_id".to_string(),
            serde_json::json!("bad-1"),
        )]));
        assert_eq!(filter.handle(&mut ctx).await, DENY);
    }

    #[tokio::test]
    async fn allows_when_identifier_absent() {
        let filter = filter_with(&["bad-1"]).await;
        let mut ctx = MapContext(HashMap::new());
        assert_eq!(filter.handle(&mut ctx).await, "");
    }

    #[test]
    fn validate_body_rejects_missing_field() {
        assert!(validate_body(&serde_json::json!({})).is_err());
    }

    #[test]
    fn validate_body_rejects_non_string_entries() {
        assert!(validate_body(&serde_json::json!({ "denied": [1, 2] })).is_err());
    }

    #[test]
    fn validate_body_accepts_string_array() {
        assert!(validate_body(&serde_json::json!({ "denied": ["a", "b"] })).is_ok());
    }
}
