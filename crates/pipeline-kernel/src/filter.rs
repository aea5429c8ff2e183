//! The [`Filter`] trait and its request-time companion, [`RequestContext`].
//!
//! Mirrors the kernel/implementation split used throughout this codebase
//! (trait contracts in the kernel crate, concrete types in the runtime
//! crate): `pipeline-kernel` defines what a filter *is*, and
//! `pipeline-runtime` supplies the concrete filters that implement it.

use crate::spec::FilterSpec;
use async_trait::async_trait;
use std::any::Any;
use thiserror::Error;

/// A lifecycle failure raised by a filter's [`Filter::init`] or
/// [`Filter::inherit`].
///
/// Filters are written and owned outside this crate, so there is no way to
/// give them a shared, richly-typed error enum the way
/// [`crate::error::PipelineError`] covers configuration failures — this is
/// deliberately a message-carrying leaf type. The runtime crate wraps it
/// together with the offending filter's name and kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FilterLifecycleError(pub String);

impl FilterLifecycleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A single filter instance running inside a pipeline generation.
///
/// Implementors are registered with a [`crate::registry::FilterRegistry`]
/// via a factory closure, not constructed directly by the engine — see
/// [`crate::registry::FilterKindDescriptor`].
#[async_trait]
pub trait Filter: Send + Sync + Any {
    /// The registered kind name this instance was built from.
    fn kind(&self) -> &'static str;

    /// Returns `self` as `&dyn Any`, letting [`Filter::inherit`]
    /// implementations downcast `previous` to their own concrete type to
    /// carry over live state (a connection pool, a counter) across a reload.
    fn as_any(&self) -> &dyn Any;

    /// Validates and applies `spec`'s body, readying the filter to handle
    /// requests. Called once, before the owning generation is published.
    async fn init(&mut self, spec: &FilterSpec) -> Result<(), FilterLifecycleError>;

    /// Re-initializes the filter against a new spec during a hot reload,
    /// given the outgoing instance of the same name and kind to hand state
    /// off from. The default implementation just calls [`Filter::init`],
    /// which is correct for any filter with no state worth preserving across
    /// a reload.
    async fn inherit(
        &mut self,
        spec: &FilterSpec,
        _previous: &dyn Filter,
    ) -> Result<(), FilterLifecycleError> {
        self.init(spec).await
    }

    /// Handles one request, returning a result label used to route the
    /// pipeline's flow graph. An empty string is the conventional
    /// "no special result, fall through" label.
    async fn handle(&self, ctx: &mut dyn RequestContext) -> String;

    /// Releases any resources held by this instance. Called on the outgoing
    /// generation's filters once the incoming generation has been published
    /// and every in-flight request against the old generation has returned.
    async fn close(&mut self) {}
}

/// The request/response-scoped state a [`Filter`] can observe and mutate.
///
/// The engine validates only the *names* a flow node declares via
/// [`crate::spec::FlowNode::use_request`] / [`crate::spec::FlowNode::request_id`]
/// / [`crate::spec::FlowNode::response_id`] — it never inspects identifier
/// values, which is why they're represented as opaque [`serde_json::Value`]s
/// here rather than a typed payload the kernel would need to understand.
pub trait RequestContext: Send + Sync {
    /// Appends one entry to this request's pipeline trace
    /// (`"pipeline: name(result,dur)->..."`).
    fn add_tag(&mut self, tag: &str);

    /// Reads a previously-written request/response identifier.
    fn get_identifier(&self, name: &str) -> Option<&serde_json::Value>;

    /// Publishes a request/response identifier for later filters to read.
    fn set_identifier(&mut self, name: &str, value: serde_json::Value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct NoopFilter;

    #[async_trait]
    impl Filter for NoopFilter {
        fn kind(&self) -> &'static str {
            "noop"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        async fn init(&mut self, _spec: &FilterSpec) -> Result<(), FilterLifecycleError> {
            Ok(())
        }

        async fn handle(&self, _ctx: &mut dyn RequestContext) -> String {
            String::new()
        }
    }

    struct MapContext {
        tags: Vec<String>,
        identifiers: HashMap<String, serde_json::Value>,
    }

    impl RequestContext for MapContext {
        fn add_tag(&mut self, tag: &str) {
            self.tags.push(tag.to_string());
        }

        fn get_identifier(&self, name: &str) -> Option<&serde_json::Value> {
            self.identifiers.get(name)
        }

        fn set_identifier(&mut self, name: &str, value: serde_json::Value) {
            self.identifiers.insert(name.to_string(), value);
        }
    }

    #[tokio::test]
    async fn noop_filter_is_object_safe_and_handles() {
        let filter: Box<dyn Filter> = Box::new(NoopFilter);
        let mut ctx = MapContext {
            tags: Vec::new(),
            identifiers: HashMap::new(),
        };
        let label = filter.handle(&mut ctx).await;
        assert_eq!(label, "");
    }

    #[test]
    fn context_round_trips_identifiers_and_tags() {
        let mut ctx = MapContext {
            tags: Vec::new(),
            identifiers: HashMap::new(),
        };
        ctx.add_tag("pipeline: p1(,1ms)->END");
        ctx.set_identifier("user_id", serde_json::json!("u-1"));
        assert_eq!(ctx.tags, vec!["pipeline: p1(,1ms)->END".to_string()]);
        assert_eq!(
            ctx.get_identifier("user_id"),
            Some(&serde_json::json!("u-1"))
        );
        assert_eq!(ctx.get_identifier("missing"), None);
    }
}
