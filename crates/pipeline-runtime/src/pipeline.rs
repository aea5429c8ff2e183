//! [`Pipeline`] — the long-lived handle operators keep across reloads.
//!
//! A `Pipeline` owns an [`arc_swap::ArcSwap`] pointing at the current
//! [`PipelineGeneration`]. Requests capture `Arc<PipelineGeneration>` once
//! at [`Pipeline::handle`] entry (via [`arc_swap::ArcSwap::load_full`]) and
//! run to completion against that snapshot even if
//! [`Pipeline::reload`] swaps the pointer mid-request — the old generation
//! stays alive exactly as long as something still holds that `Arc`.
//! [`Pipeline::reload`] closes the old generation's stale filters
//! immediately when it's already the sole holder; when a racing in-flight
//! request still holds a reference, the close is deferred onto
//! `pending_closes` rather than abandoned, and retried on every subsequent
//! `reload`/`close` call until that holder drops its reference.

use crate::error::RuntimeError;
use crate::generation::PipelineGeneration;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use pipeline_kernel::filter::RequestContext;
use pipeline_kernel::registry::FilterRegistry;
use pipeline_kernel::spec::{PipelineSpec, ValidatedSpec};
use std::sync::Arc;

/// A pipeline's long-lived, reloadable handle.
pub struct Pipeline {
    name: String,
    registry: Arc<FilterRegistry>,
    generation: ArcSwap<PipelineGeneration>,
    /// Superseded generations some in-flight request still held at the
    /// moment of a reload, paired with the filter names that reload needed
    /// to close. Drained opportunistically, never abandoned — spec.md §4.3
    /// requires the engine to close exactly the stale filters of a
    /// superseded generation, not "close them if convenient".
    pending_closes: Mutex<Vec<(Arc<PipelineGeneration>, Vec<String>)>>,
}

impl Pipeline {
    /// Builds and publishes the first generation of a pipeline from an
    /// already-validated spec.
    pub async fn init(
        validated: ValidatedSpec,
        registry: Arc<FilterRegistry>,
    ) -> Result<Self, RuntimeError> {
        let name = validated.spec().name.clone();
        let generation = PipelineGeneration::init(validated, &registry).await?;
        Ok(Self {
            name,
            registry,
            generation: ArcSwap::from_pointee(generation),
            pending_closes: Mutex::new(Vec::new()),
        })
    }

    /// Builds a new generation from `validated`, inheriting state from
    /// whichever of the current generation's filters share a name and kind
    /// with the new spec's, then atomically publishes it. Filters present
    /// in the old generation but absent from the new one are closed once
    /// this call returns if no request is still in flight against the old
    /// generation; otherwise the close is deferred (see `pending_closes`)
    /// and retried here and in [`Pipeline::close`] until it succeeds.
    pub async fn reload(&self, validated: ValidatedSpec) -> Result<(), RuntimeError> {
        self.drain_pending_closes().await;

        let previous = self.generation.load_full();
        let new_generation =
            PipelineGeneration::inherit(validated, &self.registry, &previous).await?;
        self.generation.store(Arc::new(new_generation));

        let stale: Vec<String> = {
            let current = self.generation.load();
            previous
                .filter_names()
                .filter(|name| !current.filter_names_contains(name))
                .map(|s| s.to_string())
                .collect()
        };

        match Arc::try_unwrap(previous) {
            Ok(mut previous) => {
                for name in &stale {
                    if let Some(mut filter) = previous.take_filter(name) {
                        filter.close().await;
                    }
                }
            }
            Err(previous) => {
                // Still referenced by an in-flight request. Hand the
                // generation and the names it owes a close to off to
                // `pending_closes` instead of dropping it unclosed.
                if !stale.is_empty() {
                    self.pending_closes.lock().push((previous, stale));
                }
            }
        }
        Ok(())
    }

    /// Retries closing every generation in `pending_closes` whose last
    /// in-flight holder has since dropped its reference. Generations still
    /// referenced are put back for the next call to retry.
    async fn drain_pending_closes(&self) {
        let entries = std::mem::take(&mut *self.pending_closes.lock());
        let mut still_pending = Vec::new();
        for (generation, stale) in entries {
            match Arc::try_unwrap(generation) {
                Ok(mut generation) => {
                    for name in &stale {
                        if let Some(mut filter) = generation.take_filter(name) {
                            filter.close().await;
                        }
                    }
                }
                Err(generation) => still_pending.push((generation, stale)),
            }
        }
        self.pending_closes.lock().extend(still_pending);
    }

    /// Runs one request through the currently-published generation,
    /// returning the label most recently returned by a filter (the empty
    /// string if no filter executed).
    pub async fn handle(&self, ctx: &mut dyn RequestContext) -> String {
        let generation = self.generation.load_full();
        generation.handle(&self.name, ctx).await
    }

    /// The pipeline's name, as declared in its spec.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The spec the currently-published generation was built from.
    pub fn spec(&self) -> PipelineSpec {
        self.generation.load().spec().clone()
    }

    /// Closes every filter in the currently-published generation, after
    /// first retrying any deferred closes left over from earlier reloads.
    /// Intended for orderly shutdown, not reload — reload closes only what
    /// the new generation no longer needs. The currently-published
    /// generation itself is a no-op (with a warning logged) if some
    /// in-flight request still holds a reference to it.
    pub async fn close(&self) {
        self.drain_pending_closes().await;
        match Arc::try_unwrap(self.generation.load_full()) {
            Ok(mut generation) => generation.close().await,
            Err(_) => {
                tracing::warn!(
                    pipeline = %self.name,
                    "cannot close pipeline: generation still has in-flight holders"
                );
            }
        }
    }

    /// Number of generations still awaiting a deferred close. Exposed for
    /// tests; not part of the operational surface.
    #[cfg(test)]
    fn pending_close_count(&self) -> usize {
        self.pending_closes.lock().len()
    }
}

impl PipelineGeneration {
    fn filter_names_contains(&self, name: &str) -> bool {
        self.filter_names().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{register_builtin, DENY};
    use pipeline_kernel::spec::FlowNode;
    use pipeline_kernel::validate::validate;
    use std::collections::HashMap;

    struct MapContext {
        tags: Vec<String>,
        identifiers: HashMap<String, serde_json::Value>,
    }

    impl MapContext {
        fn new() -> Self {
            Self {
                tags: Vec::new(),
                identifiers: HashMap::new(),
            }
        }
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

    fn deny_spec(denied: &[&str]) -> PipelineSpec {
        PipelineSpec {
            name: "gateway".to_string(),
            filters: vec![pipeline_kernel::spec::FilterSpec {
                name: "block".to_string(),
                kind: "deny_list".to_string(),
                body: serde_json::json!({ "denied": denied }),
            }],
            flow: vec![FlowNode {
                filter: "block".to_string(),
                jump_if: HashMap::from([(DENY.to_string(), "END".to_string())]),
                ..Default::default()
            }],
        }
    }

    #[tokio::test]
    async fn denied_client_is_rejected_end_to_end() {
        let registry = Arc::new(FilterRegistry::new());
        register_builtin(&registry).unwrap();

        let validated = validate(deny_spec(&["bad-1"]), &registry).unwrap();
        let pipeline = Pipeline::init(validated, registry).await.unwrap();

        let mut ctx = MapContext::new();
        ctx.set_identifier("client_id", serde_json::json!("bad-1"));
        let label = pipeline.handle(&mut ctx).await;

        assert_eq!(label, DENY);
        assert_eq!(ctx.tags.len(), 1);
        assert!(ctx.tags[0].contains(&format!("({DENY},")));
    }

    #[tokio::test]
    async fn reload_swaps_generation_and_closes_stale_filters() {
        let registry = Arc::new(FilterRegistry::new());
        register_builtin(&registry).unwrap();

        let validated_v1 = validate(deny_spec(&["bad-1"]), &registry).unwrap();
        let pipeline = Pipeline::init(validated_v1, Arc::clone(&registry)).await.unwrap();

        let validated_v2 = validate(deny_spec(&["bad-2"]), &registry).unwrap();
        pipeline.reload(validated_v2).await.unwrap();

        let mut ctx = MapContext::new();
        ctx.set_identifier("client_id", serde_json::json!("bad-1"));
        pipeline.handle(&mut ctx).await;
        assert!(!ctx.tags[0].contains(&format!("({DENY},")), "bad-1 is no longer denied after reload");

        let mut ctx2 = MapContext::new();
        ctx2.set_identifier("client_id", serde_json::json!("bad-2"));
        pipeline.handle(&mut ctx2).await;
        assert!(ctx2.tags[0].contains(&format!("({DENY},")));
    }

    #[tokio::test]
    async fn in_flight_request_keeps_running_against_old_generation_after_reload() {
        let registry = Arc::new(FilterRegistry::new());
        register_builtin(&registry).unwrap();

        let validated_v1 = validate(deny_spec(&["bad-1"]), &registry).unwrap();
        let pipeline = Pipeline::init(validated_v1, Arc::clone(&registry)).await.unwrap();

        // Capture the generation exactly as `handle` would, simulating a
        // request that is already running when a reload happens.
        let captured = pipeline.generation.load_full();

        let validated_v2 = validate(deny_spec(&["bad-2"]), &registry).unwrap();
        pipeline.reload(validated_v2).await.unwrap();

        let mut ctx = MapContext::new();
        ctx.set_identifier("client_id", serde_json::json!("bad-1"));
        captured.handle("gateway", &mut ctx).await;
        assert!(ctx.tags[0].contains(&format!("({DENY},")), "captured generation still denies bad-1");
    }

    #[tokio::test]
    async fn reload_defers_close_instead_of_abandoning_it_when_a_holder_remains() {
        let registry = Arc::new(FilterRegistry::new());
        register_builtin(&registry).unwrap();

        let validated_v1 = validate(deny_spec(&["bad-1"]), &registry).unwrap();
        let pipeline = Pipeline::init(validated_v1, Arc::clone(&registry)).await.unwrap();

        // Hold the first generation open, as an in-flight request would.
        let captured = pipeline.generation.load_full();

        let validated_v2 = validate(deny_spec(&["bad-2"]), &registry).unwrap();
        pipeline.reload(validated_v2).await.unwrap();
        assert_eq!(
            pipeline.pending_close_count(),
            1,
            "close of the superseded generation must be deferred, not dropped"
        );

        // The in-flight holder finishes and drops its reference.
        drop(captured);

        // The next reload retries the deferred close opportunistically.
        let validated_v3 = validate(deny_spec(&["bad-3"]), &registry).unwrap();
        pipeline.reload(validated_v3).await.unwrap();
        assert_eq!(
            pipeline.pending_close_count(),
            0,
            "deferred close must be retried and succeed once the holder is gone"
        );
    }
}
