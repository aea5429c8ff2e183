//! A single, immutable pipeline generation.
//!
//! A [`PipelineGeneration`] is built once from a
//! [`pipeline_kernel::ValidatedSpec`] and never mutated again. [`Pipeline`]
//! (see [`crate::pipeline`]) is the long-lived handle that swaps one
//! generation for the next on reload; everything in this module only cares
//! about running requests against whichever generation it was handed.

use crate::error::RuntimeError;
use pipeline_kernel::clock::{Clock, SystemClock};
use pipeline_kernel::filter::RequestContext;
use pipeline_kernel::registry::FilterRegistry;
use pipeline_kernel::spec::{FlowNode, PipelineSpec, ValidatedSpec, END};
use pipeline_kernel::Filter;
use std::collections::HashMap;
use std::sync::Arc;

/// One immutable, fully-initialized instantiation of a validated pipeline
/// spec. Built by [`PipelineGeneration::init`] (fresh) or
/// [`PipelineGeneration::inherit`] (reload, carrying over same-name /
/// same-kind filter state).
pub struct PipelineGeneration {
    spec: PipelineSpec,
    filters: HashMap<String, Box<dyn Filter>>,
    /// The flow actually executed: `spec.flow` verbatim, or — when the spec
    /// declared an empty flow — one synthesized in filter declaration order
    /// with no jumps.
    flow: Vec<FlowNode>,
    /// Source of wall-clock time for per-filter duration measurement in
    /// [`PipelineGeneration::handle`]. [`SystemClock`] in production;
    /// swappable in tests for a deterministic one.
    clock: Arc<dyn Clock>,
}

impl PipelineGeneration {
    /// Builds a brand-new generation with no prior state to inherit from.
    pub async fn init(
        validated: ValidatedSpec,
        registry: &FilterRegistry,
    ) -> Result<Self, RuntimeError> {
        Self::build(validated, registry, None, Arc::new(SystemClock)).await
    }

    /// Builds a generation that hands state off from `previous` wherever a
    /// filter instance's name and kind are unchanged, per
    /// [`pipeline_kernel::filter::Filter::inherit`]. Filters whose name is
    /// absent from the new spec are left in `previous` for the caller to
    /// close once it is safe to do so (see [`crate::pipeline::Pipeline::reload`]).
    /// The successor generation keeps using `previous`'s clock, so tests that
    /// inject a fixed clock stay deterministic across a reload.
    pub async fn inherit(
        validated: ValidatedSpec,
        registry: &FilterRegistry,
        previous: &PipelineGeneration,
    ) -> Result<Self, RuntimeError> {
        Self::build(validated, registry, Some(previous), Arc::clone(&previous.clock)).await
    }

    #[cfg(test)]
    async fn init_with_clock(
        validated: ValidatedSpec,
        registry: &FilterRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RuntimeError> {
        Self::build(validated, registry, None, clock).await
    }

    async fn build(
        validated: ValidatedSpec,
        registry: &FilterRegistry,
        previous: Option<&PipelineGeneration>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RuntimeError> {
        let spec = validated.into_spec();
        let mut filters: HashMap<String, Box<dyn Filter>> = HashMap::with_capacity(spec.filters.len());

        for filter_spec in &spec.filters {
            let descriptor = registry.get(&filter_spec.kind).ok_or_else(|| {
                RuntimeError::UnknownKind(filter_spec.name.clone(), filter_spec.kind.clone())
            })?;
            let mut instance = descriptor.build();

            let carried_over = previous
                .and_then(|p| p.filters.get(&filter_spec.name))
                .filter(|prev| prev.kind() == filter_spec.kind);

            match carried_over {
                Some(prev) => {
                    instance
                        .inherit(filter_spec, prev.as_ref())
                        .await
                        .map_err(|source| RuntimeError::InheritFailed {
                            name: filter_spec.name.clone(),
                            kind: filter_spec.kind.clone(),
                            source,
                        })?;
                }
                None => {
                    instance.init(filter_spec).await.map_err(|source| RuntimeError::InitFailed {
                        name: filter_spec.name.clone(),
                        kind: filter_spec.kind.clone(),
                        source,
                    })?;
                }
            }

            filters.insert(filter_spec.name.clone(), instance);
        }

        let flow = if spec.flow.is_empty() {
            spec.filters
                .iter()
                .map(|f| FlowNode {
                    filter: f.name.clone(),
                    ..Default::default()
                })
                .collect()
        } else {
            spec.flow.clone()
        };

        Ok(Self { spec, filters, flow, clock })
    }

    /// The spec this generation was built from.
    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// Names of filter instances this generation owns — used by
    /// [`crate::pipeline::Pipeline::reload`] to figure out which of the
    /// previous generation's filters are no longer present and must be
    /// closed.
    pub(crate) fn filter_names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(|s| s.as_str())
    }

    pub(crate) fn take_filter(&mut self, name: &str) -> Option<Box<dyn Filter>> {
        self.filters.remove(name)
    }

    /// Runs one request through this generation's flow graph in declaration
    /// order, maintaining a `next` pointer: a node is skipped unless `next`
    /// is unset or names it, and reaching it clears `next` again before the
    /// node runs. Since validation only admits forward jumps, this single
    /// forward pass is equivalent to jumping straight to the target — except
    /// when a computed `next` names no remaining node (which validation
    /// should have precluded), in which case the loop simply exhausts the
    /// rest of the flow without invoking another filter, rather than panic.
    /// Appends a single tag to `ctx` of the form
    /// `pipeline: name(result,durationMs)->...` (no tag is added if no
    /// filter ran) and returns the label most recently returned by a filter
    /// — the empty string if no filter executed (an empty flow, or a flow
    /// made up solely of `END`).
    pub async fn handle(&self, pipeline_name: &str, ctx: &mut dyn RequestContext) -> String {
        let flow = &self.flow;
        let mut segments: Vec<String> = Vec::with_capacity(flow.len());
        let mut result = String::new();
        let mut next: Option<String> = None;

        for node in flow.iter() {
            if let Some(target) = &next {
                if node.filter != *target {
                    continue;
                }
            }
            next = None;

            if node.filter == END {
                break;
            }

            let filter = self
                .filters
                .get(&node.filter)
                .expect("every flow node's filter exists per Phase G validation");

            let start_millis = self.clock.now_millis();
            let label = filter.handle(ctx).await;
            let duration_ms = self.clock.now_millis().saturating_sub(start_millis);
            result = label.clone();

            tracing::debug!(
                pipeline = pipeline_name,
                filter = node.filter.as_str(),
                result = result.as_str(),
                duration_ms,
                "filter handled request"
            );

            segments.push(format!("{}({},{}ms)", node.filter, label, duration_ms));

            if !label.is_empty() {
                let target = node.jump_if.get(&label).cloned();
                if target.as_deref() == Some(END) {
                    break;
                }
                next = target;
            }
        }

        if !segments.is_empty() {
            ctx.add_tag(&format!("pipeline: {}", segments.join("->")));
        }
        result
    }

    /// Closes every filter this generation owns. Called once the generation
    /// has been fully superseded and no in-flight request can still be
    /// running against it.
    pub async fn close(&mut self) {
        for filter in self.filters.values_mut() {
            filter.close().await;
        }
    }
}
