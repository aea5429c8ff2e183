//! Wire-level data model for a pipeline specification.
//!
//! These types mirror the YAML shape operators author by hand: a list of
//! named filter instances and a flow graph of nodes that reference them by
//! name. They carry no validation of their own — [`crate::validate`] is the
//! only place a [`PipelineSpec`] becomes trustworthy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier reserved for "stop the pipeline here, return to the caller".
pub const END: &str = "END";

/// Identifier reserved for the context's default request/response body slot.
pub const DEFAULT_IDENTIFIER: &str = "Default";

/// One filter instance as declared in a pipeline spec.
///
/// `body` is kept as an untyped [`serde_json::Value`] at this layer — the
/// registered [`crate::registry::FilterKindDescriptor`] for `kind` is
/// responsible for decoding it into a concrete configuration type. The
/// kernel never needs to know what a `rate_limiter` or `header_rewriter`
/// body looks like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Unique name for this filter instance within the pipeline. Must not be
    /// `END` or `Default`.
    pub name: String,
    /// The registered kind this instance is built from.
    pub kind: String,
    /// Kind-specific configuration, opaque to the kernel. Flattened so a
    /// kind's fields sit inline alongside `name`/`kind` in the YAML, e.g.
    /// `{name: block, kind: deny_list, denied: [bad-1]}`, matching the wire
    /// shape in spec.md §6 (as opposed to `requestID`/`responseID`/
    /// `useRequest` on [`FlowNode`], which *are* nested under their own
    /// keys).
    #[serde(flatten)]
    pub body: serde_json::Value,
}

/// One node in a pipeline's flow graph.
///
/// A node names the filter instance to run and, optionally, a map from
/// result label to the next node's name (or `END`). A result label with no
/// matching entry in `jump_if` falls through to the next node in list order,
/// or to `END` if this was the last node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowNode {
    /// Name of the [`FilterSpec`] this node executes, or the reserved
    /// sentinel [`END`].
    pub filter: String,
    /// Names the request identifier this node's output should be published
    /// as, for later nodes' `useRequest` to pick up.
    #[serde(default, rename = "requestID", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Names the response identifier this node's output should be published
    /// as.
    #[serde(default, rename = "responseID", skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    /// Names a previously-produced request identifier this node should be
    /// fed, in place of the implicit `Default` request.
    #[serde(default, rename = "useRequest", skip_serializing_if = "Option::is_none")]
    pub use_request: Option<String>,
    /// Result label -> next node name (or `END`) routing table.
    #[serde(default, rename = "jumpIf")]
    pub jump_if: HashMap<String, String>,
}

/// A complete, unvalidated pipeline specification as deserialized from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Human-readable pipeline name, used only for logging and tags.
    pub name: String,
    /// Declared filter instances, keyed by their own `name` field when
    /// looked up during validation and execution.
    pub filters: Vec<FilterSpec>,
    /// Ordered flow graph.
    pub flow: Vec<FlowNode>,
}

impl PipelineSpec {
    /// Looks up a declared filter spec by name.
    pub fn filter(&self, name: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.name == name)
    }
}

/// A [`PipelineSpec`] that has passed both validation phases.
///
/// This is a zero-cost wrapper: constructing one outside
/// [`crate::validate::validate`] is impossible from outside this crate,
/// which makes "pass an unvalidated spec to the runtime" a compile-time
/// unrepresentable state rather than a runtime check.
#[derive(Debug, Clone)]
pub struct ValidatedSpec {
    pub(crate) spec: PipelineSpec,
}

impl ValidatedSpec {
    /// Borrows the underlying spec.
    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// Consumes the wrapper, returning the underlying spec.
    pub fn into_spec(self) -> PipelineSpec {
        self.spec
    }
}
