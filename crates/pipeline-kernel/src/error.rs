//! Configuration-time error type for the filter pipeline kernel contract.
//!
//! [`PipelineError`] covers every failure mode detectable while validating a
//! [`PipelineSpec`](crate::spec::PipelineSpec) or registering a filter kind —
//! before any request is ever handled. Lifecycle failures that occur while a
//! filter initializes against an already-validated spec belong to the
//! runtime crate (`pipeline-runtime::error::RuntimeError`), not here.

use thiserror::Error;

/// Compile-time / configuration error type for the pipeline kernel contract.
///
/// `#[non_exhaustive]` so future releases can add new failure modes without
/// breaking existing `match` arms in downstream crates.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipelineError {
    // ── Filter specs (Phase F) ──────────────────────────────────────────────
    /// A filter's `name` is empty or whitespace-only.
    #[error("filter name must not be empty")]
    EmptyFilterName,

    /// A filter's `kind` is not present in the registry.
    #[error("filter '{0}' has unknown kind '{1}'")]
    UnknownKind(String, String),

    /// Two filters in the same spec share a name.
    #[error("filter name '{0}' is used more than once")]
    DuplicateFilterName(String),

    /// A filter's name is the reserved flow-terminator sentinel `END`.
    #[error("filter name '{0}' is reserved")]
    ReservedFilterName(String),

    /// A filter kind's body failed its own schema/decoding check.
    #[error("filter '{0}' has a malformed body for kind '{1}': {2}")]
    MalformedBody(String, String, String),

    // ── Flow graph (Phase G) ────────────────────────────────────────────────
    /// A flow node names a filter that is not declared in `filters`.
    #[error("flow node references undefined filter '{0}'")]
    UndefinedFilter(String),

    /// A `jumpIf` key is not one of the filter kind's declared result labels.
    #[error("flow node '{0}' has jumpIf on undeclared result label '{1}'")]
    UnknownResultLabel(String, String),

    /// A jump target used in a `jumpIf` label is neither `END` nor the name
    /// of a later node in the flow.
    #[error("flow node '{0}' jumps to undefined target '{1}'")]
    UndefinedJumpTarget(String, String),

    /// A jump target names an earlier or the same node — only forward jumps
    /// are permitted.
    #[error("flow node '{0}' jumps backward to '{1}'")]
    BackwardJump(String, String),

    /// A filter reads a request/response identifier that no earlier node (in
    /// request order) is guaranteed to have written, and which is not the
    /// reserved `Default` identifier.
    #[error("flow node '{0}' reads undefined identifier '{1}'")]
    UndefinedIdentifier(String, String),

    // ── Registry ─────────────────────────────────────────────────────────────
    /// A filter kind with this name has already been registered.
    #[error("filter kind '{0}' is already registered")]
    DuplicateKind(String),
}
