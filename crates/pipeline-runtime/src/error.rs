//! Lifecycle error type for `pipeline-runtime`.
//!
//! Everything a [`crate::generation::PipelineGeneration`] can fail to do
//! *after* its spec has already passed kernel validation: a filter's
//! `init`/`inherit` rejecting its own configuration at construction time.

use pipeline_kernel::FilterLifecycleError;
use thiserror::Error;

/// A lifecycle failure raised while building or reloading a pipeline
/// generation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RuntimeError {
    /// `Filter::init` failed for the named filter instance.
    #[error("filter '{name}' (kind '{kind}') failed to initialize: {source}")]
    InitFailed {
        name: String,
        kind: String,
        source: FilterLifecycleError,
    },

    /// `Filter::inherit` failed for the named filter instance during a
    /// reload.
    #[error("filter '{name}' (kind '{kind}') failed to inherit state: {source}")]
    InheritFailed {
        name: String,
        kind: String,
        source: FilterLifecycleError,
    },

    /// The registry has no descriptor for a filter's kind. This can only
    /// happen if the registry was mutated between validation and
    /// construction — validation already checked this once.
    #[error("filter '{0}' has unknown kind '{1}'")]
    UnknownKind(String, String),
}
