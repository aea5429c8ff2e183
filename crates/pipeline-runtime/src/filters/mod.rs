//! Reference filter kinds used by this crate's own tests and doctests.
//!
//! A real deployment registers its own filter kinds the same way
//! [`register_builtin`] registers these — there is nothing special about
//! being "built in" beyond being compiled into this crate.

mod deny_list;
mod echo;
mod fixed_upstream;

pub use deny_list::{DenyListFilter, DENY};
pub use echo::EchoFilter;
pub use fixed_upstream::{FixedUpstreamFilter, UPSTREAM_IDENTIFIER};

use pipeline_kernel::error::PipelineError;
use pipeline_kernel::registry::{FilterKindDescriptor, FilterRegistry};

/// Registers `echo`, `deny_list`, and `fixed_upstream` with `registry`.
pub fn register_builtin(registry: &FilterRegistry) -> Result<(), PipelineError> {
    // `echo` never emits a result label of its own — it always falls through.
    registry.register(FilterKindDescriptor::new("echo", || Box::new(EchoFilter::new())))?;
    registry.register(
        FilterKindDescriptor::new("deny_list", || Box::new(DenyListFilter::new()))
            .with_body_validator(deny_list::validate_body)
            .with_results([DENY]),
    )?;
    registry.register(
        FilterKindDescriptor::new("fixed_upstream", || Box::new(FixedUpstreamFilter::new()))
            .with_body_validator(fixed_upstream::validate_body),
    )?;
    Ok(())
}
