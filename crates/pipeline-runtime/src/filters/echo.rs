//! `echo` — the simplest possible filter, used by this crate's own tests
//! and as a doctest fixture. Always falls through with an empty result
//! label and writes nothing.

use async_trait::async_trait;
use pipeline_kernel::filter::{Filter, FilterLifecycleError, RequestContext};
use pipeline_kernel::spec::FilterSpec;
use std::any::Any;

/// A no-op filter: every request falls through immediately.
#[derive(Default)]
pub struct EchoFilter;

impl EchoFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Filter for EchoFilter {
    fn kind(&self) -> &'static str {
        "echo"
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
