//! Filter pipeline kernel — trait contracts, data model, validator, and
//! request statistics shared by every pipeline implementation.
//!
//! Per this workspace's microkernel convention: this crate defines what a
//! filter kind, a pipeline spec, and a request context *are*. Building and
//! running an actual pipeline generation out of them is
//! `pipeline-runtime`'s job — this crate never depends on it.
//!
//! ```rust
//! use pipeline_kernel::registry::{FilterKindDescriptor, FilterRegistry};
//! use pipeline_kernel::spec::PipelineSpec;
//! use pipeline_kernel::validate::validate;
//!
//! # use pipeline_kernel::filter::{Filter, FilterLifecycleError, RequestContext};
//! # use async_trait::async_trait;
//! # struct Echo;
//! # #[async_trait]
//! # impl Filter for Echo {
//! #     fn kind(&self) -> &'static str { "echo" }
//! #     fn as_any(&self) -> &dyn std::any::Any { self }
//! #     async fn init(&mut self, _: &pipeline_kernel::spec::FilterSpec) -> Result<(), FilterLifecycleError> { Ok(()) }
//! #     async fn handle(&self, _: &mut dyn RequestContext) -> String { String::new() }
//! # }
//! let registry = FilterRegistry::new();
//! registry.register(FilterKindDescriptor::new("echo", || Box::new(Echo))).unwrap();
//!
//! let spec: PipelineSpec = serde_yaml::from_str(r#"
//! name: demo
//! filters:
//!   - name: e1
//!     kind: echo
//! flow:
//!   - filter: e1
//! "#).unwrap();
//!
//! let validated = validate(spec, &registry).unwrap();
//! assert_eq!(validated.spec().name, "demo");
//! ```

pub mod clock;
pub mod error;
pub mod filter;
pub mod registry;
pub mod spec;
pub mod stat;
pub mod validate;

pub use clock::{Clock, SystemClock};
pub use error::PipelineError;
pub use filter::{Filter, FilterLifecycleError, RequestContext};
pub use registry::{FilterKindDescriptor, FilterRegistry};
pub use spec::{FilterSpec, FlowNode, PipelineSpec, ValidatedSpec};
pub use stat::{HttpStat, Metric, Status};
