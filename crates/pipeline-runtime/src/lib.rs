//! Filter pipeline runtime — generations, hot reload, and the reference
//! filter kinds used to exercise them.
//!
//! Builds on [`pipeline_kernel`]'s trait contracts and validator to supply
//! the part the kernel deliberately leaves out: an actual, runnable
//! [`Pipeline`] that owns a chain of live [`pipeline_kernel::Filter`]
//! instances and can be reloaded in place.
//!
//! ```rust
//! # #[tokio::main]
//! # async fn main() {
//! use pipeline_kernel::registry::FilterRegistry;
//! use pipeline_kernel::validate::validate;
//! use pipeline_runtime::filters::register_builtin;
//! use pipeline_runtime::Pipeline;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(FilterRegistry::new());
//! register_builtin(&registry).unwrap();
//!
//! let spec = serde_yaml::from_str(r#"
//! name: demo
//! filters:
//!   - name: e1
//!     kind: echo
//! flow:
//!   - filter: e1
//! "#).unwrap();
//!
//! let validated = validate(spec, &registry).unwrap();
//! let pipeline = Pipeline::init(validated, registry).await.unwrap();
//! assert_eq!(pipeline.name(), "demo");
//! # }
//! ```

pub mod error;
pub mod filters;
pub mod generation;
pub mod pipeline;

pub use error::RuntimeError;
pub use generation::PipelineGeneration;
pub use pipeline::Pipeline;
