//! The process-wide catalog of registered filter kinds.
//!
//! A [`FilterRegistry`] is populated once, near process start, by whoever
//! links in concrete filter implementations (typically
//! `pipeline-runtime::filters::register_builtin`, plus any third-party
//! crate's own registration function). After that it is read-only: every
//! [`crate::validate::validate`] call and every [`Filter::init`] happens
//! behind a shared read lock, never a write lock, in steady state.

use crate::error::PipelineError;
use crate::filter::Filter;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builds a fresh, unconfigured [`Filter`] instance for one registered kind.
pub type FilterFactory = Arc<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Checks a filter instance's body against its kind's schema, returning a
/// human-readable description of what's wrong if it doesn't fit.
pub type BodyValidator = Arc<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// Everything the registry and validator need to know about one filter kind.
#[derive(Clone)]
pub struct FilterKindDescriptor {
    kind: String,
    factory: FilterFactory,
    validate_body: BodyValidator,
    results: HashSet<String>,
}

impl FilterKindDescriptor {
    /// Registers a kind with no body schema of its own — any JSON value is
    /// accepted, and the filter's own [`Filter::init`] is the sole arbiter
    /// of whether the body makes sense. The kind emits no result labels of
    /// its own (it always falls through); use [`Self::with_results`] to
    /// declare otherwise.
    pub fn new(kind: impl Into<String>, factory: impl Fn() -> Box<dyn Filter> + Send + Sync + 'static) -> Self {
        Self {
            kind: kind.into(),
            factory: Arc::new(factory),
            validate_body: Arc::new(|_| Ok(())),
            results: HashSet::new(),
        }
    }

    /// Attaches a body-schema check run during Phase F validation, before
    /// any filter instance is constructed.
    pub fn with_body_validator(
        mut self,
        validate_body: impl Fn(&serde_json::Value) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validate_body = Arc::new(validate_body);
        self
    }

    /// Declares the set of result labels this kind's instances may return
    /// from [`Filter::handle`]. A node's `jumpIf` may only key on a label
    /// in this set — see [`crate::validate::validate`] Phase G.
    pub fn with_results<I, S>(mut self, results: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.results = results.into_iter().map(Into::into).collect();
        self
    }

    /// The registered kind name.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Constructs a fresh instance of this kind.
    pub fn build(&self) -> Box<dyn Filter> {
        (self.factory)()
    }

    /// Runs this kind's body schema check.
    pub fn validate_body(&self, body: &serde_json::Value) -> Result<(), String> {
        (self.validate_body)(body)
    }

    /// The set of result labels this kind's instances may emit.
    pub fn results(&self) -> &HashSet<String> {
        &self.results
    }
}

/// Process-wide, initialize-once-then-read-only catalog of filter kinds.
///
/// Concurrency is handled with a [`parking_lot::RwLock`] rather than an
/// atomic pointer: registration is expected to happen once, in bulk, before
/// any pipeline is built, so contention is a non-issue — the lock exists for
/// correctness (a second registration racing a lookup), not performance.
#[derive(Default)]
pub struct FilterRegistry {
    kinds: RwLock<HashMap<String, FilterKindDescriptor>>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one filter kind. Fails if the kind name is already taken.
    pub fn register(&self, descriptor: FilterKindDescriptor) -> Result<(), PipelineError> {
        let mut kinds = self.kinds.write();
        if kinds.contains_key(&descriptor.kind) {
            return Err(PipelineError::DuplicateKind(descriptor.kind));
        }
        kinds.insert(descriptor.kind.clone(), descriptor);
        Ok(())
    }

    /// Looks up a registered kind by name.
    pub fn get(&self, kind: &str) -> Option<FilterKindDescriptor> {
        self.kinds.read().get(kind).cloned()
    }

    /// Returns `true` if `kind` has been registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.read().contains_key(kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.kinds.read().len()
    }

    /// Returns `true` if no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.kinds.read().is_empty()
    }
}
