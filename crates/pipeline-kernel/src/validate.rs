//! Two-phase static validation of a [`PipelineSpec`].
//!
//! Phase F checks every declared filter instance in isolation (against the
//! registry). Phase G checks the flow graph as a whole, right-to-left for
//! reachable jump targets and then left-to-right for identifier
//! availability. Both phases must pass before a [`ValidatedSpec`] is handed
//! back — there is no partially-valid spec.

use crate::error::PipelineError;
use crate::registry::FilterRegistry;
use crate::spec::{FlowNode, PipelineSpec, ValidatedSpec, DEFAULT_IDENTIFIER, END};
use std::collections::{HashMap, HashSet};

/// Validates `spec` against `registry`, returning a [`ValidatedSpec`] ready
/// to be handed to a pipeline runtime, or the first error encountered.
///
/// A spec with an empty `flow` validates fine — an empty flow is
/// synthesized from filter declaration order at generation-build time, not
/// rejected here.
pub fn validate(spec: PipelineSpec, registry: &FilterRegistry) -> Result<ValidatedSpec, PipelineError> {
    let results_by_filter = validate_filters(&spec, registry)?;
    validate_flow_jumps(&spec, &results_by_filter)?;
    validate_flow_identifiers(&spec)?;
    Ok(ValidatedSpec { spec })
}

/// Phase F: every declared filter instance has a non-empty, unique,
/// non-reserved name, a known kind, and a body that kind accepts. Returns
/// each declared filter's kind's result-label set, keyed by filter name, for
/// Phase G to check `jumpIf` keys against.
///
/// `END` is the only name-space reserved for filter names; `Default` is
/// reserved only as a request/response identifier (see
/// [`validate_flow_identifiers`]) and is a perfectly valid filter name.
fn validate_filters<'a>(
    spec: &'a PipelineSpec,
    registry: &FilterRegistry,
) -> Result<HashMap<&'a str, HashSet<String>>, PipelineError> {
    let mut seen = HashSet::new();
    let mut results_by_filter = HashMap::with_capacity(spec.filters.len());
    for filter in &spec.filters {
        if filter.name.trim().is_empty() {
            return Err(PipelineError::EmptyFilterName);
        }
        if filter.name == END {
            return Err(PipelineError::ReservedFilterName(filter.name.clone()));
        }
        if !seen.insert(filter.name.clone()) {
            return Err(PipelineError::DuplicateFilterName(filter.name.clone()));
        }
        let descriptor = registry
            .get(&filter.kind)
            .ok_or_else(|| PipelineError::UnknownKind(filter.name.clone(), filter.kind.clone()))?;
        descriptor.validate_body(&filter.body).map_err(|msg| {
            PipelineError::MalformedBody(filter.name.clone(), filter.kind.clone(), msg)
        })?;
        results_by_filter.insert(filter.name.as_str(), descriptor.results().clone());
    }
    Ok(results_by_filter)
}

/// Phase G, pass 1: walk the flow right-to-left, seeded with `{END}`,
/// accumulating the set of node names that are valid forward jump targets.
/// Also checks that every node's `filter` (other than the reserved `END`
/// sentinel) is one of the spec's declared filter instances, and that every
/// `jumpIf` key is one of that filter's kind's declared result labels.
fn validate_flow_jumps(
    spec: &PipelineSpec,
    results_by_filter: &HashMap<&str, HashSet<String>>,
) -> Result<(), PipelineError> {
    let all_names: HashSet<&str> = spec
        .flow
        .iter()
        .map(|n| n.filter.as_str())
        .filter(|name| *name != END)
        .collect();
    for node in &spec.flow {
        if node.filter == END {
            continue;
        }
        if spec.filter(&node.filter).is_none() {
            return Err(PipelineError::UndefinedFilter(node.filter.clone()));
        }
    }

    let mut valid_targets: HashSet<&str> = HashSet::new();
    valid_targets.insert(END);

    for node in spec.flow.iter().rev() {
        if node.filter == END {
            continue;
        }
        let declared_results = results_by_filter
            .get(node.filter.as_str())
            .expect("Phase F already validated this node's filter exists");
        for (label, target) in &node.jump_if {
            if !declared_results.contains(label) {
                return Err(PipelineError::UnknownResultLabel(
                    node.filter.clone(),
                    label.clone(),
                ));
            }
            let target = target.as_str();
            if target == END {
                continue;
            }
            if !all_names.contains(target) {
                return Err(PipelineError::UndefinedJumpTarget(
                    node.filter.clone(),
                    target.to_string(),
                ));
            }
            if !valid_targets.contains(target) {
                return Err(PipelineError::BackwardJump(
                    node.filter.clone(),
                    target.to_string(),
                ));
            }
        }
        valid_targets.insert(node.filter.as_str());
    }

    Ok(())
}

/// Phase G, pass 2: walk the flow left-to-right, seeded with `{Default}`,
/// checking that every `useRequest` a node declares was produced by an
/// earlier node's `requestID` (or is the reserved `Default` identifier).
/// Response identifiers (`responseID`) accumulate under the same discipline
/// but have no consuming field in the wire shape to check against.
fn validate_flow_identifiers(spec: &PipelineSpec) -> Result<(), PipelineError> {
    let mut known_requests: HashSet<&str> = HashSet::new();
    known_requests.insert(DEFAULT_IDENTIFIER);
    let mut known_responses: HashSet<&str> = HashSet::new();
    known_responses.insert(DEFAULT_IDENTIFIER);

    for node in &spec.flow {
        if let Some(use_request) = &node.use_request {
            if !known_requests.contains(use_request.as_str()) {
                return Err(PipelineError::UndefinedIdentifier(
                    node.filter.clone(),
                    use_request.clone(),
                ));
            }
        }
        if let Some(request_id) = &node.request_id {
            known_requests.insert(request_id.as_str());
        }
        if let Some(response_id) = &node.response_id {
            known_responses.insert(response_id.as_str());
        }
    }

    Ok(())
}

/// Returns the node a pipeline should move to after `node` produced
/// `result`: the `jumpIf` target for `result` if one is declared, otherwise
/// the next node in flow order, or `END` if `node` was last.
///
/// This is shared between the validator's reasoning about reachability and
/// the runtime's actual execution loop, so the two can never disagree about
/// what "falls through" means.
pub fn next_after(flow: &[FlowNode], index: usize, result: &str) -> String {
    if let Some(target) = flow[index].jump_if.get(result) {
        return target.clone();
    }
    match flow.get(index + 1) {
        Some(next) => next.filter.clone(),
        None => END.to_string(),
    }
}
