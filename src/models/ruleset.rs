//! Declarative enrollment rule: a set of JSON-shaped match patterns over
//! agent attributes, used only by auto-enrollment (§4.3) and never mutated
//! by the core.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::Namespace;
use super::workflow::WorkflowSpec;

/// A single JSON-shaped constraint: `{"field": {"sub": ["value", ...]}}`.
///
/// A pattern matches an attributes event when, for every `field`, the event
/// has a value at that path whose JSON representation is reachable by
/// descending through the constraint object and landing on one of the
/// listed leaf values (or sub-objects, recursively).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPattern {
    /// Assigned when the owning rule-set is loaded from the store, to
    /// disambiguate match counts (§9): `pattern-<idx>`. `None` until then.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    pub constraint: Value,
}

impl MatchPattern {
    pub fn new(constraint: Value) -> Self {
        MatchPattern { id: None, constraint }
    }

    /// Does `event` satisfy this pattern's constraint?
    pub fn matches(&self, event: &Value) -> bool {
        constraint_matches(&self.constraint, event)
    }
}

/// Recursive descent: every key in `constraint` must exist in `event`, and
/// for each key either the sub-constraint matches the corresponding
/// sub-value recursively, or (leaf case) the sub-constraint is an array of
/// acceptable literal values and the event's value must equal one of them.
fn constraint_matches(constraint: &Value, event: &Value) -> bool {
    match constraint {
        Value::Object(map) => {
            let Value::Object(event_map) = event else {
                return false;
            };
            map.iter().all(|(key, sub_constraint)| {
                event_map
                    .get(key)
                    .map(|sub_event| constraint_matches(sub_constraint, sub_event))
                    .unwrap_or(false)
            })
        }
        Value::Array(acceptable) => acceptable.iter().any(|v| values_equal(v, event)),
        leaf => values_equal(leaf, event),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::String(a), other) => other.to_string().trim_matches('"') == a,
        _ => a == b,
    }
}

/// Declarative enrollment rule matched against an agent's reported
/// attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRuleSet {
    pub namespace: Namespace,
    pub name: String,
    pub patterns: Vec<MatchPattern>,
    /// Placeholder key in the template's hardware-map that receives the
    /// enrolling agent's id.
    pub agent_template_value: String,
    pub workflow_template: WorkflowSpec,
    /// When set, JSON-encode attributes into a well-known annotation key on
    /// the created workflow.
    #[serde(default)]
    pub add_attributes_as_annotations: bool,
}

impl WorkflowRuleSet {
    /// Stamps each pattern's `id` as `pattern-<idx>` by position, called once
    /// a rule-set is loaded from the store (§9).
    pub fn assign_pattern_ids(&mut self) {
        for (idx, pattern) in self.patterns.iter_mut().enumerate() {
            pattern.id = Some(format!("pattern-{idx}"));
        }
    }

    /// Number of this rule-set's patterns the event satisfies. A pattern
    /// compilation error (malformed constraint) is not representable here -
    /// patterns are pre-validated JSON, so a pattern simply fails to match
    /// rather than erroring; the caller (§4.3 step 3) is responsible for
    /// skipping rule-sets whose raw JSON failed to deserialize at all.
    pub fn match_count(&self, event: &Value) -> usize {
        self.patterns.iter().filter(|p| p.matches(event)).count()
    }
}
