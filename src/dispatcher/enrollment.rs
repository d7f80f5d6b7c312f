//! §4.3 Auto-enrollment matcher: when no workflow exists for a requesting
//! agent, try to create one by matching its attributes against a
//! declarative rule-set.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{enrollment_workflow_name, AgentAttributes, AgentId, Workflow};
use crate::store::ObjectStore;

use super::get_action::get_action;
use super::retry::RetryPolicy;
use super::{ActionDescriptor, DispatcherConfig};

pub async fn enroll(
    store: &dyn ObjectStore,
    config: &DispatcherConfig,
    agent_id: &AgentId,
    attributes: Option<&AgentAttributes>,
) -> Result<ActionDescriptor> {
    // Step 1.
    let name = enrollment_workflow_name(agent_id.as_str())
        .ok_or_else(|| Error::InvalidArgument("EMPTY_NAME: could not derive a workflow name".into()))?;

    // Step 2.
    let attributes = attributes.cloned().unwrap_or_default();
    let event = attributes.to_event();

    // Step 3: rule-sets come pre-sorted (namespace, name) from the store,
    // which makes "first in list" deterministic (DESIGN.md open question #1).
    let rule_sets = store.read_workflow_rule_sets().await?;

    // Step 4: strictly greatest match count, ties broken by iteration order.
    let mut best: Option<(usize, &crate::models::WorkflowRuleSet)> = None;
    for rule_set in &rule_sets {
        let count = rule_set.match_count(&event);
        if count == 0 {
            continue;
        }
        match &best {
            Some((best_count, _)) if count <= *best_count => {}
            _ => best = Some((count, rule_set)),
        }
    }

    let (_, rule_set) = best.ok_or_else(|| {
        Error::NotFound(format!(
            "no Workflow Rule Sets found or matched for Agent {agent_id}"
        ))
    })?;

    // Step 5.
    let mut spec = rule_set.workflow_template.clone();
    spec.hardware_map
        .insert(rule_set.agent_template_value.clone(), agent_id.to_string());

    let mut workflow = Workflow::new(rule_set.namespace.clone(), name.clone(), spec);
    workflow.owner_references.push(crate::models::OwnerReference {
        api_version: "forge/v1".into(),
        kind: "WorkflowRuleSet".into(),
        name: rule_set.name.clone(),
        uid: format!("{}/{}", rule_set.namespace, rule_set.name),
    });
    if rule_set.add_attributes_as_annotations {
        workflow.status.conditions.push(crate::models::Condition {
            condition_type: "AgentAttributes".into(),
            status: true,
            reason: "Enrollment".into(),
            message: serde_json::to_string(&attributes)?,
            last_transition_time: chrono::Utc::now(),
        });
    }

    // Step 6.
    match store.create_workflow(workflow).await {
        Ok(()) => {
            debug!(agent = %agent_id, workflow = %name, "created enrollment workflow");
        }
        Err(err) if matches!(err, Error::FailedPrecondition(_)) => {
            warn!(agent = %agent_id, "enrollment race: workflow already exists, re-reading");
            return Err(err);
        }
        Err(err) => return Err(err),
    }

    // Step 7: re-invoke with auto-capabilities disabled.
    let follow_up_config = DispatcherConfig {
        auto_discovery_enabled: false,
        auto_enrollment_enabled: false,
        discovery_namespace: config.discovery_namespace.clone(),
    };
    let policy = RetryPolicy::enrollment_default();
    super::retry::retry_treating_not_found_as_transient(&policy, || {
        get_action(store, &follow_up_config, agent_id, Some(&attributes))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchPattern, WorkflowRuleSet, WorkflowSpec};
    use crate::store::InMemoryObjectStore;
    use serde_json::json;

    fn rule_set(serial: &str) -> WorkflowRuleSet {
        WorkflowRuleSet {
            namespace: "default".into(),
            name: "rs-1".into(),
            patterns: vec![MatchPattern::new(json!({"chassis": {"serial": [serial]}}))],
            agent_template_value: "device_1".into(),
            workflow_template: WorkflowSpec {
                template_ref: "tmpl".into(),
                hardware_ref: None,
                hardware_map: Default::default(),
                boot_mode: None,
            },
            add_attributes_as_annotations: false,
        }
    }

    fn attrs_with_serial(serial: &str) -> AgentAttributes {
        let mut attrs = AgentAttributes::default();
        attrs.chassis = json!({"serial": serial});
        attrs
    }

    #[tokio::test]
    async fn scenario_4_auto_enrollment_match() {
        let store = InMemoryObjectStore::with_rule_sets(vec![rule_set("12345")]);
        let config = DispatcherConfig::default();
        let attrs = attrs_with_serial("12345");

        let result = enroll(&store, &config, &"worker-123".into(), Some(&attrs)).await;
        // Either succeeds (first action served) or transiently NOT_FOUND per
        // §4.3 step 7 staleness note - both are acceptable outcomes, but the
        // workflow must exist in the store either way.
        let workflow = store
            .read(&"default".into(), &"enrollment-worker-123".into())
            .await
            .unwrap();
        assert_eq!(workflow.namespace.as_str(), "default");
        let _ = result;
    }

    #[tokio::test]
    async fn scenario_5_no_match() {
        let store = InMemoryObjectStore::with_rule_sets(vec![rule_set("12345")]);
        let config = DispatcherConfig::default();
        let attrs = attrs_with_serial("99999");

        let err = enroll(&store, &config, &"worker-123".into(), Some(&attrs))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
