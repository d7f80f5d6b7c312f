//! Optional inventory record. The core may create but never modify
//! existing ones (auto-discovery is create-if-absent, §4.4).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::Namespace;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhcpInterface {
    pub mac: String,
    #[serde(default)]
    pub ip: Option<String>,
    pub dhcp: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disk {
    pub device_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareSpec {
    #[serde(default)]
    pub interfaces: Vec<DhcpInterface>,
    #[serde(default)]
    pub disks: Vec<Disk>,
    #[serde(default)]
    pub bmc_ref: Option<String>,
}

/// Inventory record, one per physical machine the dispatcher has seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hardware {
    pub namespace: Namespace,
    pub name: String,
    pub spec: HardwareSpec,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Hardware {
    /// The name auto-discovery (§4.4) assigns: `discovery-<agentID>`.
    pub fn discovery_name(agent_id: &str) -> String {
        format!("discovery-{agent_id}")
    }

    pub fn new_discovered(namespace: impl Into<Namespace>, agent_id: &str, spec: HardwareSpec, attributes_json: String) -> Self {
        let mut labels = HashMap::new();
        labels.insert("auto-discovered".to_string(), "true".to_string());
        let mut annotations = HashMap::new();
        annotations.insert("agent-attributes".to_string(), attributes_json);

        Hardware {
            namespace: namespace.into(),
            name: Self::discovery_name(agent_id),
            spec,
            labels,
            annotations,
        }
    }
}
