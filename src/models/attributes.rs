//! Structured facts an agent reports about itself. Input-only: used by the
//! enrollment matcher (§4.3) and auto-discovery (§4.4), never persisted as a
//! first-class record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuProcessor {
    pub id: u32,
    pub cores: u32,
    pub threads: u32,
    pub vendor: String,
    pub model: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cpu {
    pub total_cores: u32,
    pub total_threads: u32,
    #[serde(default)]
    pub processors: Vec<CpuProcessor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    pub total: u64,
    pub usable: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockDevice {
    pub name: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub vendor: Option<String>,
}

impl BlockDevice {
    /// Device path auto-discovery synthesises (§4.4).
    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: Option<String>,
    pub ip: Option<String>,
    #[serde(default)]
    pub dhcp: bool,
}

impl NetworkInterface {
    /// A MAC is considered valid for discovery purposes if it is present
    /// and non-empty; deeper format validation is the object store's
    /// controller's concern.
    pub fn has_valid_mac(&self) -> bool {
        self.mac.as_deref().is_some_and(|m| !m.trim().is_empty())
    }
}

/// Structured facts an agent reports about itself: CPU, memory, block
/// devices, NICs, PCI, GPU, chassis, BIOS, baseboard, product (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentAttributes {
    #[serde(default)]
    pub cpu: Cpu,
    #[serde(default)]
    pub memory: Memory,
    #[serde(default)]
    pub block: Vec<BlockDevice>,
    #[serde(default)]
    pub network: Vec<NetworkInterface>,
    #[serde(default)]
    pub pci: Vec<Value>,
    #[serde(default)]
    pub gpu: Vec<Value>,
    #[serde(default)]
    pub chassis: Value,
    #[serde(default)]
    pub bios: Value,
    #[serde(default)]
    pub baseboard: Value,
    #[serde(default)]
    pub product: Value,
}

impl AgentAttributes {
    /// Canonical JSON event for the enrollment matcher (§4.3 step 2). Field
    /// ordering is whatever serde_json's map produces; the matcher itself is
    /// order-insensitive (it indexes by key), so "canonical" here just means
    /// "the one true serialization", not a specific byte order.
    pub fn to_event(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn network_interfaces_with_valid_macs(&self) -> Vec<&NetworkInterface> {
        self.network.iter().filter(|n| n.has_valid_mac()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_device_path_has_dev_prefix() {
        let dev = BlockDevice {
            name: "sda".into(),
            size_bytes: 1024,
            vendor: None,
        };
        assert_eq!(dev.device_path(), "/dev/sda");
    }

    #[test]
    fn network_interface_mac_validity() {
        let valid = NetworkInterface {
            name: "eth0".into(),
            mac: Some("aa:bb:cc:dd:ee:ff".into()),
            ip: None,
            dhcp: true,
        };
        let invalid = NetworkInterface {
            name: "eth1".into(),
            mac: None,
            ip: None,
            dhcp: false,
        };
        assert!(valid.has_valid_mac());
        assert!(!invalid.has_valid_mac());
    }

    #[test]
    fn to_event_round_trips_through_json() {
        let mut attrs = AgentAttributes::default();
        attrs.chassis = serde_json::json!({"serial": "12345"});
        let event = attrs.to_event();
        assert_eq!(event["chassis"]["serial"], "12345");
    }
}
