//! Auto-discovery (§4.4): create a hardware inventory record on first sight
//! of an agent with none.

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{AgentAttributes, AgentId, Hardware, HardwareSpec, Namespace};
use crate::store::ObjectStore;

/// Fetch or create the discovery hardware record for `agent_id`. Never
/// overwrites an existing record. The spec is only populated from
/// `attributes` the first time the record is created.
pub async fn discover_hardware(
    store: &dyn ObjectStore,
    discovery_namespace: &Namespace,
    agent_id: &AgentId,
    attributes: Option<&AgentAttributes>,
) -> Result<Hardware> {
    let name = Hardware::discovery_name(agent_id.as_str());

    if let Some(existing) = store.read_hardware(discovery_namespace, &name).await? {
        return Ok(existing);
    }

    let attributes = attributes.cloned().unwrap_or_default();
    let spec = build_spec(&attributes);
    let attributes_json = serde_json::to_string(&attributes)?;
    let hardware = Hardware::new_discovered(discovery_namespace.clone(), agent_id.as_str(), spec, attributes_json);

    store.create_hardware(hardware).await?;

    // Re-read: create_hardware is create-if-absent, so this also covers the
    // race where a concurrent caller created it first.
    store
        .read_hardware(discovery_namespace, &name)
        .await?
        .ok_or_else(|| {
            debug!(agent = %agent_id, "hardware record vanished immediately after create");
            Error::Internal(format!("hardware record {name} missing after create"))
        })
}

fn build_spec(attributes: &AgentAttributes) -> HardwareSpec {
    let interfaces = attributes
        .network_interfaces_with_valid_macs()
        .into_iter()
        .map(|nic| crate::models::hardware::DhcpInterface {
            mac: nic.mac.clone().unwrap_or_default(),
            ip: nic.ip.clone(),
            dhcp: true,
        })
        .collect();

    let disks = attributes
        .block
        .iter()
        .map(|dev| crate::models::hardware::Disk {
            device_path: dev.device_path(),
        })
        .collect();

    HardwareSpec {
        interfaces,
        disks,
        bmc_ref: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NetworkInterface;
    use crate::store::InMemoryObjectStore;

    #[tokio::test]
    async fn creates_record_from_attributes() {
        let store = InMemoryObjectStore::new();
        let mut attributes = AgentAttributes::default();
        attributes.network.push(NetworkInterface {
            name: "eth0".into(),
            mac: Some("aa:bb:cc:dd:ee:ff".into()),
            ip: Some("10.0.0.5".into()),
            dhcp: true,
        });

        let hw = discover_hardware(&store, &"discovery".into(), &"machine-mac-1".into(), Some(&attributes))
            .await
            .unwrap();

        assert_eq!(hw.name, "discovery-machine-mac-1");
        assert_eq!(hw.spec.interfaces.len(), 1);
        assert_eq!(hw.spec.interfaces[0].mac, "aa:bb:cc:dd:ee:ff");
    }

    #[tokio::test]
    async fn second_call_returns_existing_unchanged() {
        let store = InMemoryObjectStore::new();
        let first = discover_hardware(&store, &"discovery".into(), &"machine-mac-1".into(), None)
            .await
            .unwrap();

        let mut attrs = AgentAttributes::default();
        attrs.network.push(NetworkInterface {
            name: "eth0".into(),
            mac: Some("11:22:33:44:55:66".into()),
            ip: None,
            dhcp: true,
        });
        let second = discover_hardware(&store, &"discovery".into(), &"machine-mac-1".into(), Some(&attrs))
            .await
            .unwrap();

        assert_eq!(first.spec.interfaces.len(), second.spec.interfaces.len());
        assert!(second.spec.interfaces.is_empty());
    }
}
