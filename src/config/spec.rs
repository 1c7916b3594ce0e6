//! Configuration document types.
//!
//! These structs map to `kcli.yml`, `kcli_profiles.yml` and plan files.
//! All VM parameters are optional here; precedence between documents is
//! applied later by the resolver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resolver::{DiskSpec, ScalarValue};

/// A partial VM parameter set.
///
/// Used for profiles, plan entries, command-line overrides and the VM
/// defaults embedded in client configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmSpec {
    /// Profile this entry derives from (plan entries only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Storage pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    /// Base image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Number of CPUs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numcpus: Option<ScalarValue>,
    /// Memory in MB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<ScalarValue>,
    /// Disks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disks: Option<Vec<DiskSpec>>,
    /// Default disk size in GB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disksize: Option<ScalarValue>,
    /// Disk bus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diskinterface: Option<String>,
    /// Thin provisioning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diskthin: Option<ScalarValue>,
    /// Guest OS identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guestid: Option<String>,
    /// Networks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nets: Option<Vec<String>>,
    /// ISO image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
    /// VNC graphics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vnc: Option<ScalarValue>,
    /// Cloud-init injection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudinit: Option<ScalarValue>,
    /// Start after creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<ScalarValue>,
    /// SSH public keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// First boot commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmds: Option<Vec<String>>,
    /// Static addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ips: Option<Vec<String>>,
    /// Netmasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmasks: Option<Vec<String>>,
    /// Gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// DNS server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    /// DNS domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Script files appended to `cmds`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Vec<String>>,
    /// Why this entry could not be read; resolving it fails with this.
    #[serde(skip)]
    pub malformed: Option<String>,
}

/// The `default` section of `kcli.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultSection {
    /// Name of the selected client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Global VM defaults.
    #[serde(flatten)]
    pub vm: VmSpec,
}

/// One client (hypervisor) section of `kcli.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSection {
    /// Hypervisor host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// SSH or TCP port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Remote user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Transport protocol (ssh, tcp, tls).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Full libvirt URI, overriding host/port/user/protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Client-level VM defaults.
    #[serde(flatten)]
    pub vm: VmSpec,
}

/// The parsed `kcli.yml` document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientsFile {
    /// The `default` section.
    pub default: DefaultSection,
    /// Client sections by name.
    pub clients: BTreeMap<String, ClientSection>,
}

/// Named profiles from `kcli_profiles.yml`.
pub type Profiles = BTreeMap<String, VmSpec>;

impl ClientsFile {
    /// Configuration used when no `kcli.yml` exists: a single local client.
    #[must_use]
    pub fn local() -> Self {
        let mut clients = BTreeMap::new();
        clients.insert(
            String::from("local"),
            ClientSection {
                vm: VmSpec {
                    pool: Some(String::from("default")),
                    ..VmSpec::default()
                },
                ..ClientSection::default()
            },
        );

        Self {
            default: DefaultSection {
                client: Some(String::from("local")),
                vm: VmSpec::default(),
            },
            clients,
        }
    }

    /// Converts the document back into a YAML value for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if a section cannot be serialized.
    pub fn to_yaml_value(&self) -> Result<serde_yaml::Value, serde_yaml::Error> {
        let mut root = serde_yaml::Mapping::new();
        root.insert("default".into(), serde_yaml::to_value(&self.default)?);
        for (name, section) in &self.clients {
            root.insert(name.as_str().into(), serde_yaml::to_value(section)?);
        }
        Ok(serde_yaml::Value::Mapping(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_spec_partial() {
        let yaml = r"
template: CentOS-7-x86_64-GenericCloud.qcow2
numcpus: '4'
memory: 2048
nets:
  - default
  - cinet
";
        let spec: VmSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.numcpus, Some(ScalarValue::from("4")));
        assert_eq!(spec.memory, Some(ScalarValue::Int(2048)));
        assert_eq!(spec.nets.as_ref().map(Vec::len), Some(2));
        assert!(spec.pool.is_none());
        assert!(spec.profile.is_none());
    }

    #[test]
    fn test_client_section_flattens_vm_defaults() {
        let yaml = r"
host: 192.168.0.6
port: 22
pool: images
numcpus: 4
";
        let section: ClientSection = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(section.host.as_deref(), Some("192.168.0.6"));
        assert_eq!(section.port, Some(22));
        assert_eq!(section.vm.pool.as_deref(), Some("images"));
        assert_eq!(section.vm.numcpus, Some(ScalarValue::Int(4)));
    }

    #[test]
    fn test_local_document_round_trips_to_yaml() {
        let value = ClientsFile::local().to_yaml_value().unwrap();
        assert_eq!(value["default"]["client"].as_str(), Some("local"));
        assert_eq!(value["local"]["pool"].as_str(), Some("default"));
    }
}
