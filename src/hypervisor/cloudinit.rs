//! Cloud-init documents injected at VM creation.
//!
//! A VM with `cloudinit` enabled gets a user-data document carrying its
//! hostname, keys and first boot commands. When static addresses are set
//! a network-config (version 2) document is generated as well.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::error::{KvirtError, Result};
use crate::resolver::ParameterSet;

use super::network::netmask_to_prefix;

/// Prefix length used when no netmask is given for an address.
const DEFAULT_PREFIX: u32 = 24;

/// Cloud-init documents for one VM.
#[derive(Debug)]
pub struct CloudInit<'a> {
    name: &'a str,
    params: &'a ParameterSet,
    extra_keys: Vec<String>,
}

/// Paths of the documents written for one VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudInitFiles {
    /// User-data document.
    pub user_data: PathBuf,
    /// Network-config document, when static addresses are set.
    pub network_config: Option<PathBuf>,
}

#[derive(Serialize)]
struct UserData<'a> {
    hostname: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fqdn: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ssh_authorized_keys: Vec<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    runcmd: &'a [String],
}

#[derive(Serialize)]
struct NetworkConfig {
    version: u8,
    ethernets: BTreeMap<String, Ethernet>,
}

#[derive(Serialize)]
struct Ethernet {
    dhcp4: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    addresses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gateway4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nameservers: Option<Nameservers>,
}

#[derive(Serialize)]
struct Nameservers {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    search: Vec<String>,
}

impl<'a> CloudInit<'a> {
    /// Creates the documents for a VM.
    #[must_use]
    pub const fn new(name: &'a str, params: &'a ParameterSet) -> Self {
        Self {
            name,
            params,
            extra_keys: Vec::new(),
        }
    }

    /// Adds a public key on top of the ones in the parameters.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.extra_keys.push(key.into());
        self
    }

    /// Renders the user-data document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn user_data(&self) -> Result<String> {
        let keys = self
            .params
            .keys
            .iter()
            .flatten()
            .chain(self.extra_keys.iter())
            .map(|key| key.trim())
            .filter(|key| !key.is_empty())
            .collect();

        let document = UserData {
            hostname: self.name,
            fqdn: self
                .params
                .domain
                .as_deref()
                .map(|domain| format!("{}.{domain}", self.name)),
            ssh_authorized_keys: keys,
            runcmd: self.params.cmds.as_deref().unwrap_or_default(),
        };

        let yaml = serde_yaml::to_string(&document)
            .map_err(|e| KvirtError::internal(format!("Failed to render user-data: {e}")))?;
        Ok(format!("#cloud-config\n{yaml}"))
    }

    /// Renders the network-config document, if any address is static.
    ///
    /// NIC `i` is named `eth{i}`; an empty address leaves it on DHCP.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn network_config(&self) -> Result<Option<String>> {
        let Some(ips) = self.params.ips.as_deref() else {
            return Ok(None);
        };
        if ips.iter().all(|ip| ip.trim().is_empty()) {
            return Ok(None);
        }

        let netmasks = self.params.netmasks.as_deref().unwrap_or_default();
        let mut ethernets = BTreeMap::new();

        for index in 0..self.params.nets.len() {
            let ip = ips.get(index).map_or("", |ip| ip.trim());
            let ethernet = if ip.is_empty() {
                Ethernet {
                    dhcp4: true,
                    addresses: Vec::new(),
                    gateway4: None,
                    nameservers: None,
                }
            } else {
                let prefix = netmasks
                    .get(index)
                    .and_then(|mask| netmask_to_prefix(mask))
                    .unwrap_or(DEFAULT_PREFIX);
                Ethernet {
                    dhcp4: false,
                    addresses: vec![format!("{ip}/{prefix}")],
                    gateway4: if index == 0 {
                        self.params.gateway.clone()
                    } else {
                        None
                    },
                    nameservers: self.nameservers(),
                }
            };
            ethernets.insert(format!("eth{index}"), ethernet);
        }

        let document = NetworkConfig {
            version: 2,
            ethernets,
        };
        serde_yaml::to_string(&document)
            .map(Some)
            .map_err(|e| KvirtError::internal(format!("Failed to render network-config: {e}")))
    }

    fn nameservers(&self) -> Option<Nameservers> {
        let nameservers = Nameservers {
            addresses: self.params.dns.iter().cloned().collect(),
            search: self.params.domain.iter().cloned().collect(),
        };
        if nameservers.addresses.is_empty() && nameservers.search.is_empty() {
            None
        } else {
            Some(nameservers)
        }
    }

    /// Writes the documents under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or writing fails.
    pub async fn write(&self, dir: &Path) -> Result<CloudInitFiles> {
        fs::create_dir_all(dir).await?;

        let user_data = dir.join(format!("{}-user-data", self.name));
        fs::write(&user_data, self.user_data()?).await?;
        debug!("Wrote {}", user_data.display());

        let network_config = match self.network_config()? {
            Some(content) => {
                let path = dir.join(format!("{}-network-config", self.name));
                fs::write(&path, content).await?;
                debug!("Wrote {}", path.display());
                Some(path)
            }
            None => None,
        };

        Ok(CloudInitFiles {
            user_data,
            network_config,
        })
    }
}

impl CloudInitFiles {
    /// Value of the `virt-install --cloud-init` option.
    #[must_use]
    pub fn to_option(&self) -> String {
        let mut option = format!("user-data={}", self.user_data.display());
        if let Some(network_config) = &self.network_config {
            let _ = write!(option, ",network-config={}", network_config.display());
        }
        option
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefaultTier, Profiles, VmSpec};
    use crate::resolver::{ConfigResolver, Tagging};

    fn params(explicit: &VmSpec) -> ParameterSet {
        let defaults = DefaultTier::default();
        let profiles = Profiles::new();
        ConfigResolver::new(&defaults, &profiles)
            .resolve_vm(explicit, None, Tagging::new("lab", "lab"))
            .unwrap()
    }

    #[test]
    fn test_user_data() {
        let params = params(&VmSpec {
            keys: Some(vec![String::from("ssh-rsa AAAA user@host")]),
            cmds: Some(vec![String::from("yum -y install httpd")]),
            domain: Some(String::from("lab.local")),
            ..VmSpec::default()
        });

        let user_data = CloudInit::new("web", &params)
            .with_key("ssh-ed25519 BBBB me@laptop")
            .user_data()
            .unwrap();

        assert!(user_data.starts_with("#cloud-config\n"));
        let doc: serde_yaml::Value =
            serde_yaml::from_str(user_data.trim_start_matches("#cloud-config\n")).unwrap();
        assert_eq!(doc["hostname"].as_str(), Some("web"));
        assert_eq!(doc["fqdn"].as_str(), Some("web.lab.local"));
        assert_eq!(doc["ssh_authorized_keys"].as_sequence().unwrap().len(), 2);
        assert_eq!(doc["runcmd"][0].as_str(), Some("yum -y install httpd"));
    }

    #[test]
    fn test_user_data_minimal() {
        let params = params(&VmSpec::default());
        let user_data = CloudInit::new("web", &params).user_data().unwrap();
        assert!(!user_data.contains("runcmd"));
        assert!(!user_data.contains("ssh_authorized_keys"));
        assert!(!user_data.contains("fqdn"));
    }

    #[test]
    fn test_no_network_config_without_ips() {
        let params = params(&VmSpec::default());
        assert!(CloudInit::new("web", &params).network_config().unwrap().is_none());
    }

    #[test]
    fn test_network_config() {
        let params = params(&VmSpec {
            nets: Some(vec![String::from("default"), String::from("cinet")]),
            ips: Some(vec![String::from("192.168.122.10"), String::new()]),
            netmasks: Some(vec![String::from("255.255.255.0")]),
            gateway: Some(String::from("192.168.122.1")),
            dns: Some(String::from("192.168.122.1")),
            ..VmSpec::default()
        });

        let content = CloudInit::new("web", &params).network_config().unwrap().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();

        assert_eq!(doc["version"].as_u64(), Some(2));
        let eth0 = &doc["ethernets"]["eth0"];
        assert_eq!(eth0["dhcp4"].as_bool(), Some(false));
        assert_eq!(eth0["addresses"][0].as_str(), Some("192.168.122.10/24"));
        assert_eq!(eth0["gateway4"].as_str(), Some("192.168.122.1"));
        assert_eq!(eth0["nameservers"]["addresses"][0].as_str(), Some("192.168.122.1"));
        assert_eq!(doc["ethernets"]["eth1"]["dhcp4"].as_bool(), Some(true));
    }

    #[tokio::test]
    async fn test_write() {
        let dir = tempfile::tempdir().unwrap();
        let params = params(&VmSpec::default());

        let files = CloudInit::new("web", &params).write(dir.path()).await.unwrap();

        assert!(files.user_data.exists());
        assert!(files.network_config.is_none());
        assert_eq!(
            files.to_option(),
            format!("user-data={}", dir.path().join("web-user-data").display())
        );
    }
}
