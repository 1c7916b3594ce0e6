//! Generation of a client configuration for `kcli bootstrap --auto`.

use std::collections::BTreeMap;

use crate::hypervisor::PoolType;

use super::defaults::NET;
use super::session::ClientConnection;
use super::spec::{ClientSection, ClientsFile, DefaultSection, VmSpec};

/// Address of the local hypervisor.
const LOCAL_HOST: &str = "127.0.0.1";

/// Networks ensured on a bootstrapped host, with their CIDR.
pub const BOOTSTRAP_NETWORKS: &[(&str, &str)] =
    &[("default", "192.168.122.0/24"), ("cinet", "192.168.5.0/24")];

/// Answers for a non-interactive bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bootstrap {
    /// Client name; defaults to the host.
    pub name: Option<String>,
    /// Hypervisor host; local when neither host nor url is given.
    pub host: Option<String>,
    /// SSH or TCP port.
    pub port: Option<u16>,
    /// Remote user.
    pub user: String,
    /// Transport protocol.
    pub protocol: String,
    /// Explicit libvirt URI.
    pub url: Option<String>,
    /// Pool to use and create.
    pub pool: String,
    /// Path of the pool.
    pub poolpath: String,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self {
            name: None,
            host: None,
            port: None,
            user: String::from("root"),
            protocol: String::from("ssh"),
            url: None,
            pool: String::from("default"),
            poolpath: String::from("/var/lib/libvirt/images"),
        }
    }
}

impl Bootstrap {
    /// Returns true if the generated configuration targets the local host.
    ///
    /// Only an explicit local host, or neither host nor url, is local.
    #[must_use]
    pub fn is_local(&self) -> bool {
        match (&self.host, &self.url) {
            (None, None) => true,
            (Some(host), _) => host == LOCAL_HOST,
            (None, Some(_)) => false,
        }
    }

    /// Type of the pool to create for `poolpath`.
    #[must_use]
    pub fn pool_type(&self) -> PoolType {
        PoolType::for_path(&self.poolpath)
    }

    /// Name of the generated client.
    ///
    /// Remote clients default to the host, then to the host in the url.
    #[must_use]
    pub fn client_name(&self) -> String {
        if self.is_local() {
            return String::from("local");
        }
        self.name
            .clone()
            .or_else(|| self.host.clone())
            .or_else(|| self.url.as_deref().and_then(url_host).map(str::to_string))
            .unwrap_or_else(|| String::from("remote"))
    }

    /// The client section written for this bootstrap.
    fn section(&self) -> ClientSection {
        let vm = VmSpec {
            pool: Some(self.pool.clone()),
            nets: Some(vec![NET.to_string()]),
            ..VmSpec::default()
        };

        if self.is_local() {
            ClientSection {
                url: self.url.clone(),
                vm,
                ..ClientSection::default()
            }
        } else {
            ClientSection {
                host: self.host.clone(),
                port: self.port,
                user: Some(self.user.clone()),
                protocol: Some(self.protocol.clone()),
                url: self.url.clone(),
                vm,
            }
        }
    }

    /// Builds the configuration document.
    #[must_use]
    pub fn clients_file(&self) -> ClientsFile {
        let name = self.client_name();
        let mut clients = BTreeMap::new();
        clients.insert(name.clone(), self.section());

        ClientsFile {
            default: DefaultSection {
                client: Some(name),
                vm: VmSpec::default(),
            },
            clients,
        }
    }

    /// Connection to the hypervisor being bootstrapped.
    ///
    /// Built from the written section, so later commands reach the same host.
    #[must_use]
    pub fn connection(&self) -> ClientConnection {
        ClientConnection::from_section(&self.section())
    }
}

/// Extracts the host of a libvirt URI (`qemu+ssh://user@host:port/system`).
fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split('/').next()?;
    let host = authority.rsplit('@').next()?;
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}
