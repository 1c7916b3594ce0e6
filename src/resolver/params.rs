//! Resolved parameter types handed to the hypervisor.

use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

use super::value::ScalarValue;

/// A disk attached at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disk {
    /// Size in GB.
    pub size: u32,
    /// Pool override for this disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
}

/// A disk as written in a tier document.
///
/// Either a bare size (`10`) or a mapping (`{size: 10, pool: fast}`). The
/// size stays loose until the disk list of the winning tier is coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiskSpec {
    /// Size only.
    Size(ScalarValue),
    /// Size and pool.
    Detailed {
        /// Size in GB.
        size: ScalarValue,
        /// Pool override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pool: Option<String>,
    },
}

impl DiskSpec {
    /// Coerces the written disk into a [`Disk`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldType` if the size is not a whole number.
    pub fn to_disk(&self) -> Result<Disk, ResolveError> {
        match self {
            Self::Size(size) => Ok(Disk::new(size.to_u32("disks")?)),
            Self::Detailed { size, pool } => Ok(Disk {
                size: size.to_u32("disks")?,
                pool: pool.clone(),
            }),
        }
    }

    /// Coerces a whole disk list.
    ///
    /// # Errors
    ///
    /// Returns the first coercion error.
    pub fn to_disks(specs: &[Self]) -> Result<Vec<Disk>, ResolveError> {
        specs.iter().map(Self::to_disk).collect()
    }
}

impl From<Disk> for DiskSpec {
    fn from(disk: Disk) -> Self {
        match disk.pool {
            None => Self::Size(ScalarValue::from(disk.size)),
            Some(pool) => Self::Detailed {
                size: ScalarValue::from(disk.size),
                pool: Some(pool),
            },
        }
    }
}

impl Disk {
    /// Creates a disk of the given size in the VM's pool.
    #[must_use]
    pub const fn new(size: u32) -> Self {
        Self { size, pool: None }
    }
}

/// Tag attributes recorded on a created VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagging {
    /// Plan tag; start/stop/delete of a plan select VMs by it.
    pub description: String,
    /// Profile the VM came from (or the plan name).
    pub title: String,
}

impl Tagging {
    /// Creates tagging attributes.
    #[must_use]
    pub fn new(description: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            title: title.into(),
        }
    }
}

/// The fully resolved configuration of one VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSet {
    /// Plan tag.
    pub description: String,
    /// Profile name or plan name.
    pub title: String,
    /// Storage pool for the disks.
    pub pool: String,
    /// Base image used as backing store of the first disk.
    pub template: Option<String>,
    /// Number of virtual CPUs.
    pub numcpus: u32,
    /// Memory in MB.
    pub memory: u32,
    /// Disks to create.
    pub disks: Vec<Disk>,
    /// Default disk size in GB.
    pub disksize: u32,
    /// Disk bus (virtio, ide, scsi...).
    pub diskinterface: String,
    /// Whether disks are thin provisioned.
    pub diskthin: bool,
    /// Guest OS identifier.
    pub guestid: String,
    /// Networks, one NIC each.
    pub nets: Vec<String>,
    /// ISO to attach as CD-ROM.
    pub iso: Option<String>,
    /// VNC instead of SPICE graphics.
    pub vnc: bool,
    /// Whether to inject cloud-init data.
    pub cloudinit: bool,
    /// Whether to start the VM once created.
    pub start: bool,
    /// SSH public keys to inject.
    pub keys: Option<Vec<String>>,
    /// Commands run on first boot.
    pub cmds: Option<Vec<String>>,
    /// Static addresses, one per NIC; empty strings leave a NIC on DHCP.
    pub ips: Option<Vec<String>>,
    /// Netmasks matching `ips`.
    pub netmasks: Option<Vec<String>>,
    /// Default gateway.
    pub gateway: Option<String>,
    /// DNS server.
    pub dns: Option<String>,
    /// DNS domain.
    pub domain: Option<String>,
    /// Script files whose lines were appended to `cmds`.
    pub scripts: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_forms() {
        let specs: Vec<DiskSpec> =
            serde_yaml::from_str("[10, {size: 20}, {size: \"30\", pool: fast}]").unwrap();
        let disks = DiskSpec::to_disks(&specs).unwrap();
        assert_eq!(disks[0], Disk::new(10));
        assert_eq!(disks[1], Disk::new(20));
        assert_eq!(disks[2].size, 30);
        assert_eq!(disks[2].pool.as_deref(), Some("fast"));
    }

    #[test]
    fn test_bad_disk_size_parses_but_does_not_coerce() {
        let specs: Vec<DiskSpec> = serde_yaml::from_str("[{size: big}]").unwrap();
        let result = DiskSpec::to_disks(&specs);
        assert!(matches!(
            result,
            Err(ResolveError::InvalidFieldType { ref field, ref value, .. })
                if field == "disks" && value == "big"
        ));
    }

    #[test]
    fn test_disk_from_resolved() {
        let spec = DiskSpec::from(Disk {
            size: 20,
            pool: Some(String::from("fast")),
        });
        assert_eq!(
            spec.to_disk().unwrap(),
            Disk {
                size: 20,
                pool: Some(String::from("fast"))
            }
        );
    }
}
