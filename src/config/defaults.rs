//! Built-in VM defaults and the fully populated default tier.

use serde::Serialize;

use crate::error::ResolveError;
use crate::resolver::{Disk, DiskSpec};

use super::spec::VmSpec;

/// Default storage pool.
pub const POOL: &str = "default";
/// Default number of CPUs.
pub const NUMCPUS: u32 = 2;
/// Default memory in MB.
pub const MEMORY: u32 = 512;
/// Default disk size in GB.
pub const DISKSIZE: u32 = 10;
/// Default disk bus.
pub const DISKINTERFACE: &str = "virtio";
/// Disks are thin provisioned by default.
pub const DISKTHIN: bool = true;
/// Default guest OS identifier.
pub const GUESTID: &str = "guestrhel764";
/// Default network.
pub const NET: &str = "default";
/// SPICE graphics by default.
pub const VNC: bool = false;
/// Cloud-init injection is on by default.
pub const CLOUDINIT: bool = true;
/// VMs are started after creation by default.
pub const START: bool = true;

/// The lowest-precedence tier: every field has a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultTier {
    /// Storage pool.
    pub pool: String,
    /// Number of CPUs.
    pub numcpus: u32,
    /// Memory in MB.
    pub memory: u32,
    /// Disks.
    pub disks: Vec<Disk>,
    /// Default disk size in GB.
    pub disksize: u32,
    /// Disk bus.
    pub diskinterface: String,
    /// Thin provisioning.
    pub diskthin: bool,
    /// Guest OS identifier.
    pub guestid: String,
    /// Networks.
    pub nets: Vec<String>,
    /// VNC graphics.
    pub vnc: bool,
    /// Cloud-init injection.
    pub cloudinit: bool,
    /// Start after creation.
    pub start: bool,
}

impl Default for DefaultTier {
    fn default() -> Self {
        Self {
            pool: String::from(POOL),
            numcpus: NUMCPUS,
            memory: MEMORY,
            disks: vec![Disk::new(DISKSIZE)],
            disksize: DISKSIZE,
            diskinterface: String::from(DISKINTERFACE),
            diskthin: DISKTHIN,
            guestid: String::from(GUESTID),
            nets: vec![String::from(NET)],
            vnc: VNC,
            cloudinit: CLOUDINIT,
            start: START,
        }
    }
}

impl DefaultTier {
    /// Returns a copy with every field set in `spec` replacing the current
    /// value.
    ///
    /// Fields that have no default (template, iso, keys...) are ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldType` if a scalar in `spec` cannot be coerced.
    pub fn overlay(mut self, spec: &VmSpec) -> Result<Self, ResolveError> {
        if let Some(pool) = &spec.pool {
            self.pool.clone_from(pool);
        }
        if let Some(numcpus) = &spec.numcpus {
            self.numcpus = numcpus.to_u32("numcpus")?;
        }
        if let Some(memory) = &spec.memory {
            self.memory = memory.to_u32("memory")?;
        }
        if let Some(disks) = &spec.disks {
            self.disks = DiskSpec::to_disks(disks)?;
        }
        if let Some(disksize) = &spec.disksize {
            self.disksize = disksize.to_u32("disksize")?;
        }
        if let Some(diskinterface) = &spec.diskinterface {
            self.diskinterface.clone_from(diskinterface);
        }
        if let Some(diskthin) = &spec.diskthin {
            self.diskthin = diskthin.to_bool("diskthin")?;
        }
        if let Some(guestid) = &spec.guestid {
            self.guestid.clone_from(guestid);
        }
        if let Some(nets) = &spec.nets {
            self.nets.clone_from(nets);
        }
        if let Some(vnc) = &spec.vnc {
            self.vnc = vnc.to_bool("vnc")?;
        }
        if let Some(cloudinit) = &spec.cloudinit {
            self.cloudinit = cloudinit.to_bool("cloudinit")?;
        }
        if let Some(start) = &spec.start {
            self.start = start.to_bool("start")?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ScalarValue;

    #[test]
    fn test_builtin_defaults() {
        let tier = DefaultTier::default();
        assert_eq!(tier.pool, "default");
        assert_eq!(tier.numcpus, 2);
        assert_eq!(tier.memory, 512);
        assert_eq!(tier.disks, vec![Disk::new(10)]);
        assert_eq!(tier.nets, vec![String::from("default")]);
        assert!(tier.cloudinit);
        assert!(!tier.vnc);
    }

    #[test]
    fn test_overlay_coerces_strings() {
        let spec = VmSpec {
            memory: Some(ScalarValue::from("1024")),
            cloudinit: Some(ScalarValue::from("False")),
            template: Some(String::from("ignored.qcow2")),
            ..VmSpec::default()
        };

        let tier = DefaultTier::default().overlay(&spec).unwrap();
        assert_eq!(tier.memory, 1024);
        assert!(!tier.cloudinit);
        assert_eq!(tier.numcpus, NUMCPUS);
    }

    #[test]
    fn test_overlay_rejects_bad_number() {
        let spec = VmSpec {
            numcpus: Some(ScalarValue::from("lots")),
            ..VmSpec::default()
        };
        assert!(DefaultTier::default().overlay(&spec).is_err());
    }
}
