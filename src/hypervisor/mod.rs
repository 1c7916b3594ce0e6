//! Hypervisor module for kvirt.
//!
//! This module provides the boundary to the virtualization host:
//! - The [`Hypervisor`] trait the planner and commands program against
//! - A `virsh`/`virt-install` backed implementation
//! - Cloud-init and network documents generated for the host tools

mod backend;
mod cloudinit;
mod network;
mod types;
mod virsh;

#[cfg(test)]
pub use backend::MockHypervisor;
pub use backend::Hypervisor;
pub use cloudinit::{CloudInit, CloudInitFiles};
pub use network::{netmask_to_prefix, prefix_to_netmask, NetworkDefinition};
pub use types::{CreateOutcome, PoolType, VmInfo};
pub use virsh::{next_disk_target, virt_install_args, InstallMedia, VirshHypervisor};
