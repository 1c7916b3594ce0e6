//! Hypervisor trait definition.
//!
//! This module defines the interface the planner and the command line use
//! to reach the virtualization host.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::resolver::ParameterSet;

use super::types::{CreateOutcome, PoolType, VmInfo};

/// Operations on a virtualization host.
///
/// Calls are made one at a time; implementations need not be reentrant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Hypervisor: Send + Sync {
    /// Creates a VM from resolved parameters.
    ///
    /// A refusal by the host (existing VM, missing pool...) is a
    /// [`CreateOutcome::Rejected`], not an error.
    async fn create_vm(&self, name: &str, params: &ParameterSet) -> Result<CreateOutcome>;

    /// Starts a VM.
    async fn start_vm(&self, name: &str) -> Result<()>;

    /// Stops a VM.
    async fn stop_vm(&self, name: &str) -> Result<()>;

    /// Deletes a VM and its storage.
    async fn delete_vm(&self, name: &str) -> Result<()>;

    /// Lists every VM on the host.
    async fn list_vms(&self) -> Result<Vec<VmInfo>>;

    /// Lists storage pools.
    async fn list_pools(&self) -> Result<BTreeSet<String>>;

    /// Lists networks.
    async fn list_networks(&self) -> Result<BTreeSet<String>>;

    /// Lists ISO images when `iso` is true, disk templates otherwise.
    async fn list_volumes(&self, iso: bool) -> Result<BTreeSet<String>>;

    /// Clones `base` into `name`.
    async fn clone_vm(&self, base: &str, name: &str, full: bool, start: bool) -> Result<()>;

    /// Records a new address for a VM.
    async fn update_ip(&self, name: &str, ip: &str) -> Result<()>;

    /// Changes the memory of a VM, in MB.
    async fn update_memory(&self, name: &str, memory: u32) -> Result<()>;

    /// Changes the CPU count of a VM.
    async fn update_cpus(&self, name: &str, numcpus: u32) -> Result<()>;

    /// Adds a disk of `size` GB from `pool`.
    async fn add_disk(&self, name: &str, size: u32, pool: &str) -> Result<()>;

    /// Creates and starts a storage pool.
    async fn create_pool(&self, name: &str, path: &str, pool_type: PoolType) -> Result<()>;

    /// Removes a storage pool; `full` also deletes its contents.
    async fn delete_pool(&self, name: &str, full: bool) -> Result<()>;

    /// Creates and starts a NAT network.
    async fn create_network(&self, name: &str, cidr: &str, dhcp: bool) -> Result<()>;

    /// Removes a network.
    async fn delete_network(&self, name: &str) -> Result<()>;

    /// Attaches to the console of a VM.
    async fn console(&self, name: &str, serial: bool) -> Result<()>;

    /// Opens an SSH session to a VM.
    async fn ssh(&self, name: &str, user: &str) -> Result<()>;

    /// Describes a VM.
    async fn info(&self, name: &str) -> Result<String>;

    /// Describes the host.
    async fn report(&self) -> Result<String>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
