//! Hypervisor backed by the libvirt command line tools.
//!
//! Every operation runs `virsh`, `virt-install` or `virt-clone` against a
//! connection URI. Output of the tools is parsed by the small pure helpers
//! at the bottom of this module.

use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{HypervisorError, KvirtError, Result};
use crate::resolver::ParameterSet;

use super::backend::Hypervisor;
use super::cloudinit::CloudInit;
use super::network::NetworkDefinition;
use super::types::{CreateOutcome, PoolType, VmInfo};

/// Public keys injected into every VM when present.
const PUBLIC_KEYS: &[&str] = &[".ssh/id_rsa.pub", ".ssh/id_ed25519.pub"];

/// Metadata namespace used to record addresses set with `update`.
const IP_METADATA_URI: &str = "http://kvirt.local/ip";

/// Hypervisor reached through `virsh -c <uri>`.
#[derive(Debug, Clone)]
pub struct VirshHypervisor {
    uri: String,
    work_dir: PathBuf,
}

/// Resolved paths handed to `virt-install`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallMedia {
    /// Path of the template volume, used as backing store of the first disk.
    pub template: Option<String>,
    /// Path of the ISO to attach.
    pub iso: Option<String>,
    /// Value of the `--cloud-init` option.
    pub cloud_init: Option<String>,
}

impl VirshHypervisor {
    /// Creates a hypervisor for `uri` without checking it.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            work_dir: std::env::temp_dir().join("kvirt"),
        }
    }

    /// Connects to `uri`, checking that libvirt answers.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if `virsh` cannot reach the URI.
    pub async fn connect(uri: impl Into<String>) -> Result<Self> {
        let hypervisor = Self::new(uri);
        hypervisor.virsh(&["uri"]).await.map_err(|e| {
            HypervisorError::ConnectionFailed {
                uri: hypervisor.uri.clone(),
                message: e.to_string(),
            }
        })?;
        info!("Connected to {}", hypervisor.uri);
        Ok(hypervisor)
    }

    /// Returns the connection URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    fn virsh_command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("virsh");
        command.args(["-c", self.uri.as_str()]).args(args);
        command
    }

    async fn virsh(&self, args: &[&str]) -> Result<String> {
        run(self.virsh_command(args)).await
    }

    /// Runs a virsh command about one VM, reporting a missing VM as such.
    async fn virsh_on(&self, name: &str, args: &[&str]) -> Result<String> {
        match self.virsh(args).await {
            Err(KvirtError::Hypervisor(HypervisorError::CommandFailed { stderr, .. }))
                if is_missing_domain(&stderr) =>
            {
                Err(HypervisorError::VmNotFound {
                    name: name.to_string(),
                }
                .into())
            }
            other => other,
        }
    }

    /// Runs a virsh command whose failure is expected in normal operation.
    async fn virsh_quiet(&self, args: &[&str]) {
        if let Err(e) = self.virsh(args).await {
            debug!("Ignoring: {e}");
        }
    }

    async fn vm_names(&self) -> Result<Vec<String>> {
        Ok(parse_names(&self.virsh(&["list", "--all", "--name"]).await?))
    }

    async fn volume_path(&self, pool: &str, volume: &str) -> Result<String> {
        let output = self.virsh(&["vol-path", "--pool", pool, volume]).await?;
        Ok(output.trim().to_string())
    }

    async fn describe(&self, name: &str) -> Result<VmInfo> {
        let status = self.virsh_on(name, &["domstate", name]).await?;
        let description = self.virsh(&["desc", name]).await.unwrap_or_default();
        let title = self.virsh(&["desc", "--title", name]).await.unwrap_or_default();
        let addresses = self.virsh(&["domifaddr", name]).await.unwrap_or_default();
        let disks = self
            .virsh(&["domblklist", name, "--details"])
            .await
            .unwrap_or_default();

        Ok(VmInfo {
            name: name.to_string(),
            status: status.trim().to_string(),
            ips: parse_domifaddr(&addresses),
            source: parse_block_devices(&disks)
                .into_iter()
                .find(|disk| disk.device == "disk")
                .map(|disk| file_name(&disk.source))
                .unwrap_or_default(),
            description: parse_metadata(&description),
            profile: parse_metadata(&title),
        })
    }

    async fn public_keys() -> Vec<String> {
        let Some(home) = dirs::home_dir() else {
            return Vec::new();
        };
        let mut keys = Vec::new();
        for relative in PUBLIC_KEYS {
            if let Ok(key) = fs::read_to_string(home.join(relative)).await {
                keys.push(key.trim().to_string());
            }
        }
        keys
    }

    /// Checks the host can satisfy `params`; returns the refusal reason if not.
    async fn check_resources(&self, name: &str, params: &ParameterSet) -> Result<Option<String>> {
        if self.vm_names().await?.iter().any(|vm| vm == name) {
            return Ok(Some(format!("VM {name} already exists")));
        }

        let pools = self.list_pools().await?;
        let wanted = std::iter::once(params.pool.as_str())
            .chain(params.disks.iter().filter_map(|disk| disk.pool.as_deref()));
        for pool in wanted {
            if !pools.contains(pool) {
                return Ok(Some(format!("Pool {pool} not found")));
            }
        }

        let networks = self.list_networks().await?;
        if let Some(net) = params.nets.iter().find(|net| !networks.contains(*net)) {
            return Ok(Some(format!("Network {net} not found")));
        }

        Ok(None)
    }

    /// Resolves template, ISO and cloud-init paths; `Err` is a refusal reason.
    async fn install_media(
        &self,
        name: &str,
        params: &ParameterSet,
    ) -> Result<std::result::Result<InstallMedia, String>> {
        let mut media = InstallMedia::default();

        if let Some(template) = params.template.as_deref() {
            match self.volume_path(&params.pool, template).await {
                Ok(path) => media.template = Some(path),
                Err(_) => return Ok(Err(format!("Template {template} not found"))),
            }
        }

        if let Some(iso) = params.iso.as_deref() {
            if iso.starts_with('/') {
                media.iso = Some(iso.to_string());
            } else {
                match self.volume_path(&params.pool, iso).await {
                    Ok(path) => media.iso = Some(path),
                    Err(_) => return Ok(Err(format!("Iso {iso} not found"))),
                }
            }
        }

        if params.cloudinit && media.template.is_some() {
            let mut cloud_init = CloudInit::new(name, params);
            for key in Self::public_keys().await {
                cloud_init = cloud_init.with_key(key);
            }
            media.cloud_init = Some(cloud_init.write(&self.work_dir).await?.to_option());
        }

        Ok(Ok(media))
    }

    async fn write_work_file(&self, file: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(file);
        fs::write(&path, content).await?;
        Ok(path)
    }
}

#[async_trait]
impl Hypervisor for VirshHypervisor {
    async fn create_vm(&self, name: &str, params: &ParameterSet) -> Result<CreateOutcome> {
        if let Some(reason) = check_metadata(params) {
            return Ok(CreateOutcome::rejected(reason));
        }
        if let Some(reason) = self.check_resources(name, params).await? {
            return Ok(CreateOutcome::rejected(reason));
        }
        let media = match self.install_media(name, params).await? {
            Ok(media) => media,
            Err(reason) => return Ok(CreateOutcome::rejected(reason)),
        };

        let mut command = Command::new("virt-install");
        command.args(virt_install_args(&self.uri, name, params, &media));

        match run(command).await {
            Ok(_) => {}
            Err(KvirtError::Hypervisor(HypervisorError::CommandFailed { stderr, .. })) => {
                return Ok(CreateOutcome::rejected(stderr));
            }
            Err(e) => return Err(e),
        }

        if !params.start {
            self.virsh_quiet(&["destroy", name]).await;
        }
        info!("Created {name}");
        Ok(CreateOutcome::Created)
    }

    async fn start_vm(&self, name: &str) -> Result<()> {
        self.virsh_on(name, &["start", name]).await?;
        Ok(())
    }

    async fn stop_vm(&self, name: &str) -> Result<()> {
        self.virsh_on(name, &["destroy", name]).await?;
        Ok(())
    }

    async fn delete_vm(&self, name: &str) -> Result<()> {
        self.virsh_quiet(&["destroy", name]).await;
        self.virsh_on(name, &["undefine", name, "--remove-all-storage"])
            .await?;
        Ok(())
    }

    async fn list_vms(&self) -> Result<Vec<VmInfo>> {
        let mut vms = Vec::new();
        for name in self.vm_names().await? {
            match self.describe(&name).await {
                Ok(vm) => vms.push(vm),
                // Removed between listing and describing.
                Err(KvirtError::Hypervisor(HypervisorError::VmNotFound { .. })) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(vms)
    }

    async fn list_pools(&self) -> Result<BTreeSet<String>> {
        let output = self.virsh(&["pool-list", "--all", "--name"]).await?;
        Ok(parse_names(&output).into_iter().collect())
    }

    async fn list_networks(&self) -> Result<BTreeSet<String>> {
        let output = self.virsh(&["net-list", "--all", "--name"]).await?;
        Ok(parse_names(&output).into_iter().collect())
    }

    async fn list_volumes(&self, iso: bool) -> Result<BTreeSet<String>> {
        let mut volumes = BTreeSet::new();
        for pool in self.list_pools().await? {
            let output = match self.virsh(&["vol-list", &pool]).await {
                Ok(output) => output,
                Err(e) => {
                    warn!("Skipping pool {pool}: {e}");
                    continue;
                }
            };
            volumes.extend(
                parse_table(&output)
                    .into_iter()
                    .filter_map(|row| row.into_iter().next())
                    .filter(|volume| is_iso(volume) == iso),
            );
        }
        Ok(volumes)
    }

    async fn clone_vm(&self, base: &str, name: &str, full: bool, start: bool) -> Result<()> {
        let mut command = Command::new("virt-clone");
        command.args([
            "--connect",
            self.uri.as_str(),
            "--original",
            base,
            "--name",
            name,
            "--auto-clone",
        ]);
        if !full {
            command.arg("--reflink");
        }
        run(command).await?;

        if start {
            self.start_vm(name).await?;
        }
        Ok(())
    }

    async fn update_ip(&self, name: &str, ip: &str) -> Result<()> {
        let xml = format!("<ip>{ip}</ip>");
        self.virsh_on(
            name,
            &["metadata", name, IP_METADATA_URI, "--key", "kvirt", "--set", &xml, "--config"],
        )
        .await?;
        Ok(())
    }

    async fn update_memory(&self, name: &str, memory: u32) -> Result<()> {
        let memory = format!("{memory}M");
        self.virsh_on(name, &["setmaxmem", name, &memory, "--config"])
            .await?;
        self.virsh_on(name, &["setmem", name, &memory, "--config"])
            .await?;
        Ok(())
    }

    async fn update_cpus(&self, name: &str, numcpus: u32) -> Result<()> {
        let numcpus = numcpus.to_string();
        self.virsh_on(name, &["setvcpus", name, &numcpus, "--config", "--maximum"])
            .await?;
        self.virsh_on(name, &["setvcpus", name, &numcpus, "--config"])
            .await?;
        Ok(())
    }

    async fn add_disk(&self, name: &str, size: u32, pool: &str) -> Result<()> {
        if !self.list_pools().await?.contains(pool) {
            return Err(HypervisorError::invalid_argument(format!("Pool {pool} not found")).into());
        }

        let devices = self.virsh_on(name, &["domblklist", name, "--details"]).await?;
        let targets: Vec<String> = parse_block_devices(&devices)
            .into_iter()
            .map(|disk| disk.target)
            .collect();
        let target = next_disk_target(&targets, "vd");
        let volume = format!("{name}_{target}.qcow2");

        self.virsh(&[
            "vol-create-as",
            pool,
            &volume,
            &format!("{size}G"),
            "--format",
            "qcow2",
        ])
        .await?;
        let path = self.volume_path(pool, &volume).await?;
        self.virsh_on(
            name,
            &[
                "attach-disk",
                name,
                &path,
                &target,
                "--driver",
                "qemu",
                "--subdriver",
                "qcow2",
                "--persistent",
            ],
        )
        .await?;

        info!("Added {size}GB disk {target} to {name}");
        Ok(())
    }

    async fn create_pool(&self, name: &str, path: &str, pool_type: PoolType) -> Result<()> {
        match pool_type {
            PoolType::Dir => {
                self.virsh(&["pool-define-as", name, "dir", "--target", path])
                    .await?;
            }
            PoolType::Logical => {
                let volume_group = file_name(path);
                self.virsh(&[
                    "pool-define-as",
                    name,
                    "logical",
                    "--source-name",
                    &volume_group,
                    "--target",
                    path,
                ])
                .await?;
            }
        }
        if pool_type == PoolType::Dir {
            self.virsh(&["pool-build", name]).await?;
        }
        self.virsh(&["pool-start", name]).await?;
        self.virsh(&["pool-autostart", name]).await?;

        info!("Created {pool_type} pool {name} at {path}");
        Ok(())
    }

    async fn delete_pool(&self, name: &str, full: bool) -> Result<()> {
        self.virsh_quiet(&["pool-destroy", name]).await;
        if full {
            self.virsh(&["pool-delete", name]).await?;
        }
        self.virsh(&["pool-undefine", name]).await?;
        Ok(())
    }

    async fn create_network(&self, name: &str, cidr: &str, dhcp: bool) -> Result<()> {
        let network = NetworkDefinition::from_cidr(name, cidr, dhcp)?;
        let path = self
            .write_work_file(&format!("{name}-net.xml"), &network.to_xml())
            .await?;
        let path = path.to_string_lossy();

        self.virsh(&["net-define", &path]).await?;
        self.virsh(&["net-start", name]).await?;
        self.virsh(&["net-autostart", name]).await?;

        info!("Created network {name} on {cidr}");
        Ok(())
    }

    async fn delete_network(&self, name: &str) -> Result<()> {
        self.virsh_quiet(&["net-destroy", name]).await;
        self.virsh(&["net-undefine", name]).await?;
        Ok(())
    }

    async fn console(&self, name: &str, serial: bool) -> Result<()> {
        let command = if serial {
            self.virsh_command(&["console", name])
        } else {
            let mut command = Command::new("virt-viewer");
            command.args(["-c", self.uri.as_str(), name]);
            command
        };
        run_attached(command).await
    }

    async fn ssh(&self, name: &str, user: &str) -> Result<()> {
        let vm = self.describe(name).await?;
        let ip = vm.ips.first().ok_or_else(|| {
            HypervisorError::invalid_argument(format!("No ip found for {name}"))
        })?;

        let target = format!("{user}@{ip}");
        let mut command = Command::new("ssh");
        command.args([
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            target.as_str(),
        ]);
        run_attached(command).await
    }

    async fn info(&self, name: &str) -> Result<String> {
        let vm = self.describe(name).await?;
        let mut info = self.virsh_on(name, &["dominfo", name]).await?;

        let extra = [
            ("Plan", vm.description),
            ("Profile", vm.profile),
            ("Source", vm.source),
            ("Ips", vm.ips.join(", ")),
        ];
        for (label, value) in extra {
            if !value.is_empty() {
                let _ = writeln!(info, "{label:<16}{value}");
            }
        }
        Ok(info.trim_end().to_string())
    }

    async fn report(&self) -> Result<String> {
        let node = self.virsh(&["nodeinfo"]).await?;
        let pools = self.list_pools().await?;
        let networks = self.list_networks().await?;
        let vms = self.vm_names().await?;

        Ok(format!(
            "Connection:     {}\n{}\nVMs:            {}\nPools:          {}\nNetworks:       {}",
            self.uri,
            node.trim_end(),
            vms.len(),
            pools.into_iter().collect::<Vec<_>>().join(", "),
            networks.into_iter().collect::<Vec<_>>().join(", "),
        ))
    }

    fn backend_type(&self) -> &'static str {
        "virsh"
    }
}

/// Runs a command to completion and returns its standard output.
async fn run(mut command: Command) -> Result<String> {
    let command_line = describe_command(&command);
    debug!("Running {command_line}");

    let output = command
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| HypervisorError::command(&command_line, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(HypervisorError::command(command_line, stderr).into());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Runs a command attached to the terminal.
async fn run_attached(mut command: Command) -> Result<()> {
    let command_line = describe_command(&command);
    debug!("Running {command_line}");

    let status = command
        .status()
        .await
        .map_err(|e| HypervisorError::command(&command_line, e.to_string()))?;
    if status.success() {
        Ok(())
    } else {
        Err(HypervisorError::command(command_line, status.to_string()).into())
    }
}

fn describe_command(command: &Command) -> String {
    let command = command.as_std();
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_missing_domain(stderr: &str) -> bool {
    stderr.contains("failed to get domain") || stderr.contains("Domain not found")
}

fn is_iso(volume: &str) -> bool {
    Path::new(volume)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("iso"))
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned())
}

/// Builds the `virt-install` arguments for a VM.
#[must_use]
pub fn virt_install_args(
    uri: &str,
    name: &str,
    params: &ParameterSet,
    media: &InstallMedia,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--connect".into(),
        uri.into(),
        "--name".into(),
        name.into(),
        "--metadata".into(),
        format!("description={},title={}", params.description, params.title),
        "--vcpus".into(),
        params.numcpus.to_string(),
        "--memory".into(),
        params.memory.to_string(),
        "--osinfo".into(),
        osinfo(&params.guestid),
    ];

    let sparse = if params.diskthin { "yes" } else { "no" };
    for (index, disk) in params.disks.iter().enumerate() {
        let size = if disk.size == 0 { params.disksize } else { disk.size };
        let pool = disk.pool.as_deref().unwrap_or(&params.pool);
        let mut spec = format!(
            "pool={pool},size={size},bus={},format=qcow2,sparse={sparse}",
            params.diskinterface
        );
        if index == 0 {
            if let Some(template) = media.template.as_deref() {
                let _ = write!(spec, ",backing_store={template}");
            }
        }
        args.push("--disk".into());
        args.push(spec);
    }

    if params.nets.is_empty() {
        args.push("--network".into());
        args.push("none".into());
    }
    for net in &params.nets {
        args.push("--network".into());
        args.push(format!("network={net},model=virtio"));
    }

    match (media.template.is_some(), media.iso.as_deref()) {
        (true, Some(iso)) => {
            args.push("--import".into());
            args.push("--disk".into());
            args.push(format!("{iso},device=cdrom"));
        }
        (true, None) => args.push("--import".into()),
        (false, Some(iso)) => {
            args.push("--cdrom".into());
            args.push(iso.into());
        }
        (false, None) => args.push("--pxe".into()),
    }

    args.push("--graphics".into());
    args.push(if params.vnc {
        "vnc,listen=0.0.0.0".into()
    } else {
        "spice".into()
    });

    if let Some(cloud_init) = media.cloud_init.as_deref() {
        args.push("--cloud-init".into());
        args.push(cloud_init.into());
    }

    args.push("--noautoconsole".into());
    if !params.start {
        args.push("--noreboot".into());
    }
    args
}

/// virt-install splits `--metadata` on commas, so tags must not contain one.
fn check_metadata(params: &ParameterSet) -> Option<String> {
    [("Plan", &params.description), ("Profile", &params.title)]
        .into_iter()
        .find(|(_, value)| value.contains(','))
        .map(|(kind, value)| format!("{kind} name {value} cannot contain a comma"))
}

/// `guestrhel764`-style identifiers have no libvirt counterpart; those let
/// virt-install detect the OS.
fn osinfo(guestid: &str) -> String {
    if guestid.starts_with("guest") {
        String::from("detect=on,require=off")
    } else {
        guestid.to_string()
    }
}

/// Picks the first free target for a new disk, e.g. `vdc` after `vda, vdb`.
#[must_use]
pub fn next_disk_target(targets: &[String], prefix: &str) -> String {
    ('a'..='z')
        .map(|letter| format!("{prefix}{letter}"))
        .find(|target| !targets.iter().any(|used| used == target))
        .unwrap_or_else(|| format!("{prefix}aa"))
}

/// Splits `--name` style output into names.
fn parse_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Splits a virsh table into rows of columns, dropping the header.
fn parse_table(output: &str) -> Vec<Vec<String>> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .map(|line| line.split_whitespace().map(ToString::to_string).collect::<Vec<_>>())
        .filter(|row| !row.is_empty())
        .collect()
}

/// Addresses from `virsh domifaddr`, without prefix length.
fn parse_domifaddr(output: &str) -> Vec<String> {
    parse_table(output)
        .into_iter()
        .filter_map(|row| row.get(3).cloned())
        .map(|address| {
            address
                .split_once('/')
                .map_or(address.clone(), |(ip, _)| ip.to_string())
        })
        .collect()
}

#[derive(Debug, PartialEq, Eq)]
struct BlockDevice {
    device: String,
    target: String,
    source: String,
}

/// Rows of `virsh domblklist --details`.
fn parse_block_devices(output: &str) -> Vec<BlockDevice> {
    parse_table(output)
        .into_iter()
        .filter(|row| row.len() >= 4)
        .map(|row| BlockDevice {
            device: row[1].clone(),
            target: row[2].clone(),
            source: row[3..].join(" "),
        })
        .collect()
}

/// Output of `virsh desc`, empty when unset.
fn parse_metadata(output: &str) -> String {
    let value = output.trim();
    if value.starts_with("No description for domain") || value.starts_with("No title for domain") {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefaultTier, Profiles, VmSpec};
    use crate::resolver::{ConfigResolver, Disk, ScalarValue, Tagging};

    fn params(explicit: &VmSpec) -> ParameterSet {
        let defaults = DefaultTier::default();
        let profiles = Profiles::new();
        ConfigResolver::new(&defaults, &profiles)
            .resolve_vm(explicit, None, Tagging::new("lab", "centos"))
            .unwrap()
    }

    fn value_of<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
            .collect()
    }

    #[test]
    fn test_virt_install_args_template() {
        let params = params(&VmSpec {
            template: Some(String::from("centos.qcow2")),
            disks: Some(vec![Disk::new(10).into(), Disk::new(0).into()]),
            disksize: Some(ScalarValue::from(5_u32)),
            nets: Some(vec![String::from("default"), String::from("cinet")]),
            ..VmSpec::default()
        });
        let media = InstallMedia {
            template: Some(String::from("/var/lib/libvirt/images/centos.qcow2")),
            iso: None,
            cloud_init: Some(String::from("user-data=/tmp/kvirt/web-user-data")),
        };

        let args = virt_install_args("qemu:///system", "web", &params, &media);

        assert_eq!(value_of(&args, "--name"), ["web"]);
        assert_eq!(value_of(&args, "--metadata"), ["description=lab,title=centos"]);
        assert_eq!(value_of(&args, "--vcpus"), ["2"]);
        assert_eq!(value_of(&args, "--memory"), ["512"]);
        assert_eq!(
            value_of(&args, "--disk"),
            [
                "pool=default,size=10,bus=virtio,format=qcow2,sparse=yes,\
                 backing_store=/var/lib/libvirt/images/centos.qcow2",
                "pool=default,size=5,bus=virtio,format=qcow2,sparse=yes",
            ]
        );
        assert_eq!(
            value_of(&args, "--network"),
            ["network=default,model=virtio", "network=cinet,model=virtio"]
        );
        assert!(args.contains(&String::from("--import")));
        assert_eq!(value_of(&args, "--graphics"), ["spice"]);
        assert_eq!(
            value_of(&args, "--cloud-init"),
            ["user-data=/tmp/kvirt/web-user-data"]
        );
        assert!(!args.contains(&String::from("--noreboot")));
    }

    #[test]
    fn test_virt_install_args_iso() {
        let params = params(&VmSpec {
            vnc: Some(true.into()),
            start: Some(false.into()),
            diskthin: Some(false.into()),
            ..VmSpec::default()
        });
        let media = InstallMedia {
            iso: Some(String::from("/isos/fedora.iso")),
            ..InstallMedia::default()
        };

        let args = virt_install_args("qemu:///system", "web", &params, &media);

        assert_eq!(value_of(&args, "--cdrom"), ["/isos/fedora.iso"]);
        assert!(!args.contains(&String::from("--import")));
        assert_eq!(value_of(&args, "--graphics"), ["vnc,listen=0.0.0.0"]);
        assert!(value_of(&args, "--disk")[0].contains("sparse=no"));
        assert!(args.contains(&String::from("--noreboot")));
        assert!(value_of(&args, "--cloud-init").is_empty());
    }

    #[test]
    fn test_virt_install_args_disk_pool() {
        let params = params(&VmSpec {
            disks: Some(vec![Disk {
                size: 20,
                pool: Some(String::from("fast")),
            }
            .into()]),
            ..VmSpec::default()
        });

        let args = virt_install_args("qemu:///system", "db", &params, &InstallMedia::default());

        assert!(value_of(&args, "--disk")[0].starts_with("pool=fast,size=20"));
        assert!(args.contains(&String::from("--pxe")));
    }

    #[test]
    fn test_metadata_with_comma_is_refused() {
        let base = params(&VmSpec::default());
        assert!(check_metadata(&base).is_none());

        let titled = ParameterSet {
            title: String::from("centos,7"),
            ..base.clone()
        };
        assert_eq!(
            check_metadata(&titled).as_deref(),
            Some("Profile name centos,7 cannot contain a comma")
        );

        let tagged = ParameterSet {
            description: String::from("a,b"),
            ..base.clone()
        };
        assert_eq!(
            check_metadata(&tagged).as_deref(),
            Some("Plan name a,b cannot contain a comma")
        );

        let escaped = ParameterSet {
            description: String::from("R&D <lab>"),
            title: String::from("it's"),
            ..base
        };
        assert!(check_metadata(&escaped).is_none());
    }

    #[test]
    fn test_describe_command() {
        let mut command = Command::new("virsh");
        command.args(["-c", "qemu:///system", "start", "web"]);
        assert_eq!(describe_command(&command), "virsh -c qemu:///system start web");
    }

    #[test]
    fn test_osinfo() {
        assert_eq!(osinfo("guestrhel764"), "detect=on,require=off");
        assert_eq!(osinfo("centos7.0"), "centos7.0");
    }

    #[test]
    fn test_next_disk_target() {
        let targets = vec![String::from("vda"), String::from("vdb"), String::from("hda")];
        assert_eq!(next_disk_target(&targets, "vd"), "vdc");
        assert_eq!(next_disk_target(&[], "vd"), "vda");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(parse_names("web\ndb\n\n"), ["web", "db"]);
    }

    #[test]
    fn test_parse_domifaddr() {
        let output = " Name       MAC address          Protocol     Address
-------------------------------------------------------------------------------
 vnet0      52:54:00:4b:73:5f    ipv4         192.168.122.10/24
 vnet1      52:54:00:4b:73:60    ipv4         10.0.0.4/16
";
        assert_eq!(parse_domifaddr(output), ["192.168.122.10", "10.0.0.4"]);
        assert!(parse_domifaddr("").is_empty());
    }

    #[test]
    fn test_parse_block_devices() {
        let output = " Type   Device   Target   Source
------------------------------------------------
 file   disk     vda      /var/lib/libvirt/images/web.qcow2
 file   cdrom    hda      -
";
        let devices = parse_block_devices(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].target, "vda");
        assert_eq!(file_name(&devices[0].source), "web.qcow2");
        assert_eq!(devices[1].device, "cdrom");
    }

    #[test]
    fn test_parse_volumes() {
        let output = " Name              Path
------------------------------------------------------------
 centos.qcow2      /var/lib/libvirt/images/centos.qcow2
 fedora.iso        /var/lib/libvirt/images/fedora.iso
";
        let names: Vec<String> = parse_table(output)
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect();
        assert_eq!(names, ["centos.qcow2", "fedora.iso"]);
        assert!(is_iso(&names[1]));
        assert!(!is_iso(&names[0]));
    }

    #[test]
    fn test_parse_metadata() {
        assert_eq!(parse_metadata("lab\n"), "lab");
        assert_eq!(parse_metadata("No description for domain: web\n"), "");
        assert_eq!(parse_metadata("No title for domain: web"), "");
    }

    #[test]
    fn test_missing_domain() {
        assert!(is_missing_domain("error: failed to get domain 'web'"));
        assert!(!is_missing_domain("error: Requested operation is not valid"));
    }
}
