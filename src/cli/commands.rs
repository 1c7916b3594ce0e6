//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::hypervisor::PoolType;

/// kcli - Libvirt front end driven by profiles and plans.
#[derive(Parser, Debug)]
#[command(name = "kcli")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the client configuration file (defaults to ~/kcli.yml).
    #[arg(short = 'C', long, global = true, env = "KCLI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the profiles file (defaults to ~/kcli_profiles.yml).
    #[arg(long, global = true, env = "KCLI_PROFILES")]
    pub profiles_file: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create vm from given profile.
    Create {
        /// Profile to use.
        #[arg(short, long)]
        profile: String,

        /// Ip to assign to eth0.
        #[arg(short = '1', long)]
        ip1: Option<String>,

        /// Ip to assign to eth1.
        #[arg(short = '2', long)]
        ip2: Option<String>,

        /// Ip to assign to eth2.
        #[arg(short = '3', long)]
        ip3: Option<String>,

        /// Ip to assign to eth3.
        #[arg(short = '4', long)]
        ip4: Option<String>,

        /// Ip to assign to eth4.
        #[arg(short = '5', long)]
        ip5: Option<String>,

        /// Ip to assign to eth5.
        #[arg(short = '6', long)]
        ip6: Option<String>,

        /// Ip to assign to eth6.
        #[arg(short = '7', long)]
        ip7: Option<String>,

        /// Ip to assign to eth7.
        #[arg(short = '8', long)]
        ip8: Option<String>,

        /// Name of the vm.
        name: String,
    },

    /// Create/Delete/Stop/Start vms from plan file.
    Plan {
        /// Plan file (defaults to kcli_plan.yml).
        #[arg(short = 'f', long)]
        inputfile: Option<PathBuf>,

        /// Start the vms of the plan.
        #[arg(short, long, conflicts_with_all = ["stop", "delete", "dry_run"])]
        start: bool,

        /// Stop the vms of the plan.
        #[arg(short = 'w', long, conflicts_with_all = ["delete", "dry_run"])]
        stop: bool,

        /// Delete the vms of the plan.
        #[arg(short, long, conflicts_with = "dry_run")]
        delete: bool,

        /// Show the resolved parameters without creating anything.
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Plan name (defaults to kvirt).
        plan: Option<String>,
    },

    /// Clone existing vm.
    Clone {
        /// Base vm.
        #[arg(short, long)]
        base: String,

        /// Full copy instead of a linked clone.
        #[arg(short, long)]
        full: bool,

        /// Start the clone.
        #[arg(short, long)]
        start: bool,

        /// Name of the clone.
        name: String,
    },

    /// Update ip, memory or numcpus.
    Update {
        /// Ip to set.
        #[arg(short = '1', long)]
        ip: Option<String>,

        /// Memory to set, in MB.
        #[arg(short, long)]
        memory: Option<u32>,

        /// Number of cpus to set.
        #[arg(short = 'c', long)]
        numcpus: Option<u32>,

        /// Name of the vm.
        name: String,
    },

    /// Add disk to vm.
    Add {
        /// Size of the disk to add, in GB.
        #[arg(short, long)]
        size: u32,

        /// Pool.
        #[arg(short, long)]
        pool: String,

        /// Name of the vm.
        name: String,
    },

    /// Delete vm.
    Delete {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Name of the vm.
        name: String,
    },

    /// Start vm.
    Start {
        /// Name of the vm.
        name: String,
    },

    /// Stop vm.
    Stop {
        /// Name of the vm.
        name: String,
    },

    /// List clients, profiles, templates, isos, pools or vms.
    List {
        /// List clients.
        #[arg(short, long)]
        clients: bool,

        /// List profiles.
        #[arg(short, long)]
        profiles: bool,

        /// List templates.
        #[arg(short, long)]
        templates: bool,

        /// List isos.
        #[arg(short, long)]
        isos: bool,

        /// List pools.
        #[arg(short = 'P', long)]
        pools: bool,

        /// List networks.
        #[arg(short, long)]
        networks: bool,
    },

    /// Info about vm.
    Info {
        /// Name of the vm.
        name: String,
    },

    /// Vnc/Spice/Serial console.
    Console {
        /// Use the serial console.
        #[arg(short, long)]
        serial: bool,

        /// Name of the vm.
        name: String,
    },

    /// Ssh into vm.
    Ssh {
        /// User to log in as.
        #[arg(short, long, default_value = "root")]
        user: String,

        /// Name of the vm.
        name: String,
    },

    /// Create/Delete network.
    Network {
        /// Delete the network.
        #[arg(short, long)]
        delete: bool,

        /// Cidr of the net.
        #[arg(short, long, required_unless_present = "delete")]
        cidr: Option<String>,

        /// Enable dhcp on the net.
        #[arg(long)]
        dhcp: bool,

        /// Name of the network.
        name: String,
    },

    /// Create/Delete pool.
    Pool {
        /// Delete the pool.
        #[arg(short, long)]
        delete: bool,

        /// Also delete the pool contents.
        #[arg(short, long)]
        full: bool,

        /// Type of the pool.
        #[arg(short = 't', long, default_value = "dir")]
        pooltype: PoolType,

        /// Path of the pool.
        #[arg(short, long)]
        path: Option<String>,

        /// Name of the pool.
        pool: String,
    },

    /// Report hypervisor setup.
    Report,

    /// Switch from a client to another.
    Switch {
        /// Client to switch to.
        client: String,
    },

    /// Bootstrap hypervisor, creating config file and pools and networks.
    Bootstrap {
        /// Don't ask for anything.
        #[arg(short, long, visible_alias = "genfile")]
        auto: bool,

        /// Client name to use.
        #[arg(short, long)]
        name: Option<String>,

        /// Host to use.
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to use.
        #[arg(short, long)]
        port: Option<u16>,

        /// User to use.
        #[arg(short, long, default_value = "root")]
        user: String,

        /// Protocol to use.
        #[arg(short = 'P', long, default_value = "ssh")]
        protocol: String,

        /// URL to use.
        #[arg(short = 'U', long)]
        url: Option<String>,

        /// Pool to use.
        #[arg(long, default_value = "default")]
        pool: String,

        /// Pool path to use.
        #[arg(long, default_value = "/var/lib/libvirt/images")]
        poolpath: String,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    /// Returns true for commands that work without a hypervisor connection.
    #[must_use]
    pub const fn is_offline(&self) -> bool {
        matches!(
            self,
            Self::Switch { .. } | Self::Bootstrap { .. } | Self::Plan { dry_run: true, .. }
        ) || matches!(
            self,
            Self::List {
                clients: true,
                ..
            } | Self::List {
                profiles: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_ips() {
        let cli = Cli::try_parse_from([
            "kcli", "create", "-p", "centos", "-1", "10.0.0.5", "-3", "10.0.2.5", "web",
        ])
        .unwrap();
        match cli.command {
            Commands::Create {
                profile,
                ip1,
                ip2,
                ip3,
                name,
                ..
            } => {
                assert_eq!(profile, "centos");
                assert_eq!(ip1.as_deref(), Some("10.0.0.5"));
                assert!(ip2.is_none());
                assert_eq!(ip3.as_deref(), Some("10.0.2.5"));
                assert_eq!(name, "web");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_plan_flags_conflict() {
        assert!(Cli::try_parse_from(["kcli", "plan", "--start", "--delete"]).is_err());
        assert!(Cli::try_parse_from(["kcli", "plan", "-w", "lab"]).is_ok());
    }

    #[test]
    fn test_network_requires_cidr() {
        assert!(Cli::try_parse_from(["kcli", "network", "lab"]).is_err());
        assert!(Cli::try_parse_from(["kcli", "network", "-d", "lab"]).is_ok());
    }

    #[test]
    fn test_offline_commands() {
        let cli = Cli::try_parse_from(["kcli", "list", "-c"]).unwrap();
        assert!(cli.command.is_offline());
        let cli = Cli::try_parse_from(["kcli", "list"]).unwrap();
        assert!(!cli.command.is_offline());
        let cli = Cli::try_parse_from(["kcli", "plan", "--dry-run"]).unwrap();
        assert!(cli.command.is_offline());
    }
}
