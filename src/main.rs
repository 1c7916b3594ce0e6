//! kcli entrypoint.
//!
//! This is the main entrypoint for the kcli command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kvirt::cli::{Cli, Commands, OutputFormatter};
use kvirt::config::{
    write_clients, Bootstrap, ConfigParser, ConfigValidator, Session, VmSpec, BOOTSTRAP_NETWORKS,
};
use kvirt::error::{ConfigError, HypervisorError, KvirtError, PlanError, Result};
use kvirt::hypervisor::{CreateOutcome, Hypervisor, PoolType, VirshHypervisor};
use kvirt::planner::{PlanAction, PlanExecutor, DEFAULT_PLAN_FILE, DEFAULT_PLAN_NAME};
use kvirt::resolver::{ConfigResolver, Tagging};

use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let parser = ConfigParser::new();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| parser.default_config_path());

    // These rewrite the configuration, so they must not require it to load.
    match cli.command {
        Commands::Switch { client } => {
            return cmd_switch(&parser, &config_path, &client, &formatter);
        }
        Commands::Bootstrap {
            auto,
            name,
            host,
            port,
            user,
            protocol,
            url,
            pool,
            poolpath,
        } => {
            let bootstrap = Bootstrap {
                name,
                host,
                port,
                user,
                protocol,
                url,
                pool,
                poolpath,
            };
            return cmd_bootstrap(&config_path, auto, &bootstrap, &formatter).await;
        }
        _ => {}
    }

    parser.load_dotenv(config_path.parent().unwrap_or_else(|| Path::new(".")))?;
    let session = parser.load_session(Some(&config_path), cli.profiles_file.as_deref())?;
    let validation = ConfigValidator::new().validate(&session)?;
    for warning in &validation.warnings {
        eprintln!("{}", formatter.warning(warning));
    }

    let connected = if cli.command.is_offline() {
        None
    } else {
        Some(VirshHypervisor::connect(session.connection.uri()).await?)
    };
    let host = connected.as_ref().map(|h| h as &dyn Hypervisor);

    match cli.command {
        Commands::Create {
            profile,
            ip1,
            ip2,
            ip3,
            ip4,
            ip5,
            ip6,
            ip7,
            ip8,
            name,
        } => {
            let ips = [ip1, ip2, ip3, ip4, ip5, ip6, ip7, ip8];
            cmd_create(&session, online(host)?, &profile, ips, &name, &formatter).await
        }
        Commands::Plan {
            inputfile,
            start,
            stop,
            delete,
            dry_run,
            yes,
            plan,
        } => {
            let action = if start {
                PlanAction::Start
            } else if stop {
                PlanAction::Stop
            } else if delete {
                PlanAction::Delete
            } else {
                PlanAction::Deploy
            };
            let options = PlanOptions {
                inputfile,
                action,
                dry_run,
                yes,
                plan,
            };
            cmd_plan(&parser, &session, host, options, &formatter).await
        }
        Commands::Clone {
            base,
            full,
            start,
            name,
        } => {
            info!("Cloning vm {name} from vm {base}...");
            let result = online(host)?.clone_vm(&base, &name, full, start).await;
            report_result(result, &format!("{name} cloned"), &formatter)
        }
        Commands::Update {
            ip,
            memory,
            numcpus,
            name,
        } => cmd_update(online(host)?, &name, ip, memory, numcpus, &formatter).await,
        Commands::Add { size, pool, name } => {
            info!("Adding disk to {name}...");
            let result = online(host)?.add_disk(&name, size, &pool).await;
            report_result(result, &format!("Disk of {size}GB added to {name}"), &formatter)
        }
        Commands::Delete { yes, name } => {
            if !yes && !confirm(&format!("Are you sure about deleting {name}?"))? {
                eprintln!("Delete cancelled.");
                return Ok(());
            }
            let result = online(host)?.delete_vm(&name).await;
            report_result(result, &format!("{name} deleted"), &formatter)
        }
        Commands::Start { name } => {
            info!("Starting vm {name}...");
            let result = online(host)?.start_vm(&name).await;
            report_result(result, &format!("{name} started"), &formatter)
        }
        Commands::Stop { name } => {
            info!("Stopping vm {name}...");
            let result = online(host)?.stop_vm(&name).await;
            report_result(result, &format!("{name} stopped"), &formatter)
        }
        Commands::List {
            clients,
            profiles,
            templates,
            isos,
            pools,
            networks,
        } => {
            let what = ListTarget::from_flags(clients, profiles, templates, isos, pools, networks);
            cmd_list(&session, host, what, &formatter).await
        }
        Commands::Info { name } => {
            let info = online(host)?.info(&name).await?;
            eprint!("{}", formatter.format_text(&name, &info));
            Ok(())
        }
        Commands::Console { serial, name } => online(host)?.console(&name, serial).await,
        Commands::Ssh { user, name } => online(host)?.ssh(&name, &user).await,
        Commands::Network {
            delete,
            cidr,
            dhcp,
            name,
        } => cmd_network(online(host)?, &name, delete, cidr.as_deref(), dhcp, &formatter).await,
        Commands::Pool {
            delete,
            full,
            pooltype,
            path,
            pool,
        } => {
            let path = path.as_deref();
            cmd_pool(online(host)?, &pool, delete, full, pooltype, path, &formatter).await
        }
        Commands::Report => {
            let host = online(host)?;
            info!("Reporting setup for {} client {}", host.backend_type(), session.client);
            let report = host.report().await?;
            eprint!("{}", formatter.format_text(&session.client, &report));
            Ok(())
        }
        Commands::Switch { .. } | Commands::Bootstrap { .. } => Ok(()),
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Create a single vm from a profile.
async fn cmd_create(
    session: &Session,
    host: &dyn Hypervisor,
    profile: &str,
    ips: [Option<String>; 8],
    name: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let resolver = ConfigResolver::from_session(session);
    let profile_spec = resolver.profile(profile)?;

    let explicit = VmSpec {
        ips: explicit_ips(ips),
        ..VmSpec::default()
    };
    let params = resolver.resolve_vm(
        &explicit,
        Some(profile_spec),
        Tagging::new(DEFAULT_PLAN_NAME, profile),
    )?;

    info!("Deploying vm {name} from profile {profile}...");
    match host.create_vm(name, &params).await? {
        CreateOutcome::Created => {
            eprintln!("{}", formatter.success(&format!("{name} deployed!")));
        }
        CreateOutcome::Rejected { reason } => {
            eprintln!(
                "{}",
                formatter.error(&format!("{name} not deployed because of {reason} :("))
            );
        }
    }
    Ok(())
}

/// Options of the plan command.
struct PlanOptions {
    inputfile: Option<PathBuf>,
    action: PlanAction,
    dry_run: bool,
    yes: bool,
    plan: Option<String>,
}

impl PlanOptions {
    /// A delete asks first unless `--yes` or `--dry-run` is given.
    fn needs_confirmation(&self) -> bool {
        self.action == PlanAction::Delete && !self.yes && !self.dry_run
    }
}

/// Deploy, start, stop or delete a plan.
async fn cmd_plan(
    parser: &ConfigParser,
    session: &Session,
    host: Option<&dyn Hypervisor>,
    options: PlanOptions,
    formatter: &OutputFormatter,
) -> Result<()> {
    let plan_name = options
        .plan
        .clone()
        .unwrap_or_else(|| String::from(DEFAULT_PLAN_NAME));

    if options.action == PlanAction::Delete && plan_name.is_empty() {
        return Err(PlanError::UntaggedDelete.into());
    }
    if options.needs_confirmation()
        && !confirm(&format!("Are you sure about deleting plan {plan_name}?"))?
    {
        eprintln!("Delete cancelled.");
        return Ok(());
    }

    let entries = if options.action == PlanAction::Deploy {
        let path = options.inputfile.unwrap_or_else(|| {
            info!("using default input file {DEFAULT_PLAN_FILE}");
            PathBuf::from(DEFAULT_PLAN_FILE)
        });
        let plan = parser.load_plan(&path, &plan_name)?;
        for warning in ConfigValidator::new().check_plan(&plan, session).warnings {
            eprintln!("{}", formatter.warning(&warning));
        }
        plan.entries
    } else {
        Vec::new()
    };

    let resolver = ConfigResolver::from_session(session);

    if options.dry_run {
        // Never invoked: preview only resolves.
        let offline = VirshHypervisor::new(session.connection.uri());
        let executor = PlanExecutor::new(&offline, &resolver);
        eprint!("{}", formatter.format_preview(&executor.preview(&plan_name, &entries)));
        return Ok(());
    }

    let executor = PlanExecutor::new(online(host)?, &resolver);
    let report = executor.execute(&plan_name, &entries, options.action).await?;
    eprint!("{}", formatter.format_report(&report));
    Ok(())
}

/// Update ip, memory or cpus of a vm.
async fn cmd_update(
    host: &dyn Hypervisor,
    name: &str,
    ip: Option<String>,
    memory: Option<u32>,
    numcpus: Option<u32>,
    formatter: &OutputFormatter,
) -> Result<()> {
    if ip.is_none() && memory.is_none() && numcpus.is_none() {
        return Err(HypervisorError::invalid_argument(
            "Nothing to update, use --ip, --memory or --numcpus",
        )
        .into());
    }

    if let Some(ip) = ip {
        info!("Setting ip of vm {name} to {ip}...");
        let result = host.update_ip(name, &ip).await;
        report_result(result, &format!("Ip of {name} set to {ip}"), formatter)?;
    }
    if let Some(memory) = memory {
        info!("Setting memory of vm {name} to {memory}MB...");
        let result = host.update_memory(name, memory).await;
        report_result(result, &format!("Memory of {name} set to {memory}MB"), formatter)?;
    }
    if let Some(numcpus) = numcpus {
        info!("Setting numcpus of vm {name} to {numcpus}...");
        let result = host.update_cpus(name, numcpus).await;
        report_result(result, &format!("Numcpus of {name} set to {numcpus}"), formatter)?;
    }
    Ok(())
}

/// What `list` shows; the first flag set wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListTarget {
    Clients,
    Profiles,
    Templates,
    Isos,
    Pools,
    Networks,
    Vms,
}

impl ListTarget {
    const fn from_flags(
        clients: bool,
        profiles: bool,
        templates: bool,
        isos: bool,
        pools: bool,
        networks: bool,
    ) -> Self {
        if clients {
            Self::Clients
        } else if profiles {
            Self::Profiles
        } else if templates {
            Self::Templates
        } else if isos {
            Self::Isos
        } else if pools {
            Self::Pools
        } else if networks {
            Self::Networks
        } else {
            Self::Vms
        }
    }
}

/// List clients, profiles, templates, isos, pools, networks or vms.
async fn cmd_list(
    session: &Session,
    host: Option<&dyn Hypervisor>,
    what: ListTarget,
    formatter: &OutputFormatter,
) -> Result<()> {
    let output = match what {
        ListTarget::Clients => formatter.format_clients(&session.clients, &session.client),
        ListTarget::Profiles => formatter.format_names(session.profiles.keys().map(String::as_str)),
        ListTarget::Templates => {
            let volumes = online(host)?.list_volumes(false).await?;
            formatter.format_names(volumes.iter().map(String::as_str))
        }
        ListTarget::Isos => {
            let volumes = online(host)?.list_volumes(true).await?;
            formatter.format_names(volumes.iter().map(String::as_str))
        }
        ListTarget::Pools => {
            let pools = online(host)?.list_pools().await?;
            formatter.format_names(pools.iter().map(String::as_str))
        }
        ListTarget::Networks => {
            let networks = online(host)?.list_networks().await?;
            formatter.format_names(networks.iter().map(String::as_str))
        }
        ListTarget::Vms => formatter.format_vms(&online(host)?.list_vms().await?),
    };
    eprint!("{output}");
    Ok(())
}

/// Create or delete a network.
async fn cmd_network(
    host: &dyn Hypervisor,
    name: &str,
    delete: bool,
    cidr: Option<&str>,
    dhcp: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    if delete {
        info!("Deleting network {name}...");
        let result = host.delete_network(name).await;
        return report_result(result, &format!("Network {name} deleted"), formatter);
    }

    let cidr = cidr.ok_or_else(|| HypervisorError::invalid_argument("Missing Cidr"))?;
    info!("Creating network {name}...");
    let result = host.create_network(name, cidr, dhcp).await;
    report_result(result, &format!("Network {name} created"), formatter)
}

/// Create or delete a pool.
async fn cmd_pool(
    host: &dyn Hypervisor,
    pool: &str,
    delete: bool,
    full: bool,
    pool_type: PoolType,
    path: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<()> {
    if delete {
        info!("Deleting pool {pool}...");
        let result = host.delete_pool(pool, full).await;
        return report_result(result, &format!("Pool {pool} deleted"), formatter);
    }

    let path = path.ok_or_else(|| HypervisorError::invalid_argument("Missing path"))?;
    info!("Adding pool {pool}...");
    let result = host.create_pool(pool, path, pool_type).await;
    report_result(result, &format!("Pool {pool} created"), formatter)
}

/// Select another client.
fn cmd_switch(
    parser: &ConfigParser,
    config_path: &Path,
    client: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    eprintln!("Switching to client {client}...");
    parser.switch_client(config_path, client)?;
    eprintln!("{}", formatter.success(&format!("Client {client} selected")));
    Ok(())
}

/// Generate a configuration and prepare the hypervisor.
async fn cmd_bootstrap(
    config_path: &Path,
    auto: bool,
    bootstrap: &Bootstrap,
    formatter: &OutputFormatter,
) -> Result<()> {
    if !auto {
        return Err(ConfigError::validation(
            "Interactive bootstrap is not supported, use --auto",
            "bootstrap",
        )
        .into());
    }

    let connection = bootstrap.connection();
    info!("Bootstrapping env on {}", connection.uri());
    let host = VirshHypervisor::connect(connection.uri()).await?;

    let pools = host.list_pools().await?;
    if pools.contains(&bootstrap.pool) {
        debug!("Pool {} already there", bootstrap.pool);
    } else {
        info!("Creating pool {}...", bootstrap.pool);
        host.create_pool(&bootstrap.pool, &bootstrap.poolpath, bootstrap.pool_type())
            .await?;
    }

    let networks = host.list_networks().await?;
    for (name, cidr) in BOOTSTRAP_NETWORKS {
        if networks.contains(*name) {
            debug!("Network {name} already there");
        } else {
            info!("Creating network {name}...");
            host.create_network(name, cidr, true).await?;
        }
    }

    write_clients(config_path, &bootstrap.clients_file(), true)?;
    eprintln!("{}", formatter.success("Environment bootstrapped!"));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Returns the connected hypervisor.
fn online(host: Option<&dyn Hypervisor>) -> Result<&dyn Hypervisor> {
    host.ok_or_else(|| KvirtError::internal("No hypervisor connection"))
}

/// Builds the explicit ips from `-1..-8`, keeping gaps as empty entries.
fn explicit_ips(ips: [Option<String>; 8]) -> Option<Vec<String>> {
    let last = ips.iter().rposition(Option::is_some)?;
    Some(
        ips.into_iter()
            .take(last + 1)
            .map(Option::unwrap_or_default)
            .collect(),
    )
}

/// Prints the outcome of a single hypervisor operation.
///
/// Hypervisor failures are reported and do not abort the command.
fn report_result(result: Result<()>, message: &str, formatter: &OutputFormatter) -> Result<()> {
    match result {
        Ok(()) => {
            eprintln!("{}", formatter.success(message));
            Ok(())
        }
        Err(KvirtError::Hypervisor(e)) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Asks for confirmation on the terminal.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
