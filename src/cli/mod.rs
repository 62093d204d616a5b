use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::{BaseInterface, Config, ConfigFile};
use crate::RunReport;

mod apply;
mod reapply;
mod scan;
mod verify;

#[derive(Parser)]
#[command(
    name = "staticnet",
    version,
    about = "Convert DHCP-configured private interfaces and VLANs to static netplan configuration",
    long_about = "Pins the current DHCP addresses of private (RFC1918) interfaces as static \
                  netplan configuration, optionally creating VLAN subinterfaces first, and \
                  installs source-based policy routing so replies leave through the interface \
                  they arrived on.",
    after_help = "Examples:\n  staticnet scan\n  staticnet verify --vlan 10,20\n  staticnet apply --base-interface ens18 --vlan 10,20\n  staticnet apply --config /etc/staticnet.toml --exclude '^wg'\n  IFACE=ens18.10 staticnet reapply\n\nRun 'staticnet apply --help' to see all flags."
)]
struct Cli {
    /// TOML configuration file (command-line flags take precedence)
    #[arg(short, long, global = true, env = "STATICNET_CONFIG")]
    config: Option<PathBuf>,

    /// Logging level or filter (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct NetworkArgs {
    /// Parent interface for new VLANs, or "auto" to use the default route's device
    #[arg(short, long, env = "STATICNET_BASE_INTERFACE")]
    base_interface: Option<String>,

    /// VLAN IDs to create on the base interface (comma-separated or repeated)
    #[arg(long = "vlan", value_delimiter = ',', env = "STATICNET_VLANS")]
    vlans: Vec<u16>,

    /// Only process interfaces whose name matches this regex (case-insensitive)
    #[arg(long, env = "STATICNET_INCLUDE")]
    include: Option<String>,

    /// Skip interfaces whose name matches this regex (case-insensitive)
    #[arg(long, env = "STATICNET_EXCLUDE")]
    exclude: Option<String>,

    /// Do not set up policy-based routing or the interface hook
    #[arg(long, env = "STATICNET_NO_PBR")]
    no_pbr: bool,

    /// Do not assume the network's first host is the gateway when none is found
    #[arg(long, env = "STATICNET_NO_GATEWAY_FALLBACK")]
    no_gateway_fallback: bool,

    /// Path of the generated netplan document
    #[arg(long, env = "STATICNET_DOCUMENT")]
    document: Option<PathBuf>,

    /// Path of the routing table registry
    #[arg(long, env = "STATICNET_RT_TABLES")]
    rt_tables: Option<PathBuf>,

    /// Directory for the interface-up hook script
    #[arg(long, env = "STATICNET_HOOK_DIR")]
    hook_dir: Option<PathBuf>,

    /// Seconds to wait for DHCP leases on newly created VLANs
    #[arg(long, env = "STATICNET_DHCP_TIMEOUT")]
    dhcp_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create VLANs, write and apply static configuration, set up policy routing
    Apply {
        #[command(flatten)]
        network: NetworkArgs,
    },

    /// Show the configuration that would be written as a diff (no changes made)
    Verify {
        #[command(flatten)]
        network: NetworkArgs,

        /// Suppress diff output (exit code still indicates changes)
        #[arg(long)]
        quiet: bool,
    },

    /// List interfaces with their classification and resolved lease data (read-only)
    Scan {
        #[command(flatten)]
        network: NetworkArgs,
    },

    /// Reapply policy routing for a single VLAN interface
    Reapply {
        /// Interface name, e.g. ens18.10
        #[arg(short, long, env = "IFACE")]
        iface: String,

        /// Path of the routing table registry
        #[arg(long, env = "STATICNET_RT_TABLES")]
        rt_tables: Option<PathBuf>,
    },
}

pub fn run_with_args<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Apply { network } => {
            apply::run_apply(resolve_config(cli.config.as_deref(), &network)?)
        }
        Commands::Verify { network, quiet } => {
            verify::run_verify(resolve_config(cli.config.as_deref(), &network)?, quiet)
        }
        Commands::Scan { network } => {
            scan::run_scan(resolve_config(cli.config.as_deref(), &network)?)
        }
        Commands::Reapply { iface, rt_tables } => {
            let mut config = resolve_config(cli.config.as_deref(), &NetworkArgs::default())?;
            if let Some(path) = rt_tables {
                config.rt_tables_path = path;
            }
            reapply::run_reapply(&iface, &config)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed when invoked in-process more than once
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Defaults, then the config file, then command-line flags
pub(crate) fn resolve_config(path: Option<&Path>, args: &NetworkArgs) -> Result<Config> {
    let mut config = Config::default();
    if let Some(path) = path {
        config.merge_file(ConfigFile::load(path)?);
    }

    if let Some(base) = &args.base_interface {
        config.base_interface = BaseInterface::parse(base);
    }
    if !args.vlans.is_empty() {
        config.vlan_ids = args.vlans.clone();
    }
    if let Some(include) = &args.include {
        config.include = include.clone();
    }
    if let Some(exclude) = &args.exclude {
        config.exclude = Some(exclude.clone());
    }
    if args.no_pbr {
        config.pbr = false;
    }
    if args.no_gateway_fallback {
        config.gateway_fallback = false;
    }
    if let Some(path) = &args.document {
        config.document_path = path.clone();
    }
    if let Some(path) = &args.rt_tables {
        config.rt_tables_path = path.clone();
    }
    if let Some(path) = &args.hook_dir {
        config.hook_dir = path.clone();
    }
    if let Some(secs) = args.dhcp_timeout {
        config.dhcp_wait.timeout = Duration::from_secs(secs);
    }

    config.validate()?;
    Ok(config)
}

pub(crate) fn print_report(report: &RunReport, config: &Config) {
    if !report.vlans_created.is_empty() {
        println!("VLANs created: {}", report.vlans_created.join(", "));
    }
    println!(
        "Interfaces converted to static: {}",
        if report.converted.is_empty() {
            "none".to_string()
        } else {
            report.converted.join(", ")
        }
    );
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.iface, skipped.reason);
    }
    if report.document_changed {
        println!(
            "Network configuration written and applied: {}",
            config.document_path.display()
        );
    } else {
        println!("Network configuration unchanged.");
    }

    if let Some(pbr) = &report.pbr {
        println!("Routing tables registered: {}", pbr.tables_registered.len());
        println!("Table routes installed: {}", pbr.routes_installed);
        println!(
            "Source rules added: {} (already present: {})",
            pbr.rules_added, pbr.rules_present
        );
        for failed in &pbr.failed {
            println!("  policy routing failed for {}: {}", failed.iface, failed.reason);
        }
        if report.hook_installed {
            println!("Interface hook installed in {}", config.hook_dir.display());
        }
    }
}
