// Run configuration: defaults, optional TOML file, then CLI overrides

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::InterfaceFilter;

pub const DEFAULT_DOCUMENT_PATH: &str = "/etc/netplan/90-staticnet.yaml";
pub const DEFAULT_RT_TABLES_PATH: &str = "/etc/iproute2/rt_tables";
pub const DEFAULT_HOOK_DIR: &str = "/etc/networkd-dispatcher/routable.d";
pub const DEFAULT_INCLUDE: &str = ".*";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BaseInterface {
    /// Use the device of the IPv4 default route
    #[default]
    Auto,
    Named(String),
}

impl BaseInterface {
    pub fn parse(value: &str) -> Self {
        if value.trim().is_empty() || value.trim().eq_ignore_ascii_case("auto") {
            BaseInterface::Auto
        } else {
            BaseInterface::Named(value.trim().to_string())
        }
    }
}

impl fmt::Display for BaseInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseInterface::Auto => write!(f, "auto"),
            BaseInterface::Named(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpWait {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for DhcpWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Everything a run needs, passed explicitly to each stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_interface: BaseInterface,
    pub vlan_ids: Vec<u16>,
    pub include: String,
    pub exclude: Option<String>,
    pub pbr: bool,
    pub gateway_fallback: bool,
    pub document_path: PathBuf,
    pub rt_tables_path: PathBuf,
    pub hook_dir: PathBuf,
    pub dhcp_wait: DhcpWait,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_interface: BaseInterface::Auto,
            vlan_ids: Vec::new(),
            include: DEFAULT_INCLUDE.to_string(),
            exclude: None,
            pbr: true,
            gateway_fallback: true,
            document_path: PathBuf::from(DEFAULT_DOCUMENT_PATH),
            rt_tables_path: PathBuf::from(DEFAULT_RT_TABLES_PATH),
            hook_dir: PathBuf::from(DEFAULT_HOOK_DIR),
            dhcp_wait: DhcpWait::default(),
        }
    }
}

impl Config {
    pub fn filter(&self) -> Result<InterfaceFilter> {
        InterfaceFilter::new(&self.include, self.exclude.as_deref())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(id) = self.vlan_ids.iter().find(|id| !(1..=4094).contains(*id)) {
            bail!("VLAN ID {} is out of range (1-4094)", id);
        }
        if self.dhcp_wait.interval.is_zero() && !self.dhcp_wait.timeout.is_zero() {
            bail!("DHCP wait interval must be greater than zero");
        }
        self.filter()?;
        Ok(())
    }

    /// Overlay the values set in a config file onto this configuration
    pub fn merge_file(&mut self, file: ConfigFile) {
        if let Some(base) = file.base_interface {
            self.base_interface = BaseInterface::parse(&base);
        }
        if let Some(ids) = file.vlan_ids {
            self.vlan_ids = ids;
        }
        if let Some(include) = file.include {
            self.include = include;
        }
        if let Some(exclude) = file.exclude {
            self.exclude = Some(exclude);
        }
        if let Some(pbr) = file.pbr {
            self.pbr = pbr;
        }
        if let Some(fallback) = file.gateway_fallback {
            self.gateway_fallback = fallback;
        }
        if let Some(path) = file.paths.document {
            self.document_path = path;
        }
        if let Some(path) = file.paths.rt_tables {
            self.rt_tables_path = path;
        }
        if let Some(path) = file.paths.hook_dir {
            self.hook_dir = path;
        }
        if let Some(secs) = file.dhcp_wait.interval_secs {
            self.dhcp_wait.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.dhcp_wait.timeout_secs {
            self.dhcp_wait.timeout = Duration::from_secs(secs);
        }
    }
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Interface name or "auto"
    pub base_interface: Option<String>,
    pub vlan_ids: Option<Vec<u16>>,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub pbr: Option<bool>,
    pub gateway_fallback: Option<bool>,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub dhcp_wait: DhcpWaitConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub document: Option<PathBuf>,
    pub rt_tables: Option<PathBuf>,
    pub hook_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DhcpWaitConfig {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
