pub mod classify;
pub mod cli;
pub mod config;
pub mod document;
mod errors;
pub mod facts;
pub mod generate;
pub mod hook;
pub mod pbr;
pub mod resolve;
pub mod subnet;
mod types;

pub use classify::{classify_links, classify_name, is_excluded_name, InterfaceFilter};
pub use config::{BaseInterface, Config, ConfigFile};
pub use document::{assemble, NetworkDocument};
pub use errors::NetworkError;
pub use facts::{HostActions, LinuxHost, SystemFacts};
pub use generate::{plan, run, Plan, RunReport};
pub use pbr::{allocate, PbrAssignment, PbrPlan};
pub use resolve::resolve_lease;
pub use subnet::{is_rfc1918, network_cidr};
pub use types::{
    DefaultRoute, GatewaySource, Interface, InterfaceKind, LeaseInfo, Link, ResolverInfo,
    RuleEntry, Skipped, SourceRule, TableRoute,
};
