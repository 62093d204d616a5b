use anyhow::{bail, Result};

use crate::config::Config;
use crate::{run, LinuxHost, NetworkError};

use super::print_report;

pub(crate) fn run_apply(config: Config) -> Result<()> {
    let mut host = LinuxHost::new();
    let report = match run(&mut host, &config) {
        Ok(report) => report,
        Err(e) => {
            if let Some(NetworkError::ApplyFailed(_)) = e.downcast_ref::<NetworkError>() {
                println!(
                    "Configuration was written to {} but netplan rejected it; \
                     fix the file or remove it and re-run.",
                    config.document_path.display()
                );
            }
            return Err(e);
        }
    };

    print_report(&report, &config);

    let failures = report.failures();
    if !failures.is_empty() {
        bail!(
            "policy routing failed for {} interface(s): {}",
            failures.len(),
            failures
                .iter()
                .map(|f| f.iface.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}
