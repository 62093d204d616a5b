use anyhow::Result;
use std::io::{self, Write};

use crate::config::Config;
use crate::facts::SystemFacts;
use crate::{plan, LinuxHost};

pub(crate) fn run_verify(config: Config, quiet: bool) -> Result<()> {
    let host = LinuxHost::new();
    let plan = plan(&host, &config)?;

    if plan.document.is_empty() {
        if !quiet {
            println!("No private interfaces to convert.");
        }
        return Ok(());
    }

    let rendered = plan.document.render();
    let persisted = host.read_file(&config.document_path)?.unwrap_or_default();

    if persisted == rendered {
        if !quiet {
            println!("No changes.");
        }
        return Ok(());
    }

    if !quiet {
        let diff = similar::TextDiff::from_lines(&persisted, &rendered);
        let mut out = io::stdout().lock();
        let unified = diff
            .unified_diff()
            .context_radius(3)
            .header(&config.document_path.display().to_string(), "generated")
            .to_string();
        write!(out, "{}", unified)?;
    }

    Err(anyhow::anyhow!("verify: changes detected"))
}
