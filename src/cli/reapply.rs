use anyhow::Result;

use crate::config::Config;
use crate::hook::reapply;
use crate::LinuxHost;

pub(crate) fn run_reapply(iface: &str, config: &Config) -> Result<()> {
    let mut host = LinuxHost::new();

    match reapply(&mut host, iface, &config.rt_tables_path)? {
        Some(outcome) => {
            let plan = &outcome.plan;
            println!(
                "{}: table {} ({}), {} via {}, priority {}",
                plan.interface,
                plan.table_name,
                plan.table_id,
                plan.network,
                plan.gateway,
                plan.priority
            );
            println!("Table routes installed: {}", outcome.routes_installed);
            if outcome.rule_added {
                println!("Source rule added for {}", plan.source);
            } else {
                println!("Source rule already present for {}", plan.source);
            }
        }
        None => println!("{}: nothing to reapply", iface),
    }

    Ok(())
}
