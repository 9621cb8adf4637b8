use colored::Colorize;
use mgrboot_core::{IpCommandProbe, resolve_local_mac};

/// Print the MAC of the outbound interface. Needs no configuration.
pub async fn handle(ip_program: &str) -> anyhow::Result<()> {
    let probe = IpCommandProbe::with_program(ip_program);
    let mac = resolve_local_mac(&probe).await?;
    eprintln!("{}", "Outbound interface MAC:".dimmed());
    println!("{}", mac);
    Ok(())
}
