use super::{connect, with_timeout};
use colored::Colorize;
use mgrboot_cloud::CloudProvider;
use mgrboot_config::BootstrapConfig;

pub async fn handle(config: &BootstrapConfig) -> anyhow::Result<()> {
    eprintln!("{}", "Checking provider credentials...".blue());

    let status = with_timeout(config, async {
        let provider = connect(config).await?;
        Ok::<_, anyhow::Error>(provider.check_auth().await?)
    })
    .await?;

    if status.authenticated {
        eprintln!("{}", "✓ Authenticated".green().bold());
        if let Some(info) = &status.account_info {
            eprintln!("  {}", info.cyan());
        }
        Ok(())
    } else {
        let reason = status.error.unwrap_or_else(|| "unknown reason".to_string());
        anyhow::bail!("authentication check failed: {}", reason)
    }
}
