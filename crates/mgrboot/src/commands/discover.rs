use super::{agent_settings, connect, policy, with_timeout};
use crate::progress::StepLogger;
use mgrboot_cloud::{ResourceContext, Role};
use mgrboot_config::BootstrapConfig;
use mgrboot_core::{Bootstrap, IpCommandProbe};

/// Identify the host and print its resolved context without creating anything
pub async fn handle(config: &BootstrapConfig, ip_program: &str) -> anyhow::Result<()> {
    let settings = agent_settings(config);
    let probe = IpCommandProbe::with_program(ip_program);
    let mut logger = StepLogger::new();

    let result = with_timeout(config, async {
        let provider = connect(config).await?;
        let discovery = Bootstrap::new(&provider, &probe, &settings)
            .with_policy(policy(config.subnet_selection))
            .discover(&mut logger)
            .await?;
        Ok::<_, anyhow::Error>(discovery)
    })
    .await;
    logger.print_summary("discover");

    let discovery = result?;
    logger.log_detail(&format!(
        "instance {} ({}) via {}",
        discovery.instance.name, discovery.instance.id, discovery.mac
    ));
    if let Some(note) = floating_ip_note(&discovery.context) {
        logger.log_detail(&note);
    }
    println!("{}", serde_json::to_string_pretty(&discovery.context)?);
    Ok(())
}

/// The only role a successful discovery may lack
fn floating_ip_note(context: &ResourceContext) -> Option<String> {
    (!context.contains(Role::FloatingIp))
        .then(|| format!("instance has no floating IP; {} omitted", Role::FloatingIp))
}
