use super::{agent_settings, connect, policy, with_timeout};
use crate::collaborators::{FileKeyStore, JsonFilePublisher};
use crate::progress::StepLogger;
use colored::Colorize;
use mgrboot_config::BootstrapConfig;
use mgrboot_core::{Bootstrap, BootstrapOutcome, IpCommandProbe, KeypairOutcome};

pub async fn handle(config: &BootstrapConfig, ip_program: &str) -> anyhow::Result<()> {
    let settings = agent_settings(config);
    let probe = IpCommandProbe::with_program(ip_program);
    let key_store = FileKeyStore::new(&config.output.key_dir);
    let publisher = JsonFilePublisher::new(config.output.context_path.clone());
    let mut logger = StepLogger::new();

    eprintln!(
        "{} agent keypair {} / security group {}",
        "Bootstrapping".blue().bold(),
        settings.keypair_name.cyan(),
        settings.security_group_name.cyan()
    );

    let result = with_timeout(config, async {
        let provider = connect(config).await?;
        let outcome = Bootstrap::new(&provider, &probe, &settings)
            .with_policy(policy(config.subnet_selection))
            .run(&key_store, &publisher, &mut logger)
            .await?;
        Ok::<_, anyhow::Error>(outcome)
    })
    .await;
    logger.print_summary("run");

    let outcome = result?;
    report(&logger, &outcome, &publisher);
    Ok(())
}

fn report(logger: &StepLogger, outcome: &BootstrapOutcome, publisher: &JsonFilePublisher) {
    let groups = &outcome.report.groups;
    match &outcome.report.keypair {
        KeypairOutcome::Created { .. } => logger.log_detail(&format!(
            "new agent key stored at {}",
            outcome.record.agent_key_path.display()
        )),
        KeypairOutcome::Reused => logger.log_detail(&format!(
            "reusing agent key at {}",
            outcome.record.agent_key_path.display()
        )),
    }
    logger.log_detail(&format!(
        "agent group {} ({}): {} rules added, {} present",
        groups.agents_security_group_id,
        if groups.agents_security_group_created {
            "created"
        } else {
            "existing"
        },
        groups.agent_rules.created,
        groups.agent_rules.existing
    ));
    logger.log_detail(&format!(
        "management group: {} rules added, {} present",
        groups.management_rules.created, groups.management_rules.existing
    ));
    logger.log_detail(&format!("context published to {}", publisher.destination()));
}
