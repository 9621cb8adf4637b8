mod collaborators;
mod commands;
mod progress;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mgrboot")]
#[command(
    about = "Bootstrap an orchestration manager inside its own OpenStack tenant",
    long_about = None
)]
struct Cli {
    /// Configuration file (takes precedence over MGRBOOT_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// `ip` binary used to read the routing table
    #[arg(long, global = true, default_value = "ip")]
    ip_program: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full bootstrap: locate, resolve, provision and publish the agent context
    Run,
    /// Locate this host and print its resource context without changing anything
    Discover,
    /// Print the MAC address of the outbound interface
    Inspect,
    /// Verify the configured provider credentials
    Check,
    /// Show version information
    Version,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Neither needs a configuration file
    match cli.command {
        Commands::Version => {
            println!("mgrboot {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::Inspect => return commands::inspect::handle(&cli.ip_program).await,
        _ => {}
    }

    let (config_path, config) = match mgrboot_config::discover(cli.config.as_deref()) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("{}", "✗ Configuration error".red().bold());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!("Loaded configuration from {}", config_path.display());

    match cli.command {
        Commands::Run => commands::run::handle(&config, &cli.ip_program).await,
        Commands::Discover => commands::discover::handle(&config, &cli.ip_program).await,
        Commands::Check => commands::check::handle(&config).await,
        Commands::Version | Commands::Inspect => {
            unreachable!("handled before config loading")
        }
    }
}
