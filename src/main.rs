use anyhow::Result;
use clap::Parser;

use relation_editor::cli::{self, Cli, Commands};
use relation_editor::logging::{cleanup_old_logs, init_logging, log_system_info};
use tracing::warn;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging = cli.logging_config();
    let _guard = init_logging(&logging)?;
    log_system_info();
    if let Err(e) = cleanup_old_logs(&logging) {
        warn!(error = %e, "Could not clean up old log files");
    }

    match cli.command {
        Commands::Edit { document } => {
            let config = cli::load_config(cli.config.as_deref())?;
            cli::edit_command(document, config)
        }
        Commands::Stats { document, json } => {
            let config = cli::load_config(cli.config.as_deref())?;
            cli::stats_command(document, json, config)
        }
        Commands::Monitor { project } => cli::monitor_command(project),
        Commands::InitConfig { path } => cli::init_config_command(path),
    }
}
