//! unitver CLI - main entry point

use clap::Parser;
use std::process;
use tracing::error;
use unitver_cli::{api::ApiClient, commands, Cli, Commands};
use unitver_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.verbose { LogLevel::Debug } else { LogLevel::Warn };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("unitver-cli")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The CLI works without logging
    let _guard = init_logging(&log_config).ok();

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> unitver_cli::Result<()> {
    let client = ApiClient::new(cli.server_url.clone())?;

    match &cli.command {
        Commands::Deploy {
            name,
            snapshot_file,
            change_type,
            change_log,
            published_by,
        } => {
            commands::deploy::run(
                &client,
                name,
                snapshot_file,
                change_type,
                change_log.clone(),
                published_by.clone(),
            )
            .await
        },
        Commands::History { name, format } => {
            commands::versions::history(&client, name, *format).await
        },
        Commands::Active { name } => commands::versions::active(&client, name).await,
        Commands::Units => commands::units::run(&client).await,
        Commands::Export {
            name,
            version,
            output,
        } => commands::versions::export(&client, name, version, output).await,
        Commands::Plan { name, target } => commands::rollback::plan(&client, name, target).await,
        Commands::Rollback { name, target, yes } => {
            commands::rollback::run(&client, name, target, *yes).await
        },
        Commands::Check { name } => commands::check::run(&client, name.as_deref()).await,
    }
}
