use anyhow::Result;
use clap::Parser;
use std::io;
use tracing::debug;

use azdo_provider::{
    Args, AzureDevOpsClients, Config, Provider, commands,
    logging::{LogLevel, init_logging, parse_early_log_config},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Before clap, so argument errors are logged too
    let raw_args: Vec<String> = std::env::args().collect();
    let mut log_config = parse_early_log_config(&raw_args);
    if log_config.level.is_none() {
        // Fall back to log_level from the default config file
        log_config.level = Config::load_from_file(None)
            .ok()
            .and_then(|c| c.log_level)
            .and_then(|level| LogLevel::parse(&level));
    }
    let _log_guard = init_logging(log_config);

    let args = Args::parse();
    debug!(command = ?args.command, "starting");

    let provider = if commands::requires_connection(&args.command) {
        let config = Config::resolve(&args.connection)?;
        debug!(?config, "configuration resolved");
        let connection = config.connection()?;
        Provider::new(AzureDevOpsClients::connect(
            &connection.org_service_url,
            &connection.personal_access_token,
        )?)
    } else {
        Provider::offline()
    };

    let mut stdout = io::stdout().lock();
    commands::execute(&provider, args.command, &mut stdout).await
}
