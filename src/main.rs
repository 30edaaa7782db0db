//! Turnwise CLI entry point.

use clap::Parser;

use turnwise::cli::{self, commands, Cli, Commands};
use turnwise::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(&err, cli.json),
    };

    // Keep stdout clean for command output; logs go to files only when configured.
    let mut log_config = match LogConfig::try_from(&config.logging) {
        Ok(log_config) => log_config,
        Err(err) => cli::handle_error(&err, cli.json),
    };
    log_config.enable_stdout = false;
    let _logger = match LoggerImpl::init(&log_config) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(&err, cli.json),
    };

    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(args, &config, cli.json),
        Commands::Game(args) => commands::game::execute(args, &config, cli.json),
        Commands::Session(args) => commands::session::execute(args, &config, cli.json).await,
        Commands::Config(args) => commands::config::execute(args, &config, cli.json),
    };

    if let Err(err) = result {
        cli::handle_error(&err, cli.json);
    }
}
