use anyhow::Result;
use clap::Parser;

mod cli;
mod config_cmds;
mod context;
mod logging;
mod monitor_cmds;
mod target_cmds;

use cli::{Cli, Commands, ConfigCommands};
use context::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `run` logs to its own file instead.
    if !matches!(cli.command, Commands::Run) {
        logging::init_stderr();
    }

    let config_path = cli.config.as_deref();
    let load_context = || AppContext::load(config_path, cli.data_dir.as_deref());

    match cli.command {
        Commands::Add {
            url,
            selector,
            frequency_minutes,
            rendered,
            evidence,
        } => {
            let ctx = load_context()?;
            target_cmds::handle_add(&ctx, url, selector, frequency_minutes, rendered, evidence)?;
        }
        Commands::Run => {
            monitor_cmds::handle_run(&load_context()?).await?;
        }
        Commands::Check { format } => {
            monitor_cmds::handle_check(&load_context()?, format).await?;
        }
        Commands::List { format } => {
            target_cmds::handle_list(&load_context()?, format)?;
        }
        Commands::History {
            url,
            selector,
            format,
        } => {
            target_cmds::handle_history(&load_context()?, url, selector, format)?;
        }
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show { format } => {
                config_cmds::handle_config_show(&load_context()?, format)?;
            }
            ConfigCommands::Init => {
                config_cmds::handle_config_init(config_path)?;
            }
        },
    }

    Ok(())
}
