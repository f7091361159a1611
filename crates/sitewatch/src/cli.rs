use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sitewatch")]
#[command(about = "Website change monitor: watch page fragments and get notified when they change")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/sitewatch/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding targets.json, screenshots and logs
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a target to monitor
    Add {
        /// Page URL (http or https)
        url: String,

        /// CSS selector of the fragment to watch
        selector: String,

        /// Polling interval in minutes
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        frequency_minutes: u32,

        /// Render the page in a headless browser before extracting
        #[arg(long)]
        rendered: bool,

        /// Capture before/after screenshots when a change is detected
        #[arg(long)]
        evidence: bool,
    },

    /// Monitor all targets until interrupted (SIGINT/SIGTERM)
    Run,

    /// Check every target once and report the outcome
    Check {
        /// Output format (text or json)
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List monitored targets
    List {
        /// Output format (text or json)
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show the recorded history of one target
    History {
        /// Page URL as given to `add`
        url: String,

        /// CSS selector as given to `add`
        selector: String,

        /// Output format (text or json)
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show/manage configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration and resolved paths
    Show {
        /// Output format (text or json)
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Write a commented default config file
    Init,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
