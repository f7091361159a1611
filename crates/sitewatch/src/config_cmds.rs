use anyhow::{Context, Result};
use sitewatch_config::MonitorConfig;
use sitewatch_config::paths::default_config_path;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::context::AppContext;

pub(crate) fn handle_config_show(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let config = ctx.config.redacted();
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "config": config,
                "paths": {
                    "data_dir": ctx.paths.data_dir,
                    "targets_file": ctx.paths.targets_file,
                    "screenshots_dir": ctx.paths.screenshots_dir,
                    "log_dir": ctx.paths.log_dir,
                },
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            let source = ctx
                .config_path
                .clone()
                .or_else(default_config_path)
                .filter(|path| path.exists());
            match source {
                Some(path) => println!("# config: {}", path.display()),
                None => println!("# config: built-in defaults"),
            }
            println!("# targets: {}", ctx.paths.targets_file.display());
            println!("# screenshots: {}", ctx.paths.screenshots_dir.display());
            println!("# logs: {}", ctx.paths.log_dir.display());
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

pub(crate) fn handle_config_init(explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()
            .context("Cannot determine the config directory; pass --config <path>")?,
    };
    MonitorConfig::save_default_template(&path)?;
    eprintln!("Wrote default config to {}", path.display());
    Ok(())
}
