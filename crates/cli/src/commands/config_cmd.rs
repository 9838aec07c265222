//! `threadwise config` — Configuration commands.

use super::{CommandResult, load_config};
use std::path::Path;
use threadwise_config::AppConfig;

pub fn show(config_path: Option<&Path>) -> CommandResult {
    let config = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn default() -> CommandResult {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

pub fn path(config_path: Option<&Path>) -> CommandResult {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    println!("{}", path.display());
    Ok(())
}
