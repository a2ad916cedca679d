//! Config command implementations.

use crate::cli::ConfigCommands;
use crate::config::{config_path, load_config, save_config};
use crate::error::Result;

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or written, or the key
/// or value is invalid.
pub fn execute(command: &ConfigCommands, json: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => show(json),
        ConfigCommands::Set { key, value } => set(key, value, json),
    }
}

fn show(json: bool) -> Result<()> {
    let view = load_config()?.resolve().redacted();

    if json {
        println!("{}", serde_json::to_string(&view)?);
        return Ok(());
    }

    println!("Config file: {}", config_path()?.display());
    println!();
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

fn set(key: &str, value: &str, json: bool) -> Result<()> {
    let mut config = load_config()?;
    config.set(key, value)?;
    let path = save_config(&config)?;

    if json {
        let output = serde_json::json!({
            "key": key,
            "cleared": value.trim().is_empty(),
            "path": path.display().to_string(),
        });
        println!("{output}");
    } else if value.trim().is_empty() {
        println!("Cleared {key}");
    } else {
        println!("Set {key} in {}", path.display());
    }

    Ok(())
}
