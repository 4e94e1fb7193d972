//! Runtime override CLI commands.
//!
//! Commands for viewing and resetting the estimator override without going
//! through the HTTP API.

use std::path::Path;
use std::time::SystemTime;

use clap::Subcommand;

use crate::estimation::ConfigStore;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the effective configuration as JSON
    Show,

    /// Show the override file path
    Path,

    /// Delete the override, restoring the built-in defaults
    Reset,
}

/// Run a config command.
pub async fn run_config_command(cmd: ConfigCommand, store: &ConfigStore) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show => show_config(store).await,
        ConfigCommand::Path => show_path(store.path()),
        ConfigCommand::Reset => reset_config(store).await,
    }
}

async fn show_config(store: &ConfigStore) -> anyhow::Result<()> {
    let view = store.current().await.to_view();
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn reset_config(store: &ConfigStore) -> anyhow::Result<()> {
    if store.reset().await? {
        println!("Removed {}; using defaults", store.path().display());
    } else {
        println!("No override at {}; already using defaults", store.path().display());
    }
    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("{}", path.display());
    for line in describe_file(path)? {
        println!("  {}", line);
    }
    Ok(())
}

/// Size and age of the override file, or a note that it is absent.
fn describe_file(path: &Path) -> anyhow::Result<Vec<String>> {
    if !path.exists() {
        return Ok(vec!["(does not exist, using defaults)".to_string()]);
    }

    let metadata = std::fs::metadata(path)?;
    let mut lines = vec![format!("Size: {} bytes", metadata.len())];
    if let Ok(modified) = metadata.modified() {
        let secs = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default()
            .as_secs();
        lines.push(format!("Modified: {}", format_age(secs)));
    }
    Ok(lines)
}

fn format_age(secs: u64) -> String {
    if secs < 60 {
        format!("{} seconds ago", secs)
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86400)
    }
}
