use std::path::Path;

use crate::config::ChatConfig;
use crate::error::Result;

/// Execute `config show`: print the effective configuration.
pub fn show(config: &ChatConfig, path: &Path) -> Result<()> {
    let state = if path.exists() { "" } else { " (not found, using environment and defaults)" };
    println!("# Config file: {}{}", path.display(), state);
    println!("# Auto-connect: {}", if config.can_auto_connect() { "yes" } else { "no" });
    println!();
    print!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

/// Execute `config validate`: print errors and warnings.
///
/// Returns whether the configuration is valid.
pub fn validate(config: &ChatConfig) -> bool {
    let report = config.validate();

    for error in &report.errors {
        println!("error: {error}");
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    if report.is_valid() {
        println!(
            "Configuration is valid ({} warning{}).",
            report.warnings.len(),
            if report.warnings.len() == 1 { "" } else { "s" }
        );
    }

    report.is_valid()
}
