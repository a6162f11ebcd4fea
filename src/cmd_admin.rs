//! One-shot maintenance commands.

use std::path::Path;

use tracing::info;

use dispatchq_config::{Config, ConfigValidator};
use dispatchq_queue::QueueEngine;

/// Print validation findings; fails if there are errors.
pub(crate) fn check_config(path: &Path, config: &Config, from_file: bool) -> Result<(), Box<dyn std::error::Error>> {
    if from_file {
        println!("Checking {}", path.display());
    } else {
        println!("{} not found, checking built-in defaults", path.display());
    }

    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        println!("  warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("  error:   {}: {}", error.path, error.message);
    }

    if result.is_valid() {
        println!("Configuration OK ({} warning(s))", result.warnings.len());
        Ok(())
    } else {
        Err(format!("{} configuration error(s)", result.errors.len()).into())
    }
}

/// Run a single reaper sweep.
pub(crate) async fn reap_once(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let engine = QueueEngine::from_config(config).await?;
    let reclaimed = engine.sweep_stale_claims().await?;
    info!("Reaper sweep reclaimed {} item(s)", reclaimed.len());
    println!("Reclaimed {} item(s)", reclaimed.len());
    Ok(())
}
