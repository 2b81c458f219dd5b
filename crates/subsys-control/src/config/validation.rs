use super::*;
use anyhow::{anyhow, Result};
use std::collections::HashSet;

/// Validate the complete configuration
pub fn validate_config(config: &AgentConfig) -> Result<()> {
    validate_agent_options(&config.agent)?;
    validate_subsystem_configs(&config.subsystems)?;
    Ok(())
}

fn validate_agent_options(options: &AgentOptions) -> Result<()> {
    if options.health_check_interval.is_zero() {
        return Err(anyhow!("Health check interval must be greater than 0"));
    }

    match options.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            options.log_level
        )),
    }
}

fn validate_subsystem_configs(subsystems: &[SubsystemConfig]) -> Result<()> {
    if subsystems.is_empty() {
        return Err(anyhow!("At least one subsystem must be configured"));
    }

    let mut names = HashSet::new();
    for subsystem in subsystems {
        if !names.insert(&subsystem.name) {
            return Err(anyhow!("Duplicate subsystem name: {}", subsystem.name));
        }
        validate_subsystem_config(subsystem)?;
    }

    Ok(())
}

/// Validate a single subsystem configuration
pub fn validate_subsystem_config(subsystem: &SubsystemConfig) -> Result<()> {
    let name = &subsystem.name;
    if name.is_empty() {
        return Err(anyhow!("Subsystem name cannot be empty"));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "Subsystem name can only contain alphanumeric characters, hyphens, and underscores: {}",
            name
        ));
    }

    if subsystem.kind.is_empty() {
        return Err(anyhow!("Subsystem {} has no kind", name));
    }

    if matches!(subsystem.executable.as_deref(), Some("")) {
        return Err(anyhow!("Subsystem {} has an empty executable name", name));
    }

    for (field, value) in [
        ("start_timeout", subsystem.start_timeout),
        ("stop_timeout", subsystem.stop_timeout),
        ("health_check_timeout", subsystem.health_check_timeout),
        ("stop_poll_interval", subsystem.stop_poll_interval),
    ] {
        if value.is_zero() {
            return Err(anyhow!("Subsystem {}: {} must be greater than 0", name, field));
        }
    }

    // Each half of the stop window must allow at least one poll.
    if subsystem.stop_poll_interval >= subsystem.stop_timeout / 2 {
        return Err(anyhow!(
            "Subsystem {}: stop_poll_interval ({:?}) must be smaller than half of stop_timeout ({:?})",
            name,
            subsystem.stop_poll_interval,
            subsystem.stop_timeout
        ));
    }

    Ok(())
}
