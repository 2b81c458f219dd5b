use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentOptions,
    pub subsystems: Vec<SubsystemConfig>,
}

/// Host agent options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOptions {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_health_check_interval", with = "duration_serde")]
    pub health_check_interval: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            health_check_interval: default_health_check_interval(),
        }
    }
}

/// One supervised subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsystemConfig {
    pub name: String,
    /// Registry key of the controller implementation
    pub kind: String,
    /// Working directory of the child
    pub install_root: PathBuf,
    /// Directory holding the executable. Defaults to `<install_root>/bin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<PathBuf>,
    /// Executable file name. Defaults to the subsystem name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Passed to the child as `-config <path>`
    pub config_file: PathBuf,
    #[serde(default = "default_start_timeout", with = "duration_serde")]
    pub start_timeout: Duration,
    #[serde(default = "default_stop_timeout", with = "duration_serde")]
    pub stop_timeout: Duration,
    #[serde(default = "default_health_check_timeout", with = "duration_serde")]
    pub health_check_timeout: Duration,
    #[serde(default = "default_stop_poll_interval", with = "duration_serde")]
    pub stop_poll_interval: Duration,
}

impl SubsystemConfig {
    /// Config with default timeouts.
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        install_root: impl Into<PathBuf>,
        config_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            install_root: install_root.into(),
            bin_dir: None,
            executable: None,
            config_file: config_file.into(),
            start_timeout: default_start_timeout(),
            stop_timeout: default_stop_timeout(),
            health_check_timeout: default_health_check_timeout(),
            stop_poll_interval: default_stop_poll_interval(),
        }
    }

    /// Full path of the executable to launch
    pub fn executable_path(&self) -> PathBuf {
        let bin_dir = self
            .bin_dir
            .clone()
            .unwrap_or_else(|| self.install_root.join("bin"));
        bin_dir.join(self.executable.as_deref().unwrap_or(&self.name))
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: AgentConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_start_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(2 * 60)
}

fn default_health_check_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_stop_poll_interval() -> Duration {
    Duration::from_secs(1)
}

// Custom serialization for Duration
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn format_duration(duration: Duration) -> String {
        let millis = duration.as_millis();
        if millis % 1000 != 0 {
            format!("{}ms", millis)
        } else if millis != 0 && millis % 60_000 == 0 {
            format!("{}m", millis / 60_000)
        } else {
            format!("{}s", millis / 1000)
        }
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("Invalid duration: {}", s);

        // "ms" before "s" since "ms" ends with 's'
        if let Some(num) = s.strip_suffix("ms") {
            num.parse().map(Duration::from_millis).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('s') {
            num.parse().map(Duration::from_secs).map_err(|_| invalid())
        } else if let Some(num) = s.strip_suffix('m') {
            let mins: u64 = num.parse().map_err(|_| invalid())?;
            Ok(Duration::from_secs(mins * 60))
        } else {
            Err(format!("Duration must end with 'ms', 's', or 'm': {}", s))
        }
    }
}
