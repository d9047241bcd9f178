//! Configuration types for the SSSP scanner.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// SAVDI daemon configuration.
    #[serde(default)]
    pub sssp: SsspConfig,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Log malware detections.
    #[serde(default = "default_true")]
    pub log_detections: bool,

    /// Log clean scans.
    #[serde(default)]
    pub log_clean: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_detections: true,
            log_clean: false,
        }
    }
}

/// SAVDI daemon configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SsspConfig {
    /// Path to the SAVDI Unix socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Per-operation I/O timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Chunk size for streaming file bodies to the daemon.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum input size submitted for scanning (bytes).
    #[serde(default = "default_max_scan_size")]
    pub max_scan_size: u64,
}

impl Default for SsspConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            timeout_ms: default_timeout(),
            chunk_size: default_chunk_size(),
            max_scan_size: default_max_scan_size(),
        }
    }
}

impl SsspConfig {
    /// The per-operation timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/savdid/savdid.sock")
}

fn default_timeout() -> u64 {
    30000 // 30 seconds
}

fn default_chunk_size() -> usize {
    65536 // 64KB
}

fn default_max_scan_size() -> u64 {
    52_428_800 // 50MB
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sssp.timeout_ms == 0 {
            anyhow::bail!("sssp.timeout_ms must be greater than 0");
        }

        if self.sssp.chunk_size == 0 {
            anyhow::bail!("sssp.chunk_size must be greater than 0");
        }

        if self.sssp.max_scan_size == 0 {
            anyhow::bail!("sssp.max_scan_size must be greater than 0");
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# SSSP Scanner Configuration

settings:
  log_detections: true
  log_clean: false

# SAVDI daemon configuration
sssp:
  socket_path: "/var/run/savdid/savdid.sock"
  timeout_ms: 30000            # 30 second per-operation timeout
  chunk_size: 65536            # 64KB chunks to SAVDI
  max_scan_size: 52428800      # 50MB max input to scan
"#
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
