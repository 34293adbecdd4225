use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::controller::{QueryOptions, RetryPolicy};
use crate::format::OutputFormat;
use crate::host::BackendChoice;
use crate::tail::LineCount;

/// Environment variable naming a tmux socket when none is configured
pub const TMUX_SOCKET_ENV: &str = "SESSIONQUERY_TMUX_SOCKET";

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "Find a terminal session by name and print the tail of its output"
)]
pub struct Config {
    /// Session name fragment (case-sensitive); lists every session when omitted
    pub name: Option<String>,

    /// Number of lines to read from the end of the session [default: 50]
    #[arg(allow_negative_numbers = true)]
    pub lines: Option<String>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Terminal host to query
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendChoice>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Timeout for each host call in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// tmux server socket path
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Retry once after a timeout or automation failure
    #[arg(long)]
    pub retry: bool,
}

impl Config {
    /// Parse command line arguments without exiting on error
    pub fn try_parse_args() -> std::result::Result<Self, clap::Error> {
        Self::try_parse()
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Lines read when the caller gives no count
    #[serde(default = "default_lines")]
    pub default_lines: u32,

    /// Timeout for each host call in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Terminal host backend
    #[serde(default)]
    pub backend: BackendChoice,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Retry settings
    #[serde(default)]
    pub retry: RetrySettings,

    /// tmux backend settings
    #[serde(default)]
    pub tmux: TmuxSettings,
}

fn default_lines() -> u32 {
    50
}

fn default_timeout_secs() -> u64 {
    5
}

/// Single bounded retry for transient host failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retry once after a timeout or automation failure
    #[serde(default)]
    pub enabled: bool,

    /// Delay before the retry in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_backoff_ms() -> u64 {
    250
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// tmux backend settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TmuxSettings {
    /// Server socket (`tmux -S`)
    #[serde(default)]
    pub socket: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_lines: default_lines(),
            timeout_secs: default_timeout_secs(),
            backend: BackendChoice::default(),
            format: OutputFormat::default(),
            retry: RetrySettings::default(),
            tmux: TmuxSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_file(p);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("sessionquery/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/sessionquery/config.toml")),
            dirs::home_dir().map(|p| p.join(".sessionquery.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                tracing::debug!("Loading config from {:?}", path);
                return Self::load_file(path);
            }
        }

        Ok(Self::default())
    }

    fn load_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(backend) = cli.backend {
            self.backend = backend;
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if let Some(timeout) = cli.timeout {
            self.timeout_secs = timeout;
        }
        if let Some(socket) = &cli.socket {
            self.tmux.socket = Some(socket.clone());
        }
        if cli.retry {
            self.retry.enabled = true;
        }
    }

    /// Validate and normalize settings values
    pub fn validate(&mut self) {
        const MIN_TIMEOUT_SECS: u64 = 1;

        if self.default_lines == 0 {
            tracing::warn!("default_lines must be positive, using {}", default_lines());
            self.default_lines = default_lines();
        }
        if self.timeout_secs < MIN_TIMEOUT_SECS {
            self.timeout_secs = MIN_TIMEOUT_SECS;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Configured socket, else `$SESSIONQUERY_TMUX_SOCKET`
    pub fn tmux_socket(&self) -> Option<PathBuf> {
        self.tmux.socket.clone().or_else(|| {
            std::env::var_os(TMUX_SOCKET_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
    }

    /// Options handed to the query controller
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            default_lines: LineCount::new(self.default_lines as usize).unwrap_or_default(),
            retry: RetryPolicy {
                enabled: self.retry.enabled,
                backoff: Duration::from_millis(self.retry.backoff_ms),
            },
        }
    }
}
