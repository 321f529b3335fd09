//! Configuration system for the `SyncDemo` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/syncdemo/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.
//!
//! The user settings (nick, chatroom, publish prefix) have no defaults.
//! Until all three are known the controller stays unbound.

use std::path::PathBuf;
use std::time::Duration;

use crate::sync::DEFAULT_BROADCAST_ROOT;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    user: UserFileConfig,
    sync: SyncFileConfig,
    ui: UiFileConfig,
}

/// `[user]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UserFileConfig {
    nick: Option<String>,
    chatroom: Option<String>,
    prefix: Option<String>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    broadcast_root: Option<String>,
    fetch_threshold: Option<u64>,
    fetch_retries: Option<u32>,
    freshness_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[ui]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct UiFileConfig {
    poll_timeout_ms: Option<u64>,
    timestamp_format: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Who the local user is and where they chat.
///
/// Each field is either a non-empty value or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Nick shown on published messages.
    pub nick: Option<String>,
    /// Room to join.
    pub chatroom: Option<String>,
    /// Prefix under which the local user publishes.
    pub prefix: Option<String>,
}

impl Settings {
    /// Builds settings, treating empty strings as absent.
    #[must_use]
    pub fn new(
        nick: impl Into<Option<String>>,
        chatroom: impl Into<Option<String>>,
        prefix: impl Into<Option<String>>,
    ) -> Self {
        Self {
            nick: non_empty(nick.into()),
            chatroom: non_empty(chatroom.into()),
            prefix: non_empty(prefix.into()),
        }
    }

    /// Whether nick, chatroom and prefix are all present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.nick.is_some() && self.chatroom.is_some() && self.prefix.is_some()
    }

    /// The nick, if set.
    #[must_use]
    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    /// The chatroom, if set.
    #[must_use]
    pub fn chatroom(&self) -> Option<&str> {
        self.chatroom.as_deref()
    }

    /// The publish prefix, if set.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Sync policy used by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Root from which room topics are derived.
    pub broadcast_root: String,
    /// A batch with this many missing items or more is not fetched.
    pub fetch_threshold: u64,
    /// Retry budget handed to the transport with every fetch.
    pub fetch_retries: u32,
    /// Freshness window requested for published items.
    pub freshness: Duration,
    /// Capacity of the transport event and command channels. Zero in the
    /// config file falls back to the default.
    pub channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            broadcast_root: DEFAULT_BROADCAST_ROOT.to_string(),
            fetch_threshold: 10,
            fetch_retries: 2,
            freshness: Duration::from_secs(60),
            channel_capacity: 256,
        }
    }
}

/// Terminal UI options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiConfig {
    /// Poll timeout for the TUI event loop.
    pub poll_timeout: Duration,
    /// Timestamp display format string (chrono).
    pub timestamp_format: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            timestamp_format: "%H:%M".to_string(),
        }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// User settings (possibly incomplete).
    pub settings: Settings,
    /// Sync policy.
    pub sync: SyncConfig,
    /// Terminal UI options.
    pub ui: UiConfig,
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path
    /// (`~/.config/syncdemo/config.toml`) is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = SyncConfig::default();
        let ui_defaults = UiConfig::default();

        Self {
            settings: Settings::new(
                cli.nick.clone().or_else(|| file.user.nick.clone()),
                cli.chatroom.clone().or_else(|| file.user.chatroom.clone()),
                cli.prefix.clone().or_else(|| file.user.prefix.clone()),
            ),
            sync: SyncConfig {
                broadcast_root: cli
                    .broadcast_root
                    .clone()
                    .or_else(|| file.sync.broadcast_root.clone())
                    .unwrap_or(defaults.broadcast_root),
                fetch_threshold: file
                    .sync
                    .fetch_threshold
                    .unwrap_or(defaults.fetch_threshold),
                fetch_retries: file.sync.fetch_retries.unwrap_or(defaults.fetch_retries),
                freshness: file
                    .sync
                    .freshness_secs
                    .map_or(defaults.freshness, Duration::from_secs),
                channel_capacity: file
                    .sync
                    .channel_capacity
                    .filter(|&capacity| capacity > 0)
                    .unwrap_or(defaults.channel_capacity),
            },
            ui: UiConfig {
                poll_timeout: file
                    .ui
                    .poll_timeout_ms
                    .map_or(ui_defaults.poll_timeout, Duration::from_millis),
                timestamp_format: file
                    .ui
                    .timestamp_format
                    .clone()
                    .unwrap_or(ui_defaults.timestamp_format),
            },
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Digest-sync group chat")]
pub struct CliArgs {
    /// Nick shown on your messages.
    #[arg(long, env = "SYNCDEMO_NICK")]
    pub nick: Option<String>,

    /// Chatroom to join.
    #[arg(long, env = "SYNCDEMO_CHATROOM")]
    pub chatroom: Option<String>,

    /// Name prefix to publish under (e.g. `/ndn/alice`).
    #[arg(long, env = "SYNCDEMO_PREFIX")]
    pub prefix: Option<String>,

    /// Root from which room topics are derived.
    #[arg(long)]
    pub broadcast_root: Option<String>,

    /// Path to config file (default: `~/.config/syncdemo/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SYNCDEMO_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/syncdemo.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Also run a local echo peer with this nick in the same room.
    #[arg(long)]
    pub bot: Option<String>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            // No config dir: defaults.
            return Ok(ConfigFile::default());
        };
        config_dir.join("syncdemo").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
