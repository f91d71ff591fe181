use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AutoshutdownConfig {
    pub poll: PollConfig,
    pub media_server: MediaServerConfig,
    pub download_client: DownloadClientConfig,
    pub file_sharing: CommandProbeConfig,
    pub login_sessions: CommandProbeConfig,
    pub shutdown: ShutdownConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PollConfig {
    /// Seconds to sleep between ticks
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Delay in minutes passed to the arm command
    #[serde(default = "default_countdown_minutes")]
    pub countdown_minutes: u32,

    /// Upper bound on a single probe check
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,

    /// Stop running probes once one reports activity
    #[serde(default)]
    pub stop_at_first_active: bool,

    /// How a probe that could not determine activity is counted
    #[serde(default)]
    pub unknown_policy: UnknownPolicy,

    /// Cancel a pending countdown when the daemon is stopped
    #[serde(default)]
    pub disarm_on_exit: bool,
}

/// Aggregation policy for `ProbeResult::Unknown`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Unknown counts as not active; a failing service never blocks shutdown.
    #[default]
    Idle,
    /// Unknown counts as active; a failing service keeps the host awake.
    Busy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MediaServerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_media_server_port")]
    pub port: u16,

    /// Access token appended to every status request
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DownloadClientConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_download_client_port")]
    pub port: u16,

    #[serde(default = "default_rpc_path")]
    pub rpc_path: String,

    /// Optional HTTP basic auth credentials
    pub username: Option<String>,
    pub password: Option<String>,
}

/// An activity source read from the output of an external command.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CommandProbeConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Leading output lines that are table headers, not sessions
    #[serde(default)]
    pub header_lines: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShutdownConfig {
    #[serde(default = "default_shutdown_program")]
    pub arm_program: String,

    /// `{minutes}` is replaced with the configured countdown
    #[serde(default = "default_arm_args")]
    pub arm_args: Vec<String>,

    #[serde(default = "default_shutdown_program")]
    pub cancel_program: String,

    #[serde(default = "default_cancel_args")]
    pub cancel_args: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Console format: pretty, compact or json
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for the daily-rolling log file; console only when unset
    pub directory: Option<PathBuf>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Log files older than this are removed; 0 keeps everything
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    #[serde(default = "default_retention_check_interval_seconds")]
    pub retention_check_interval_seconds: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }
}

impl LoggingConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days as u64 * 24 * 3600)
    }
}

impl AutoshutdownConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("autoshutdown.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("poll.interval_seconds", default_interval_seconds() as i64)?
            .set_default("poll.countdown_minutes", default_countdown_minutes() as i64)?
            .set_default(
                "poll.probe_timeout_seconds",
                default_probe_timeout_seconds() as i64,
            )?
            .set_default("poll.stop_at_first_active", false)?
            .set_default("poll.unknown_policy", "idle")?
            .set_default("poll.disarm_on_exit", false)?
            .set_default("media_server.enabled", default_enabled())?
            .set_default("media_server.address", default_address())?
            .set_default("media_server.port", default_media_server_port() as i64)?
            .set_default("media_server.token", "")?
            .set_default("download_client.enabled", default_enabled())?
            .set_default("download_client.address", default_address())?
            .set_default(
                "download_client.port",
                default_download_client_port() as i64,
            )?
            .set_default("download_client.rpc_path", default_rpc_path())?
            .set_default("file_sharing.enabled", default_enabled())?
            .set_default("file_sharing.program", "smbstatus")?
            .set_default("file_sharing.args", vec!["--shares".to_string()])?
            .set_default("file_sharing.header_lines", 3_i64)?
            .set_default("login_sessions.enabled", default_enabled())?
            .set_default("login_sessions.program", "who")?
            .set_default("login_sessions.args", Vec::<String>::new())?
            .set_default("login_sessions.header_lines", 0_i64)?
            .set_default("shutdown.arm_program", default_shutdown_program())?
            .set_default("shutdown.arm_args", default_arm_args())?
            .set_default("shutdown.cancel_program", default_shutdown_program())?
            .set_default("shutdown.cancel_args", default_cancel_args())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .set_default("logging.file_prefix", default_file_prefix())?
            .set_default("logging.retention_days", default_retention_days() as i64)?
            .set_default(
                "logging.retention_check_interval_seconds",
                default_retention_check_interval_seconds() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // AUTOSHUTDOWN_POLL__INTERVAL_SECONDS=30 and friends
            .add_source(
                Environment::with_prefix("AUTOSHUTDOWN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: AutoshutdownConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_seconds == 0 {
            return Err(ConfigError::Message(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.poll.countdown_minutes == 0 {
            return Err(ConfigError::Message(
                "Shutdown countdown must be greater than 0".to_string(),
            ));
        }

        if self.poll.probe_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Probe timeout must be greater than 0".to_string(),
            ));
        }

        if self.media_server.enabled && self.media_server.port == 0 {
            return Err(ConfigError::Message(
                "Media server port must be greater than 0".to_string(),
            ));
        }

        if self.download_client.enabled && self.download_client.port == 0 {
            return Err(ConfigError::Message(
                "Download client port must be greater than 0".to_string(),
            ));
        }

        for (name, probe) in [
            ("file_sharing", &self.file_sharing),
            ("login_sessions", &self.login_sessions),
        ] {
            if probe.enabled && probe.program.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "{} program cannot be empty",
                    name
                )));
            }
        }

        if self.shutdown.arm_program.trim().is_empty()
            || self.shutdown.cancel_program.trim().is_empty()
        {
            return Err(ConfigError::Message(
                "Shutdown arm and cancel programs cannot be empty".to_string(),
            ));
        }

        if !self.media_server.enabled
            && !self.download_client.enabled
            && !self.file_sharing.enabled
            && !self.login_sessions.enabled
        {
            return Err(ConfigError::Message(
                "At least one activity probe must be enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for AutoshutdownConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig {
                interval_seconds: default_interval_seconds(),
                countdown_minutes: default_countdown_minutes(),
                probe_timeout_seconds: default_probe_timeout_seconds(),
                stop_at_first_active: false,
                unknown_policy: UnknownPolicy::Idle,
                disarm_on_exit: false,
            },
            media_server: MediaServerConfig {
                enabled: default_enabled(),
                address: default_address(),
                port: default_media_server_port(),
                token: String::new(),
            },
            download_client: DownloadClientConfig {
                enabled: default_enabled(),
                address: default_address(),
                port: default_download_client_port(),
                rpc_path: default_rpc_path(),
                username: None,
                password: None,
            },
            file_sharing: CommandProbeConfig {
                enabled: default_enabled(),
                program: "smbstatus".to_string(),
                args: vec!["--shares".to_string()],
                header_lines: 3,
            },
            login_sessions: CommandProbeConfig {
                enabled: default_enabled(),
                program: "who".to_string(),
                args: Vec::new(),
                header_lines: 0,
            },
            shutdown: ShutdownConfig {
                arm_program: default_shutdown_program(),
                arm_args: default_arm_args(),
                cancel_program: default_shutdown_program(),
                cancel_args: default_cancel_args(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
                directory: None,
                file_prefix: default_file_prefix(),
                retention_days: default_retention_days(),
                retention_check_interval_seconds: default_retention_check_interval_seconds(),
            },
        }
    }
}

// Default value functions
fn default_interval_seconds() -> u64 {
    60
}
fn default_countdown_minutes() -> u32 {
    15
}
fn default_probe_timeout_seconds() -> u64 {
    10
}

fn default_enabled() -> bool {
    true
}
fn default_address() -> String {
    "localhost".to_string()
}
fn default_media_server_port() -> u16 {
    32400
}
fn default_download_client_port() -> u16 {
    9091
}
fn default_rpc_path() -> String {
    "/transmission/rpc".to_string()
}

fn default_shutdown_program() -> String {
    "shutdown".to_string()
}
fn default_arm_args() -> Vec<String> {
    vec!["-h".to_string(), "+{minutes}".to_string()]
}
fn default_cancel_args() -> Vec<String> {
    vec!["-c".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "compact".to_string()
}
fn default_file_prefix() -> String {
    "autoshutdown.log".to_string()
}
fn default_retention_days() -> u32 {
    7
}
fn default_retention_check_interval_seconds() -> u64 {
    3600
}
